//! Discord message event handling.
//!
//! Routes prefixed messages to the command handler and everything else in a
//! server to that server's report tracker.

use std::collections::HashSet;

use serenity::model::channel::Message;
use serenity::model::id::{MessageId, UserId as DiscordUserId};
use serenity::builder::CreateMessage;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::DiscordConfig;
use crate::discord::commands::{CommandHandler, Invocation, Reply};
use crate::discord::format::{split_message, DISCORD_MAX_MESSAGE};
use crate::session::{BotState, ReportOutcome, SharedState};

// BotState lives in serenity's TypeMap so every event can reach it.
impl TypeMapKey for BotState {
    type Value = SharedState;
}

const ACK: char = '👍';

/// Discord event handler.
pub struct BotHandler {
    commands: CommandHandler,
    owner: Option<u64>,
    admins: HashSet<u64>,
}

impl BotHandler {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            commands: CommandHandler::new(config.prefix.clone()),
            owner: config.owner_id,
            admins: config.admins.iter().copied().collect(),
        }
    }

    pub async fn handle_message(&self, ctx: &Context, msg: Message) {
        if msg.author.bot || msg.author.id == ctx.cache.current_user().id {
            return;
        }

        let content = msg.content.trim();
        if content.is_empty() {
            return;
        }

        let state = {
            let data = ctx.data.read().await;
            data.get::<BotState>().cloned()
        };
        let Some(state) = state else {
            warn!("Bot state missing from client data");
            return;
        };

        if self.commands.is_command(content) {
            self.handle_command(ctx, &msg, content, &state).await;
        } else if msg.guild_id.is_some() {
            self.handle_report(ctx, &msg, content, &state).await;
        }
    }

    async fn handle_command(&self, ctx: &Context, msg: &Message, content: &str, state: &SharedState) {
        let command = match self.commands.parse(content) {
            None => {
                debug!("Ignoring unknown command: {}", content);
                return;
            }
            Some(Err(e)) => {
                say(ctx, msg, &e.to_string()).await;
                return;
            }
            Some(Ok(command)) => command,
        };

        let author = msg.author.id.get();
        let invocation = Invocation {
            author,
            community: msg.guild_id.map(|id| id.get()),
            admin: self.admins.contains(&author) || is_guild_admin(ctx, msg).await,
            owner: self.owner == Some(author),
        };

        let result = {
            let mut state = state.lock().await;
            if let Some(community) = invocation.community {
                state.session(community).reports.clear();
            }
            self.commands.execute(&mut state, &invocation, command)
        };

        match result {
            Ok(reply) => send_reply(ctx, msg, reply).await,
            Err(e) => {
                info!("Command from {} failed: {}", msg.author.name, e);
                say(ctx, msg, &e.to_string()).await;
            }
        }
    }

    async fn handle_report(&self, ctx: &Context, msg: &Message, content: &str, state: &SharedState) {
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let community = guild_id.get();

        let outcome = state
            .lock()
            .await
            .report(community, msg.author.id.get(), msg.id.get(), content);

        match outcome {
            ReportOutcome::Applied { earlier, .. } => {
                if let Some(earlier) = earlier {
                    if let Err(e) = msg
                        .channel_id
                        .create_reaction(&ctx.http, MessageId::new(earlier), ACK)
                        .await
                    {
                        debug!("Failed to react to report: {}", e);
                    }
                }
                msg.react(&ctx.http, ACK).await.ok();
            }
            ReportOutcome::Rejected(e) => say(ctx, msg, &e.to_string()).await,
            ReportOutcome::StopNoted | ReportOutcome::Ignored => {}
        }
    }
}

/// Whether the author has the administrator permission in the message's server.
async fn is_guild_admin(ctx: &Context, msg: &Message) -> bool {
    let Some(guild_id) = msg.guild_id else {
        return false;
    };
    let member = match guild_id.member(ctx, msg.author.id).await {
        Ok(member) => member,
        Err(e) => {
            debug!("Failed to fetch member {}: {}", msg.author.id, e);
            return false;
        }
    };
    ctx.cache
        .guild(guild_id)
        .map(|guild| guild.member_permissions(&member).administrator())
        .unwrap_or(false)
}

async fn say(ctx: &Context, msg: &Message, text: &str) {
    for chunk in split_message(text, DISCORD_MAX_MESSAGE) {
        if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
            error!("Failed to send to Discord channel {}: {}", msg.channel_id, e);
            return;
        }
    }
}

async fn send_reply(ctx: &Context, msg: &Message, reply: Reply) {
    if reply.react {
        msg.react(&ctx.http, ACK).await.ok();
    }
    if let Some(text) = reply.text {
        say(ctx, msg, &text).await;
    }
    for (user, text) in reply.direct {
        let user = DiscordUserId::new(user);
        for chunk in split_message(&text, DISCORD_MAX_MESSAGE) {
            if let Err(e) = user
                .direct_message(ctx, CreateMessage::new().content(chunk))
                .await
            {
                warn!("Failed to notify user {}: {}", user, e);
                break;
            }
        }
    }
}
