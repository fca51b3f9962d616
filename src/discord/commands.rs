//! Chat commands (!addstop, !settask, !addoffer, etc).
//!
//! Handles command parsing and execution. Execution works on the locked
//! `BotState` and returns a `Reply`; sending it is left to the handler.

use fancy_regex::Regex;
use tracing::{debug, info};

use crate::common::error::CommandError;
use crate::common::text::title_case;
use crate::common::{CommunityId, Coordinates, RewardCategory, UserId};
use crate::research::Task;
use crate::session::BotState;
use crate::trade::{clean_entity_list, OfferId, Selection};

use super::format::{join_alternatives, mention};

/// Which side of an offer a command edits or searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferSide {
    Haves,
    Wants,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,

    // Research map
    AddStop { name: String, coordinates: Coordinates },
    SetTask { task: String, stop: String },
    ResetStop(String),
    DeleteStop(String),
    NicknameStop { stop: String, nickname: String },
    SetLocation(Coordinates),
    SetBounds(Coordinates, Coordinates),
    SetTimeZone(String),
    ResetAll,
    ResetMap(CommunityId),
    ResetAllMaps,

    // Task list
    AddTask { reward: String, quest: String, shiny: bool },
    DeleteTask(String),
    NicknameTask { task: String, nickname: String },
    ListTasks,
    ResetTaskList,

    // Trading
    AddOffer(String),
    DeleteOffer(String),
    AddEntities { side: OfferSide, offer: String, tokens: Vec<String>, shiny: bool },
    RemoveEntities { side: OfferSide, offer: String, tokens: Vec<String>, shiny: bool },
    View { trainer: Option<String>, offer: String },
    Check(String),
    ListOffers(Option<String>),
    SetName(String),
    Search { side: OfferSide, tokens: Vec<String> },
    AddFriend(UserId),
    Forms(String),
}

/// Who sent a command and from where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub author: UserId,
    /// `None` in direct messages.
    pub community: Option<CommunityId>,
    pub admin: bool,
    pub owner: bool,
}

/// What to send back for a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: Option<String>,
    /// React to the command message with a thumbs up.
    pub react: bool,
    /// Direct messages to other users.
    pub direct: Vec<(UserId, String)>,
}

impl Reply {
    fn ack() -> Self {
        Self {
            react: true,
            ..Self::default()
        }
    }

    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    fn push_line(&mut self, line: impl AsRef<str>) {
        let text = self.text.get_or_insert_with(String::new);
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(line.as_ref());
    }
}

/// Split a command body into arguments. Double quotes group words.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for c in input.chars() {
        match c {
            '"' | '\u{201c}' | '\u{201d}' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Command handler for the bot.
pub struct CommandHandler {
    prefix: String,
    portal_pattern: Regex,
    mention_pattern: Regex,
}

impl CommandHandler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            portal_pattern: Regex::new(r"pll=(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").unwrap(),
            mention_pattern: Regex::new(r"^<@!?(\d+)>$").unwrap(),
        }
    }

    /// Whether a message is addressed to the bot as a command.
    pub fn is_command(&self, content: &str) -> bool {
        content.trim_start().starts_with(self.prefix.as_str())
    }

    /// Parse a message. Returns `None` if it is not a known command.
    pub fn parse(&self, content: &str) -> Option<Result<Command, CommandError>> {
        let body = content.trim().strip_prefix(self.prefix.as_str())?;
        let mut args = tokenize(body);
        if args.is_empty() {
            return None;
        }
        let name = args.remove(0).to_lowercase();
        debug!("Processing command: {} with args: {:?}", name, args);

        let command = match name.as_str() {
            "help" => Ok(Command::Help),

            "addstop" => self.parse_add_stop(&args),
            "settask" => match args.split_first() {
                Some((task, stop)) if !stop.is_empty() => Ok(Command::SetTask {
                    task: task.clone(),
                    stop: stop.join(" "),
                }),
                _ => Err(usage("settask <task> <stop>")),
            },
            "resetstop" => joined(&args, "resetstop <stop>").map(Command::ResetStop),
            "deletestop" => joined(&args, "deletestop <stop>").map(Command::DeleteStop),
            "nicknamestop" => match args.as_slice() {
                [stop, nickname] => Ok(Command::NicknameStop {
                    stop: stop.clone(),
                    nickname: nickname.clone(),
                }),
                _ => Err(usage("nicknamestop \"<stop>\" \"<nickname>\"")),
            },
            "setlocation" => match args.as_slice() {
                [lat, lon] => coordinates(lat, lon).map(Command::SetLocation),
                _ => Err(usage("setlocation <latitude> <longitude>")),
            },
            "setbounds" => match args.as_slice() {
                [lat1, lon1, lat2, lon2] => {
                    coordinates(lat1, lon1).and_then(|c1| {
                        coordinates(lat2, lon2).map(|c2| Command::SetBounds(c1, c2))
                    })
                }
                _ => Err(usage("setbounds <lat1> <long1> <lat2> <long2>")),
            },
            "settimezone" => match args.as_slice() {
                [zone] => Ok(Command::SetTimeZone(zone.clone())),
                _ => Err(usage("settimezone <zone>, e.g. America/New_York")),
            },
            "resetall" => Ok(Command::ResetAll),
            "resetmap" => match args.as_slice() {
                [id] => id
                    .parse()
                    .map(Command::ResetMap)
                    .map_err(|_| usage("resetmap <server id>")),
                _ => Err(usage("resetmap <server id>")),
            },
            "resetallmaps" => Ok(Command::ResetAllMaps),

            "addtask" => match args.as_slice() {
                [reward, quest] => Ok(Command::AddTask {
                    reward: reward.clone(),
                    quest: quest.clone(),
                    shiny: false,
                }),
                [reward, quest, shiny] => Ok(Command::AddTask {
                    reward: reward.clone(),
                    quest: quest.clone(),
                    shiny: matches!(shiny.to_lowercase().as_str(), "true" | "shiny" | "yes"),
                }),
                _ => Err(usage("addtask \"<reward>\" \"<quest>\" [shiny]")),
            },
            "deletetask" => joined(&args, "deletetask <task>").map(Command::DeleteTask),
            "nicknametask" => match args.as_slice() {
                [task, nickname] => Ok(Command::NicknameTask {
                    task: task.clone(),
                    nickname: nickname.clone(),
                }),
                _ => Err(usage("nicknametask \"<task>\" \"<nickname>\"")),
            },
            "listtasks" | "tasklist" => Ok(Command::ListTasks),
            "resettasklist" => Ok(Command::ResetTaskList),

            "addoffer" | "newoffer" => single(&args, "addoffer <name>").map(Command::AddOffer),
            "deleteoffer" => single(&args, "deleteoffer <name>").map(Command::DeleteOffer),
            "addwant" | "addwants" => entities(&args, OfferSide::Wants, false, true),
            "addhave" | "addhaves" => entities(&args, OfferSide::Haves, false, true),
            "addshinywant" | "addshinywants" => entities(&args, OfferSide::Wants, true, true),
            "addshinyhave" | "addshinyhaves" => entities(&args, OfferSide::Haves, true, true),
            "deletewant" | "deletewants" => entities(&args, OfferSide::Wants, false, false),
            "deletehave" | "deletehaves" => entities(&args, OfferSide::Haves, false, false),
            "deleteshinywant" | "deleteshinywants" => {
                entities(&args, OfferSide::Wants, true, false)
            }
            "deleteshinyhave" | "deleteshinyhaves" => {
                entities(&args, OfferSide::Haves, true, false)
            }
            "view" | "viewoffer" => match args.as_slice() {
                [offer] => Ok(Command::View {
                    trainer: None,
                    offer: offer.clone(),
                }),
                [trainer, offer] => Ok(Command::View {
                    trainer: Some(trainer.clone()),
                    offer: offer.clone(),
                }),
                _ => Err(usage("view [trainer] <offer>")),
            },
            "check" => single(&args, "check <offer>").map(Command::Check),
            "listoffers" | "viewoffers" => match args.as_slice() {
                [] => Ok(Command::ListOffers(None)),
                [trainer] => Ok(Command::ListOffers(Some(trainer.clone()))),
                _ => Err(usage("listoffers [trainer]")),
            },
            "setname" => single(&args, "setname <trainer name>").map(Command::SetName),
            "searchhave" | "searchhaves" => search(&args, OfferSide::Haves),
            "searchwant" | "searchwants" => search(&args, OfferSide::Wants),
            "addfriend" => match args.as_slice() {
                [user] => self.parse_mention(user).map(Command::AddFriend),
                _ => Err(usage("addfriend @user")),
            },
            "forms" => joined(&args, "forms <pokemon>").map(Command::Forms),

            _ => return None,
        };
        Some(command)
    }

    fn parse_add_stop(&self, args: &[String]) -> Result<Command, CommandError> {
        const USAGE: &str = "addstop <name> <latitude> <longitude>, or addstop <name> <intel url>";

        let (last, rest) = args.split_last().ok_or_else(|| usage(USAGE))?;
        if last.starts_with("http") {
            let coordinates = self.portal_coordinates(last)?;
            return joined(rest, USAGE).map(|name| Command::AddStop { name, coordinates });
        }
        match args {
            [name @ .., lat, lon] if !name.is_empty() => Ok(Command::AddStop {
                name: name.join(" "),
                coordinates: coordinates(lat, lon)?,
            }),
            _ => Err(usage(USAGE)),
        }
    }

    /// Coordinates from the `pll=<lat>,<lon>` part of an Ingress intel URL.
    pub fn portal_coordinates(&self, url: &str) -> Result<Coordinates, CommandError> {
        let captures = self
            .portal_pattern
            .captures(url)
            .ok()
            .flatten()
            .ok_or_else(|| CommandError::Usage("No portal location data in URL.".to_string()))?;
        let lat = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let lon = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        coordinates(lat, lon)
    }

    fn parse_mention(&self, token: &str) -> Result<UserId, CommandError> {
        let id = match self.mention_pattern.captures(token).ok().flatten() {
            Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or_default(),
            None => token,
        };
        id.parse().map_err(|_| usage("addfriend @user"))
    }

    /// Run a parsed command against the shared state.
    pub fn execute(
        &self,
        state: &mut BotState,
        invocation: &Invocation,
        command: Command,
    ) -> Result<Reply, CommandError> {
        info!(author = invocation.author, community = ?invocation.community, "Command: {:?}", command);

        match command {
            Command::Help => Ok(Reply::text(self.help_text())),

            Command::AddTask { .. }
            | Command::DeleteTask(_)
            | Command::NicknameTask { .. }
            | Command::ListTasks
            | Command::ResetTaskList => task_command(state, invocation, command),

            Command::ResetMap(community) => {
                require_owner(invocation)?;
                state.session(community).map.reset_all_stops();
                state.save_map(community)?;
                Ok(Reply::ack())
            }
            Command::ResetAllMaps => {
                require_owner(invocation)?;
                let mut reply = Reply::ack();
                let mut communities = state.communities();
                communities.sort_unstable();
                for community in communities {
                    state.session(community).map.reset_all_stops();
                    state.save_map(community)?;
                    reply.push_line(format!("Reset map: {}", community));
                }
                Ok(reply)
            }

            Command::AddStop { .. }
            | Command::SetTask { .. }
            | Command::ResetStop(_)
            | Command::DeleteStop(_)
            | Command::NicknameStop { .. }
            | Command::SetLocation(_)
            | Command::SetBounds(..)
            | Command::SetTimeZone(_)
            | Command::ResetAll => {
                let community = invocation.community.ok_or_else(|| {
                    CommandError::Usage("This command only works in a server.".to_string())
                })?;
                map_command(state, invocation, community, command)
            }

            _ => trade_command(state, invocation, command),
        }
    }

    fn help_text(&self) -> String {
        let p = &self.prefix;
        format!(
            "**Research**\n\
             `{p}addstop <name> <lat> <long>` or `{p}addstop <name> <intel url>` - add a stop\n\
             `{p}settask <task> <stop>` - set today's task at a stop\n\
             `{p}resetstop <stop>` / `{p}deletestop <stop>`\n\
             `{p}nicknamestop \"<stop>\" \"<nickname>\"`\n\
             `{p}addtask \"<reward>\" \"<quest>\" [shiny]` / `{p}deletetask <task>` / `{p}nicknametask \"<task>\" \"<nickname>\"`\n\
             `{p}listtasks` - list known tasks\n\
             Or just post a stop name, then the reward (or `shadow <pokemon>`).\n\
             **Trading**\n\
             `{p}addoffer <name>` / `{p}deleteoffer <name>`\n\
             `{p}addwants <offer> <pokemon...>` / `{p}addhaves <offer> <pokemon...>`\n\
             `{p}deletewants <offer> <pokemon...|all>` / `{p}deletehaves <offer> <pokemon...|all>`\n\
             `{p}view [trainer] <offer>` / `{p}listoffers [trainer]` / `{p}check <offer>`\n\
             `{p}setname <trainer name>` / `{p}addfriend @user`\n\
             `{p}searchhaves <pokemon>` / `{p}searchwants <pokemon>` / `{p}forms <pokemon>`"
        )
    }
}

fn usage(text: &str) -> CommandError {
    CommandError::Usage(format!("Usage: {}", text))
}

fn single(args: &[String], usage_text: &str) -> Result<String, CommandError> {
    match args {
        [one] => Ok(one.clone()),
        _ => Err(usage(usage_text)),
    }
}

fn joined(args: &[String], usage_text: &str) -> Result<String, CommandError> {
    let text = args.join(" ");
    if text.trim().is_empty() {
        Err(usage(usage_text))
    } else {
        Ok(text)
    }
}

fn number(token: &str) -> Result<f64, CommandError> {
    token
        .trim_end_matches(',')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| CommandError::Usage(format!("'{}' is not a number.", token)))
}

fn coordinates(lat: &str, lon: &str) -> Result<Coordinates, CommandError> {
    Ok(Coordinates::new(number(lat)?, number(lon)?))
}

fn entities(args: &[String], side: OfferSide, shiny: bool, add: bool) -> Result<Command, CommandError> {
    let verb = if add { "add" } else { "delete" };
    let side_name = match side {
        OfferSide::Haves => "haves",
        OfferSide::Wants => "wants",
    };
    match args.split_first() {
        Some((offer, tokens)) if !tokens.is_empty() => {
            let offer = offer.clone();
            let tokens = tokens.to_vec();
            Ok(if add {
                Command::AddEntities { side, offer, tokens, shiny }
            } else {
                Command::RemoveEntities { side, offer, tokens, shiny }
            })
        }
        _ => Err(usage(&format!("{}{} <offer> <pokemon...>", verb, side_name))),
    }
}

fn search(args: &[String], side: OfferSide) -> Result<Command, CommandError> {
    if args.is_empty() {
        return Err(usage("searchhaves <pokemon>"));
    }
    Ok(Command::Search {
        side,
        tokens: args.to_vec(),
    })
}

fn require_admin(invocation: &Invocation) -> Result<(), CommandError> {
    if invocation.admin || invocation.owner {
        Ok(())
    } else {
        Err(CommandError::NotPermitted)
    }
}

fn require_owner(invocation: &Invocation) -> Result<(), CommandError> {
    if invocation.owner {
        Ok(())
    } else {
        Err(CommandError::NotPermitted)
    }
}

/// Commands on one community's map. The map is saved after every change,
/// including the temporary nicknames handed out on an ambiguous lookup.
fn map_command(
    state: &mut BotState,
    invocation: &Invocation,
    community: CommunityId,
    command: Command,
) -> Result<Reply, CommandError> {
    if matches!(
        command,
        Command::SetLocation(_) | Command::SetBounds(..) | Command::SetTimeZone(_) | Command::ResetAll
    ) {
        require_admin(invocation)?;
    }

    let (session, tasks) = state.research(community);
    let map = &mut session.map;

    let result = match command {
        Command::AddStop { name, coordinates } => map.new_stop(coordinates, &name).map(|id| {
            let name = map.stop(id).map(|s| s.name.clone()).unwrap_or(name);
            Reply::text(format!(
                "Creating stop named: {} at [{}, {}].",
                name, coordinates.latitude, coordinates.longitude
            ))
        }),
        Command::SetTask { task, stop } => map.find_stop(&stop).map(|s| s.id).and_then(|id| {
            let mut found = tasks.find_task(&task)?;
            found.set_icon(&task);
            map.set_task(id, &found).map(|_| Reply::ack())
        }),
        Command::ResetStop(stop) => map
            .find_stop(&stop)
            .map(|s| s.id)
            .and_then(|id| map.reset_stop(id))
            .map(|_| Reply::ack()),
        Command::DeleteStop(stop) => map
            .find_stop(&stop)
            .map(|s| s.id)
            .and_then(|id| map.remove_stop(id))
            .map(|_| Reply::ack()),
        Command::NicknameStop { stop, nickname } => map
            .find_stop(&stop)
            .map(|s| s.id)
            .and_then(|id| map.add_nickname(id, &nickname))
            .map(|_| Reply::ack()),
        Command::SetLocation(location) => map.set_location(location).map(|_| Reply::ack()),
        Command::SetBounds(c1, c2) => map.set_bounds(c1, c2).map(|_| Reply::ack()),
        Command::SetTimeZone(zone) => map.set_time_zone(&zone).map(|_| Reply::ack()),
        Command::ResetAll => {
            map.reset_all_stops();
            Ok(Reply::ack())
        }
        _ => Ok(Reply::default()),
    };
    let lookup_changed = map.take_lookup_changes();

    if result.is_ok() || lookup_changed {
        state.save_map(community)?;
    }
    Ok(result?)
}

fn task_command(
    state: &mut BotState,
    invocation: &Invocation,
    command: Command,
) -> Result<Reply, CommandError> {
    let tasks = &mut state.tasks;
    match command {
        Command::AddTask { reward, quest, shiny } => {
            tasks.add_task(Task::new(&reward, &quest, shiny));
        }
        Command::DeleteTask(task) => {
            let id = tasks.find_task(&task)?.id;
            tasks.remove_task(id)?;
        }
        Command::NicknameTask { task, nickname } => {
            let id = tasks.find_task(&task)?.id;
            tasks.add_nickname(id, &nickname)?;
        }
        Command::ListTasks => return Ok(Reply::text(list_tasks(state))),
        Command::ResetTaskList => {
            require_admin(invocation)?;
            let backup = state.store.backup_tasklist(tasks)?;
            tasks.clear(&backup);
        }
        _ => return Ok(Reply::default()),
    }
    state.save_tasks()?;
    Ok(Reply::ack())
}

fn list_tasks(state: &BotState) -> String {
    if state.tasks.is_empty() {
        return "No tasks known".to_string();
    }
    let mut text = String::from("**Currently Known Tasks**");
    for task in state.tasks.tasks() {
        text.push('\n');
        text.push_str(&task.describe());
        if task.shiny {
            text.push_str(" ✨");
        }
        if task.category == RewardCategory::RareCandy {
            text.push_str(" 🍬");
        }
    }
    text
}

fn trade_command(
    state: &mut BotState,
    invocation: &Invocation,
    command: Command,
) -> Result<Reply, CommandError> {
    let author = invocation.author;
    state.trades.ensure_trader(author);
    if let Some(community) = invocation.community {
        state.trades.add_community(author, community);
    }

    let reply = match command {
        Command::AddOffer(name) => {
            state.trades.add_offer(author, &name)?;
            Reply::ack()
        }
        Command::DeleteOffer(name) => {
            state.trades.delete_offer(author, &name)?;
            Reply::ack()
        }
        Command::AddEntities { side, offer, tokens, shiny } => {
            let cleaned = clean_entity_list(&state.matcher, &tokens, shiny);
            match side {
                OfferSide::Haves => state.trades.add_haves(author, &offer, &cleaned.entities)?,
                OfferSide::Wants => state.trades.add_wants(author, &offer, &cleaned.entities)?,
            }
            let id = state.trades.find_offer(author, &offer)?.id;
            let mut reply = matches_reply(state, author, id, false)?;
            reply.react = true;
            report_unresolved(&mut reply, &cleaned.unresolved);
            reply
        }
        Command::RemoveEntities { side, offer, tokens, shiny } => {
            let cleaned = clean_entity_list(&state.matcher, &tokens, shiny);
            let selection = match tokens.as_slice() {
                [all] if all.eq_ignore_ascii_case("all") => Selection::All,
                _ => Selection::Only(&cleaned.entities),
            };
            match side {
                OfferSide::Haves => state.trades.remove_haves(author, &offer, selection)?,
                OfferSide::Wants => state.trades.remove_wants(author, &offer, selection)?,
            }
            let mut reply = Reply::ack();
            if matches!(selection, Selection::Only(_)) {
                report_unresolved(&mut reply, &cleaned.unresolved);
            }
            reply
        }
        Command::View { trainer, offer } => {
            let owner = trainer_or_author(state, trainer.as_deref(), author)?;
            let offer = state.trades.find_offer(owner, &offer)?;
            let list = |items: &std::collections::BTreeSet<String>| {
                if items.is_empty() {
                    "None".to_string()
                } else {
                    items.iter().cloned().collect::<Vec<_>>().join("\n")
                }
            };
            Reply::text(format!(
                "**{}**\n**Haves**\n{}\n**Wants**\n{}",
                offer.name,
                list(&offer.haves),
                list(&offer.wants)
            ))
        }
        Command::Check(offer) => {
            let id = state.trades.find_offer(author, &offer)?.id;
            matches_reply(state, author, id, true)?
        }
        Command::ListOffers(trainer) => {
            let owner = trainer_or_author(state, trainer.as_deref(), author)?;
            let names = state.trades.offer_names(owner);
            if names.is_empty() {
                Reply::text("No offers found")
            } else {
                Reply::text(format!("**Offer Names**\n{}", names.join("\n")))
            }
        }
        Command::SetName(name) => {
            state.trades.set_name(author, Some(&title_case(&name)))?;
            Reply::ack()
        }
        Command::Search { side, tokens } => {
            let cleaned = clean_entity_list(&state.matcher, &tokens, false);
            let [entity] = cleaned.entities.as_slice() else {
                return Err(CommandError::Usage(format!(
                    "Too many or too few pokemon matched: {}",
                    cleaned.entities.join(", ")
                )));
            };
            let hits = match side {
                OfferSide::Haves => state.trades.search_haves(author, entity)?,
                OfferSide::Wants => state.trades.search_wants(author, entity)?,
            };
            if hits.is_empty() {
                Reply::text("No public offers matching query found.")
            } else {
                let lines: Vec<String> = hits
                    .iter()
                    .map(|hit| format!("{} ({})'s offer: {}.", hit.name, mention(hit.user), hit.offer))
                    .collect();
                Reply::text(format!("**Search Results**\n{}", lines.join("\n")))
            }
        }
        Command::AddFriend(friend) => {
            state.trades.add_friend(author, friend);
            Reply::ack()
        }
        Command::Forms(token) => {
            let forms = state.matcher.all_forms(&token);
            if forms.is_empty() {
                Reply::text(format!("No forms known for {}.", title_case(&token)))
            } else {
                Reply::text(forms.join(", "))
            }
        }
        _ => return Ok(Reply::default()),
    };

    state.save_trades()?;
    Ok(reply)
}

fn trainer_or_author(
    state: &BotState,
    trainer: Option<&str>,
    author: UserId,
) -> Result<UserId, CommandError> {
    match trainer {
        None => Ok(author),
        Some(name) => state
            .trades
            .trader_by_name(name)
            .map(|t| t.id)
            .ok_or_else(|| CommandError::Usage("User not found".to_string())),
    }
}

/// Record matches for an offer and build the reply plus counterpart notifications.
fn matches_reply(
    state: &mut BotState,
    author: UserId,
    offer: OfferId,
    report_none: bool,
) -> Result<Reply, CommandError> {
    let processed = state.trades.process_matches(offer)?;

    let mut reply = Reply::default();
    for found in &processed.matches {
        reply.push_line(format!(
            "Your {} for {}'s {}.",
            join_alternatives(&found.haves),
            mention(found.user),
            join_alternatives(&found.wants)
        ));
    }
    if processed.matches.is_empty() && report_none {
        reply.push_line("No matches found");
    }
    reply.direct = processed
        .to_notify
        .iter()
        .map(|found| {
            (
                found.user,
                format!(
                    "Trade matched! Your {} for {}'s {}",
                    join_alternatives(&found.wants),
                    mention(author),
                    join_alternatives(&found.haves)
                ),
            )
        })
        .collect();
    Ok(reply)
}

fn report_unresolved(reply: &mut Reply, unresolved: &[String]) {
    if !unresolved.is_empty() {
        reply.push_line(format!("Couldn't recognise: {}", unresolved.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::common::error::MapError;
    use crate::common::Catalog;
    use crate::matcher::EntityMatcher;
    use crate::store::JsonStore;

    const ASH: UserId = 1;
    const MISTY: UserId = 2;
    const TOWN: CommunityId = 10;

    fn state(dir: &std::path::Path) -> BotState {
        BotState::new(
            Arc::new(JsonStore::new(dir)),
            Arc::new(EntityMatcher::new(Arc::new(Catalog::bundled()))),
            chrono::Duration::minutes(30),
        )
    }

    fn member(author: UserId) -> Invocation {
        Invocation {
            author,
            community: Some(TOWN),
            admin: false,
            owner: false,
        }
    }

    fn admin(author: UserId) -> Invocation {
        Invocation {
            admin: true,
            ..member(author)
        }
    }

    fn run(
        handler: &CommandHandler,
        state: &mut BotState,
        invocation: &Invocation,
        content: &str,
    ) -> Result<Reply, CommandError> {
        let command = handler.parse(content).expect("known command")?;
        handler.execute(state, invocation, command)
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"nicknamestop "Town Hall"  "the hall""#),
            vec!["nicknamestop", "Town Hall", "the hall"]
        );
        assert_eq!(tokenize("a \"\" b"), vec!["a", "", "b"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_parse_ignores_other_messages() {
        let handler = CommandHandler::new("!");
        assert!(handler.parse("town hall").is_none());
        assert!(handler.parse("!dance").is_none());
        assert!(handler.parse("!").is_none());
        assert!(handler.is_command("  !help"));
    }

    #[test]
    fn test_parse_add_stop() {
        let handler = CommandHandler::new("!");
        assert_eq!(
            handler.parse("!addstop Town Hall 42.6 -76.4").unwrap().unwrap(),
            Command::AddStop {
                name: "Town Hall".to_string(),
                coordinates: Coordinates::new(42.6, -76.4),
            }
        );
        assert_eq!(
            handler
                .parse("!addstop Town Hall https://intel.ingress.com/intel?ll=1,2&z=17&pll=42.6,-76.4")
                .unwrap()
                .unwrap(),
            Command::AddStop {
                name: "Town Hall".to_string(),
                coordinates: Coordinates::new(42.6, -76.4),
            }
        );
        assert!(matches!(
            handler.parse("!addstop Town Hall https://intel.ingress.com/intel?z=17"),
            Some(Err(CommandError::Usage(_)))
        ));
        assert!(matches!(
            handler.parse("!addstop 42.6 -76.4"),
            Some(Err(CommandError::Usage(_)))
        ));
    }

    #[test]
    fn test_parse_friend_mention() {
        let handler = CommandHandler::new("!");
        assert_eq!(
            handler.parse("!addfriend <@!1234>").unwrap().unwrap(),
            Command::AddFriend(1234)
        );
        assert!(handler.parse("!addfriend brock").unwrap().is_err());
    }

    #[test]
    fn test_research_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &admin(ASH), "!setbounds 42.0 -77.0 43.0 -76.0").unwrap();
        let reply = run(&handler, &mut state, &member(ASH), "!addstop Town Hall 42.6 -76.4").unwrap();
        assert_eq!(
            reply.text.as_deref(),
            Some("Creating stop named: Town Hall at [42.6, -76.4].")
        );

        run(&handler, &mut state, &member(ASH), "!addtask Pikachu \"Catch 5 Pokemon\"").unwrap();
        let reply = run(&handler, &mut state, &member(ASH), "!settask pikachu town hall").unwrap();
        assert!(reply.react);

        let err = run(&handler, &mut state, &member(MISTY), "!settask pikachu town hall").unwrap_err();
        assert!(matches!(err, CommandError::Map(MapError::TaskAlreadyAssigned { .. })));

        let listing = run(&handler, &mut state, &member(ASH), "!listtasks").unwrap();
        assert!(listing.text.unwrap().contains("Catch 5 Pokemon for a Pikachu"));

        let saved = state.store.load_map(TOWN).unwrap().unwrap();
        assert!(saved.stops()[0].has_task());
    }

    #[test]
    fn test_admin_commands_need_permission() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        assert!(matches!(
            run(&handler, &mut state, &member(ASH), "!setbounds 42.0 -77.0 43.0 -76.0"),
            Err(CommandError::NotPermitted)
        ));
        assert!(matches!(
            run(&handler, &mut state, &admin(ASH), "!resetallmaps"),
            Err(CommandError::NotPermitted)
        ));
    }

    #[test]
    fn test_map_commands_need_a_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");
        let direct = Invocation {
            community: None,
            ..member(ASH)
        };
        assert!(matches!(
            run(&handler, &mut state, &direct, "!resetstop town hall"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_ambiguous_stop_saves_temp_nicknames() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &admin(ASH), "!setbounds 42.0 -77.0 43.0 -76.0").unwrap();
        run(&handler, &mut state, &member(ASH), "!addstop Park 42.6 -76.4").unwrap();
        run(&handler, &mut state, &member(ASH), "!addstop Park 42.7 -76.3").unwrap();

        let err = run(&handler, &mut state, &member(ASH), "!resetstop park").unwrap_err();
        assert!(err.to_string().contains("Temp1"));

        let saved = state.store.load_map(TOWN).unwrap().unwrap();
        assert!(saved.stops().iter().all(|s| s.nicknames.len() == 1));
    }

    #[test]
    fn test_reset_task_list_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &member(ASH), "!addtask Pikachu \"Catch 5 Pokemon\"").unwrap();
        run(&handler, &mut state, &admin(ASH), "!resettasklist").unwrap();

        assert!(state.tasks.is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("backups")).unwrap().count(), 1);
    }

    #[test]
    fn test_trade_match_notifies_counterpart_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &member(ASH), "!addoffer grass").unwrap();
        run(&handler, &mut state, &member(ASH), "!addwants grass bulbasaur").unwrap();
        run(&handler, &mut state, &member(ASH), "!addhaves grass charmander").unwrap();

        run(&handler, &mut state, &member(MISTY), "!addoffer fire").unwrap();
        run(&handler, &mut state, &member(MISTY), "!addwants fire charmander").unwrap();
        let reply = run(&handler, &mut state, &member(MISTY), "!addhaves fire bulbasaur").unwrap();

        assert_eq!(reply.text.as_deref(), Some("Your Bulbasaur for <@1>'s Charmander."));
        assert_eq!(
            reply.direct,
            vec![(ASH, "Trade matched! Your Charmander for <@2>'s Bulbasaur".to_string())]
        );

        let again = run(&handler, &mut state, &member(MISTY), "!check fire").unwrap();
        assert!(again.direct.is_empty());
        assert!(again.text.is_some());
    }

    #[test]
    fn test_view_and_remove_all() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &member(ASH), "!addoffer grass").unwrap();
        run(&handler, &mut state, &member(ASH), "!addshinyhaves grass bulbasaur").unwrap();
        let view = run(&handler, &mut state, &member(ASH), "!view grass").unwrap();
        assert_eq!(
            view.text.as_deref(),
            Some("**grass**\n**Haves**\nShiny Bulbasaur\n**Wants**\nNone")
        );

        run(&handler, &mut state, &member(ASH), "!deletehaves grass all").unwrap();
        let offer = state.trades.find_offer(ASH, "grass").unwrap();
        assert!(offer.haves.is_empty());
    }

    #[test]
    fn test_search_by_trainer_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &member(MISTY), "!setname misty").unwrap();
        run(&handler, &mut state, &member(MISTY), "!addoffer water").unwrap();
        run(&handler, &mut state, &member(MISTY), "!addhaves water squirtle").unwrap();

        let reply = run(&handler, &mut state, &member(ASH), "!searchhaves squirtle").unwrap();
        assert_eq!(
            reply.text.as_deref(),
            Some("**Search Results**\nMisty (<@2>)'s offer: water.")
        );

        let offers = run(&handler, &mut state, &member(ASH), "!listoffers Misty").unwrap();
        assert_eq!(offers.text.as_deref(), Some("**Offer Names**\nwater"));

        assert!(matches!(
            run(&handler, &mut state, &member(ASH), "!searchhaves squirtle bulbasaur"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_unresolved_tokens_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let handler = CommandHandler::new("!");

        run(&handler, &mut state, &member(ASH), "!addoffer misc").unwrap();
        let reply = run(&handler, &mut state, &member(ASH), "!addwants misc pikachu xyzzyq").unwrap();
        assert_eq!(reply.text.as_deref(), Some("Couldn't recognise: Xyzzyq"));
        let offer = state.trades.find_offer(ASH, "misc").unwrap();
        assert!(offer.wants.contains("Pikachu"));
    }
}
