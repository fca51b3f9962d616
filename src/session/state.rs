//! Shared bot state.
//!
//! Everything mutable lives in one `BotState` behind an async mutex. Commands,
//! conversational reports and the periodic sweep all lock it, so no two of
//! them ever mutate the same map or registry at once.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::common::error::StoreResult;
use crate::common::{CommunityId, UserId};
use crate::matcher::EntityMatcher;
use crate::research::{ResearchMap, TaskRegistry};
use crate::store::Store;
use crate::trade::TradeBook;

use super::report::{ReportOutcome, ReportTracker};

pub type SharedState = Arc<Mutex<BotState>>;

/// One community's research map and the report in progress there.
#[derive(Debug)]
pub struct CommunitySession {
    pub map: ResearchMap,
    pub reports: ReportTracker,
}

impl CommunitySession {
    pub fn new(map: ResearchMap) -> Self {
        Self {
            map,
            reports: ReportTracker::new(),
        }
    }
}

pub struct BotState {
    pub tasks: TaskRegistry,
    pub trades: TradeBook,
    pub matcher: Arc<EntityMatcher>,
    pub store: Arc<dyn Store>,
    sessions: HashMap<CommunityId, CommunitySession>,
    overlay_expiry: Duration,
}

impl BotState {
    pub fn new(store: Arc<dyn Store>, matcher: Arc<EntityMatcher>, overlay_expiry: Duration) -> Self {
        Self {
            tasks: TaskRegistry::new(),
            trades: TradeBook::new(),
            matcher,
            store,
            sessions: HashMap::new(),
            overlay_expiry,
        }
    }

    /// Load the task list, the trade book and every saved map.
    pub fn load(
        store: Arc<dyn Store>,
        matcher: Arc<EntityMatcher>,
        overlay_expiry: Duration,
    ) -> StoreResult<Self> {
        let mut state = Self::new(store.clone(), matcher, overlay_expiry);
        state.tasks = store.load_tasklist()?.unwrap_or_default();
        state.trades = store.load_trades()?.unwrap_or_default();

        for community in store.communities()? {
            if let Some(mut map) = store.load_map(community)? {
                map.set_overlay_expiry(overlay_expiry);
                state.sessions.insert(community, CommunitySession::new(map));
            }
        }
        info!(
            maps = state.sessions.len(),
            tasks = state.tasks.tasks().len(),
            "State loaded"
        );
        Ok(state)
    }

    /// The session of a community, with an empty map if it has none yet.
    pub fn session(&mut self, community: CommunityId) -> &mut CommunitySession {
        self.research(community).0
    }

    /// A community's session together with the shared task list.
    pub fn research(&mut self, community: CommunityId) -> (&mut CommunitySession, &mut TaskRegistry) {
        let expiry = self.overlay_expiry;
        let session = self.sessions.entry(community).or_insert_with(|| {
            let mut map = ResearchMap::new();
            map.set_overlay_expiry(expiry);
            CommunitySession::new(map)
        });
        (session, &mut self.tasks)
    }

    /// Feed a non-command message to a community's report tracker. The map is
    /// saved when the report or the stop lookup behind it changed anything.
    pub fn report(
        &mut self,
        community: CommunityId,
        author: UserId,
        message: u64,
        content: &str,
    ) -> ReportOutcome {
        let (session, tasks) = self.research(community);
        let outcome = session
            .reports
            .handle(&mut session.map, tasks, author, message, content);
        let lookup_changed = session.map.take_lookup_changes();

        if lookup_changed || matches!(outcome, ReportOutcome::Applied { changed: true, .. }) {
            if let Err(e) = self.save_map(community) {
                error!(community, "Failed to save map: {}", e);
            }
        }
        outcome
    }

    pub fn communities(&self) -> Vec<CommunityId> {
        self.sessions.keys().copied().collect()
    }

    pub fn save_map(&self, community: CommunityId) -> StoreResult<()> {
        match self.sessions.get(&community) {
            Some(session) => self.store.save_map(community, &session.map),
            None => Ok(()),
        }
    }

    pub fn save_tasks(&self) -> StoreResult<()> {
        self.store.save_tasklist(&self.tasks)
    }

    pub fn save_trades(&self) -> StoreResult<()> {
        self.store.save_trades(&self.trades)
    }

    /// Reset stale stops and expired overlays in every map. Returns the communities that changed.
    pub fn reset_old_stops(&mut self) -> Vec<CommunityId> {
        let mut changed: Vec<CommunityId> = self
            .sessions
            .iter_mut()
            .filter_map(|(community, session)| session.map.reset_old_stops().then_some(*community))
            .collect();
        changed.sort_unstable();
        changed
    }
}

impl std::fmt::Debug for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotState")
            .field("tasks", &self.tasks.tasks().len())
            .field("communities", &self.sessions.len())
            .finish()
    }
}
