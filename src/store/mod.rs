//! Persistence of maps, the task list and the trade book.

pub mod document;
pub mod json;

use std::path::{Path, PathBuf};

use crate::common::error::StoreResult;
use crate::common::CommunityId;
use crate::research::{ResearchMap, TaskRegistry};
use crate::trade::TradeBook;

pub use json::JsonStore;

/// Receipt of a task list snapshot written to durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    path: PathBuf,
}

impl Backup {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Durable storage. Loads return `None` when nothing was saved yet.
pub trait Store: Send + Sync {
    fn load_map(&self, community: CommunityId) -> StoreResult<Option<ResearchMap>>;
    fn save_map(&self, community: CommunityId, map: &ResearchMap) -> StoreResult<()>;
    /// Communities that have a saved map.
    fn communities(&self) -> StoreResult<Vec<CommunityId>>;

    fn load_tasklist(&self) -> StoreResult<Option<TaskRegistry>>;
    fn save_tasklist(&self, tasks: &TaskRegistry) -> StoreResult<()>;
    /// Write a timestamped snapshot of the task list.
    fn backup_tasklist(&self, tasks: &TaskRegistry) -> StoreResult<Backup>;

    fn load_trades(&self) -> StoreResult<Option<TradeBook>>;
    fn save_trades(&self, book: &TradeBook) -> StoreResult<()>;
}
