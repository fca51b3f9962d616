//! JSON file store.
//!
//! Layout under the data directory:
//! - `maps/<community>.json`
//! - `tasklist.json`
//! - `trades.json`
//! - `backups/<timestamp>_tasklist_backup.json`

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::common::error::{StoreError, StoreResult};
use crate::common::CommunityId;
use crate::research::{ResearchMap, TaskRegistry};
use crate::trade::TradeBook;

use super::document::MapDocument;
use super::{Backup, Store};

const MAPS_DIR: &str = "maps";
const BACKUPS_DIR: &str = "backups";
const TASKLIST_FILE: &str = "tasklist.json";
const TRADES_FILE: &str = "trades.json";

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn map_path(&self, community: CommunityId) -> PathBuf {
        self.root.join(MAPS_DIR).join(format!("{}.json", community))
    }
}

impl Store for JsonStore {
    fn load_map(&self, community: CommunityId) -> StoreResult<Option<ResearchMap>> {
        let doc: Option<MapDocument> = read_json(&self.map_path(community))?;
        Ok(doc.map(ResearchMap::from))
    }

    fn save_map(&self, community: CommunityId, map: &ResearchMap) -> StoreResult<()> {
        write_json(&self.map_path(community), &MapDocument::from(map))?;
        debug!(community, stops = map.stops().len(), "Map saved");
        Ok(())
    }

    fn communities(&self) -> StoreResult<Vec<CommunityId>> {
        let dir = self.root.join(MAPS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut communities = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                communities.push(id);
            }
        }
        communities.sort_unstable();
        Ok(communities)
    }

    fn load_tasklist(&self) -> StoreResult<Option<TaskRegistry>> {
        read_json(&self.root.join(TASKLIST_FILE))
    }

    fn save_tasklist(&self, tasks: &TaskRegistry) -> StoreResult<()> {
        write_json(&self.root.join(TASKLIST_FILE), tasks)?;
        debug!(tasks = tasks.tasks().len(), "Task list saved");
        Ok(())
    }

    fn backup_tasklist(&self, tasks: &TaskRegistry) -> StoreResult<Backup> {
        let name = format!(
            "{}_tasklist_backup.json",
            Utc::now().format("%Y.%m.%d.%H%M%S")
        );
        let path = self.root.join(BACKUPS_DIR).join(name);
        write_json(&path, tasks)?;
        info!("Task list backed up to {}", path.display());
        Ok(Backup::new(path))
    }

    fn load_trades(&self) -> StoreResult<Option<TradeBook>> {
        read_json(&self.root.join(TRADES_FILE))
    }

    fn save_trades(&self, book: &TradeBook) -> StoreResult<()> {
        write_json(&self.root.join(TRADES_FILE), book)?;
        debug!("Trades saved");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })
}

/// Write through a temporary sibling file and rename over the target.
fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Coordinates;
    use crate::research::Task;

    #[test]
    fn test_missing_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.load_map(1).unwrap().is_none());
        assert!(store.load_tasklist().unwrap().is_none());
        assert!(store.load_trades().unwrap().is_none());
        assert!(store.communities().unwrap().is_empty());
    }

    #[test]
    fn test_map_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let mut map = ResearchMap::new();
        map.set_bounds(Coordinates::new(42.0, -77.0), Coordinates::new(43.0, -76.0))
            .unwrap();
        map.new_stop(Coordinates::new(42.6, -76.4), "Town Hall").unwrap();

        store.save_map(42, &map).unwrap();
        let loaded = store.load_map(42).unwrap().unwrap();
        assert_eq!(loaded.stops(), map.stops());
        assert_eq!(store.communities().unwrap(), vec![42]);
        assert!(!dir.path().join("maps").join("42.json.tmp").exists());
    }

    #[test]
    fn test_tasklist_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let mut tasks = TaskRegistry::new();
        tasks.add_task(Task::new("Pikachu", "Catch 5 Pokemon", false));
        store.save_tasklist(&tasks).unwrap();

        let backup = store.backup_tasklist(&tasks).unwrap();
        assert!(backup.path().exists());
        assert!(backup
            .path()
            .to_string_lossy()
            .ends_with("_tasklist_backup.json"));

        tasks.clear(&backup);
        let saved = store.load_tasklist().unwrap().unwrap();
        assert_eq!(saved.tasks().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TRADES_FILE), "{not json").unwrap();
        let store = JsonStore::new(dir.path());
        assert!(matches!(store.load_trades(), Err(StoreError::Json { .. })));
    }
}
