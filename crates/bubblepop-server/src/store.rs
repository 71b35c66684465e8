use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use bubblepop_core::player::{Player, PlayerId};
use bubblepop_core::services::PersistenceStore;

/// Everything persisted for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub name: String,
    #[serde(default)]
    pub ints: BTreeMap<String, i64>,
    #[serde(default)]
    pub names: BTreeMap<String, BTreeSet<String>>,
}

type StatsTable = BTreeMap<PlayerId, PlayerStats>;

/// Player-keyed variables, kept in memory. Writes mark the table dirty;
/// [`JsonFileStore::persist`] mirrors it to the JSON file when a path is
/// configured.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data: Arc<RwLock<StatsTable>>,
    dirty: Arc<AtomicBool>,
    path: Option<PathBuf>,
}

impl JsonFileStore {
    pub fn in_memory() -> Self {
        Self {
            data: Arc::new(RwLock::new(StatsTable::new())),
            dirty: Arc::new(AtomicBool::new(false)),
            path: None,
        }
    }

    /// Open the store at `path`, loading existing stats when the file is
    /// present and parseable.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let table = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<StatsTable>(&bytes) {
                Ok(table) => {
                    tracing::info!(path = %path.display(), players = table.len(), "Loaded stats");
                    table
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable stats file, starting empty");
                    StatsTable::new()
                },
            },
            Err(_) => StatsTable::new(),
        };
        Self {
            data: Arc::new(RwLock::new(table)),
            dirty: Arc::new(AtomicBool::new(false)),
            path: Some(path),
        }
    }

    pub fn stats(&self, player_id: PlayerId) -> Option<PlayerStats> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player_id)
            .cloned()
    }

    /// Write the table to disk if anything changed since the last call.
    pub async fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let bytes = {
            let table = self.data.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_vec_pretty(&*table)
        };
        let bytes = match bytes {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize stats");
                return;
            },
        };
        if let Err(e) = tokio::fs::write(path, bytes).await {
            self.dirty.store(true, Ordering::Release);
            tracing::warn!(path = %path.display(), error = %e, "Failed to write stats file");
        }
    }

    fn update(&self, player: &Player, f: impl FnOnce(&mut PlayerStats)) {
        let mut table = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let entry = table.entry(player.id).or_default();
        entry.name.clone_from(&player.name);
        f(entry);
        self.dirty.store(true, Ordering::Release);
    }
}

impl PersistenceStore for JsonFileStore {
    fn get_int(&self, player: &Player, var: &str) -> Option<i64> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player.id)
            .and_then(|s| s.ints.get(var).copied())
    }

    fn set_int(&mut self, player: &Player, var: &str, value: i64) {
        self.update(player, |s| {
            s.ints.insert(var.to_string(), value);
        });
    }

    fn get_names(&self, player: &Player, var: &str) -> Option<BTreeSet<String>> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player.id)
            .and_then(|s| s.names.get(var).cloned())
    }

    fn set_names(&mut self, player: &Player, var: &str, value: BTreeSet<String>) {
        self.update(player, |s| {
            s.names.insert(var.to_string(), value);
        });
    }
}
