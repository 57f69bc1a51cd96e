//! Persistence of already-announced challenge ids.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifiedStoreError {
    #[error("State file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Storage for the notified challenge set. The whole set is written on every save.
pub trait NotifiedStore: Send + Sync {
    fn load(&self) -> Result<BTreeSet<u64>, NotifiedStoreError>;

    fn save(&self, notified: &BTreeSet<u64>) -> Result<(), NotifiedStoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    notified_challenges: Vec<u64>,
    /// Informational only; older files carry zoneless timestamps.
    #[serde(default)]
    last_updated: Option<String>,
}

/// JSON file store: `{"notified_challenges": [..], "last_updated": ".."}`.
#[derive(Debug, Clone)]
pub struct JsonNotifiedStore {
    path: PathBuf,
}

impl JsonNotifiedStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotifiedStore for JsonNotifiedStore {
    /// A missing file is an empty set.
    fn load(&self) -> Result<BTreeSet<u64>, NotifiedStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };
        let state: StateFile = serde_json::from_str(&content)?;
        Ok(state.notified_challenges.into_iter().collect())
    }

    fn save(&self, notified: &BTreeSet<u64>) -> Result<(), NotifiedStoreError> {
        let state = StateFile {
            notified_challenges: notified.iter().copied().collect(),
            last_updated: Some(Utc::now().to_rfc3339()),
        };
        let json = serde_json::to_string_pretty(&state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Replace atomically
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests and runs without a state file.
#[derive(Debug, Default)]
pub struct MemoryNotifiedStore {
    ids: Mutex<BTreeSet<u64>>,
}

impl MemoryNotifiedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
        }
    }
}

impl NotifiedStore for MemoryNotifiedStore {
    fn load(&self) -> Result<BTreeSet<u64>, NotifiedStoreError> {
        Ok(self.ids.lock().unwrap().clone())
    }

    fn save(&self, notified: &BTreeSet<u64>) -> Result<(), NotifiedStoreError> {
        *self.ids.lock().unwrap() = notified.clone();
        Ok(())
    }
}
