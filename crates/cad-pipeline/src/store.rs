use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::artifact_path;

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}

/// Process-local registry of exported artifacts.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    entries: Mutex<HashMap<String, ArtifactEntry>>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Where the artifact with this id lives under the store root.
    pub fn artifact_path(&self, id: &str) -> PathBuf {
        artifact_path(&self.root, id)
    }

    pub fn store(&self, id: impl Into<String>, path: impl Into<PathBuf>) {
        let now = Utc::now();
        self.entries.lock().insert(
            id.into(),
            ArtifactEntry {
                path: path.into(),
                created_at: now,
                accessed_at: now,
            },
        );
    }

    /// Returns the artifact path and refreshes its access time. Entries
    /// whose file disappeared are purged.
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(id)?;
        if entry.path.exists() {
            entry.accessed_at = Utc::now();
            return Some(entry.path.clone());
        }
        debug!(artifact_id = id, "artifact file vanished, purging entry");
        entries.remove(id);
        None
    }

    pub fn entry(&self, id: &str) -> Option<ArtifactEntry> {
        self.entries.lock().get(id).cloned()
    }

    /// Removes the entry and its file; `false` if the id was unknown.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.entries.lock().remove(id);
        match removed {
            Some(entry) => {
                remove_quietly(&entry.path);
                true
            }
            None => false,
        }
    }

    /// Drops every artifact created more than `max_age` ago.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return 0;
        };

        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.created_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(entry) = entries.remove(id) {
                remove_quietly(&entry.path);
            }
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), "evicted expired artifacts");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[cfg(test)]
    fn backdate(&self, id: &str, by: chrono::Duration) {
        if let Some(entry) = self.entries.lock().get_mut(id) {
            entry.created_at -= by;
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %err, "failed to remove artifact file");
    }
}
