//! Durable set of already-notified announcement identifiers.
//!
//! The [`DetectedStore`] keeps the set in memory and mirrors it to a single
//! JSON document after every change.
//!
//! **Access rules:**
//! - The poll loop is the sole writer for the lifetime of the process
//! - A load failure (missing or corrupt file) starts from an empty set
//! - A write failure is logged; the in-memory set stays authoritative

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use alphawatch_shared::{AlphaWatchError, Result};

/// Accepted on-disk shapes. Writes always use the bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSet {
    List(Vec<String>),
    Keyed { detected: Vec<String> },
}

impl StoredSet {
    fn into_ids(self) -> Vec<String> {
        match self {
            Self::List(ids) | Self::Keyed { detected: ids } => ids,
        }
    }
}

/// In-memory identifier set backed by a JSON file.
#[derive(Debug)]
pub struct DetectedStore {
    path: PathBuf,
    ids: HashSet<String>,
}

impl DetectedStore {
    /// Load the set from `path`. Never fails: unreadable state means empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match read_ids(&path) {
            Ok(Some(ids)) => {
                info!(path = %path.display(), count = ids.len(), "loaded detected set");
                ids
            }
            Ok(None) => {
                debug!(path = %path.display(), "no detected set on disk, starting empty");
                HashSet::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable detected set, starting empty");
                HashSet::new()
            }
        };

        Self { path, ids }
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `identifier` has not been notified yet.
    pub fn is_new(&self, identifier: &str) -> bool {
        !self.ids.contains(identifier)
    }

    /// Record `identifier` as notified and flush the whole set to disk.
    ///
    /// Returns `false` if it was already present (nothing is written then).
    pub fn mark_notified(&mut self, identifier: &str) -> bool {
        if !self.ids.insert(identifier.to_string()) {
            return false;
        }
        if let Err(e) = self.flush() {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist detected set, keeping in-memory state"
            );
        }
        true
    }

    /// Remove `identifier` so it can be notified again.
    pub fn forget(&mut self, identifier: &str) -> Result<bool> {
        if !self.ids.remove(identifier) {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Overwrite the backing file with the current set.
    ///
    /// Writes a sibling temp file first and renames it into place.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AlphaWatchError::io(parent, e))?;
        }

        let ids = self.identifiers();
        let json = serde_json::to_vec_pretty(&ids)
            .map_err(|e| AlphaWatchError::Storage(format!("serialize detected set: {e}")))?;

        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, json).map_err(|e| AlphaWatchError::io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(AlphaWatchError::io(&self.path, e));
        }

        debug!(path = %self.path.display(), count = ids.len(), "persisted detected set");
        Ok(())
    }

    /// All identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `Ok(None)` when the file does not exist.
fn read_ids(path: &Path) -> Result<Option<HashSet<String>>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AlphaWatchError::io(path, e)),
    };

    let stored: StoredSet = serde_json::from_slice(&bytes)
        .map_err(|e| AlphaWatchError::Storage(format!("{}: {e}", path.display())))?;

    Ok(Some(stored.into_ids().into_iter().collect()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
