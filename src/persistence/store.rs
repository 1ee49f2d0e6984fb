use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::membership::orset::Membership;

/// Subdirectory of the data dir owned by the peer service.
const SERVICE_DIR: &str = "peer_service";
/// File holding the serialized membership CRDT, nothing else.
const STATE_FILE: &str = "cluster_state";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state write failed: {0}")]
    Write(#[source] io::Error),
    #[error("state delete failed: {0}")]
    Delete(#[source] io::Error),
}

/// Load/store of the membership snapshot.
///
/// All writes go through the manager task, so there are no concurrent
/// writers and the write-then-rename is the only atomicity needed. The
/// state is one small file; the synchronous I/O here is bounded.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: Option<PathBuf>,
}

impl StateStore {
    /// A store rooted at `data_dir`, or a disabled store when `None`.
    pub fn new(data_dir: Option<&Path>) -> Self {
        Self {
            path: data_dir.map(|dir| dir.join(SERVICE_DIR).join(STATE_FILE)),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Reads the persisted membership, if any.
    ///
    /// Returns `None` when persistence is disabled, no file exists, or the
    /// file cannot be decoded. The undecodable case is logged; the caller
    /// seeds a fresh membership rather than refusing to start.
    pub fn load(&self) -> Option<Membership> {
        let path = self.path.as_ref()?;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("Failed to read state file {}: {}", path.display(), err);
                return None;
            }
        };

        match Membership::decode(&bytes) {
            Ok(membership) => {
                debug!(
                    "Loaded cluster state from {} ({} members)",
                    path.display(),
                    membership.len()
                );
                Some(membership)
            }
            Err(err) => {
                warn!(
                    "Discarding undecodable state file {}: {}",
                    path.display(),
                    err
                );
                None
            }
        }
    }

    /// Persists the membership atomically. No-op when disabled.
    pub fn save(&self, membership: &Membership) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(StoreError::Write)?;
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, membership.encode()).map_err(StoreError::Write)?;
        fs::rename(&tmp, path).map_err(StoreError::Write)?;
        Ok(())
    }

    /// Removes the persisted file. Absence is not an error; no-op when
    /// disabled.
    pub fn delete(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Delete(err)),
        }
    }

    /// The file path this store writes to, when enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
