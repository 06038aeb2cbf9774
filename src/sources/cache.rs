use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::config::Reload;
use crate::error::GateError;

/// File identity used to decide whether a cached snapshot is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    inode: u64,
}

impl FileStamp {
    fn of(meta: &Metadata) -> Self {
        #[cfg(unix)]
        let inode = std::os::unix::fs::MetadataExt::ino(meta);
        #[cfg(not(unix))]
        let inode = 0;
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            inode,
        }
    }
}

struct Snapshot<T> {
    stamp: FileStamp,
    value: Arc<T>,
}

/// Parsed view of a policy file, re-read according to a [`Reload`] mode.
///
/// In `OnChange` mode every lookup still stats the file, so an edit, a
/// replacement (`mv new old`) or a removal is seen by the very next lookup.
/// Failed stats or loads drop the snapshot; nothing stale is served.
pub struct Cached<T> {
    path: PathBuf,
    mode: Reload,
    state: Mutex<Option<Snapshot<T>>>,
}

impl<T> Cached<T> {
    pub fn new(path: impl Into<PathBuf>, mode: Reload) -> Self {
        Self {
            path: path.into(),
            mode,
            state: Mutex::new(None),
        }
    }

    /// Return the current parsed value, calling `load` when a fresh read is needed.
    pub fn get<F>(&self, load: F) -> Result<Arc<T>, GateError>
    where
        F: FnOnce(&Path) -> Result<T, GateError>,
    {
        if self.mode == Reload::Always {
            return load(&self.path).map(Arc::new);
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| GateError::Internal(format!("cache lock poisoned for {}", self.path.display())))?;

        let meta = match std::fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(source) => {
                *state = None;
                return Err(GateError::ConfigAccess {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let stamp = FileStamp::of(&meta);

        if let Some(snap) = state.as_ref()
            && snap.stamp == stamp
        {
            return Ok(Arc::clone(&snap.value));
        }

        match load(&self.path) {
            Ok(value) => {
                log::debug!("reloaded {}", self.path.display());
                let value = Arc::new(value);
                *state = Some(Snapshot {
                    stamp,
                    value: Arc::clone(&value),
                });
                Ok(value)
            }
            Err(e) => {
                *state = None;
                Err(e)
            }
        }
    }
}
