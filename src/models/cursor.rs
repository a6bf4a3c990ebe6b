use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CursorError;

/// Ordering for chat message ids. GroupMe ids are decimal strings that grow over time.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

pub trait CursorStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, CursorError>;
    /// Records `id` only if it is newer than the stored value. Returns whether it moved.
    fn advance(&self, id: &str) -> Result<bool, CursorError>;
    fn reset(&self) -> Result<bool, CursorError>;
}

/// Last processed message id, persisted as a single line.
#[derive(Debug, Clone)]
pub struct FileCursor {
    path: PathBuf,
}

impl FileCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CursorStore for FileCursor {
    fn load(&self) -> Result<Option<String>, CursorError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = content.trim();
                if id.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(id.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CursorError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn advance(&self, id: &str) -> Result<bool, CursorError> {
        if let Some(current) = self.load()? {
            if compare_ids(id, &current) != Ordering::Greater {
                debug!(cursor = %current, candidate = id, "cursor not advanced");
                return Ok(false);
            }
        }
        let write_err = |source| CursorError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        // Write-then-rename so a crash never leaves a truncated id behind.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, id).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!(cursor = id, "cursor advanced");
        Ok(true)
    }

    fn reset(&self) -> Result<bool, CursorError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "cursor reset");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CursorError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
