use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Filesystem layout for per-case storage. Every case owns two directories:
/// an inbox for uploaded originals and an index for retrieval artifacts.
/// Both paths embed the case id, so they can only be derived after the row
/// has been inserted.
#[derive(Clone, Debug)]
pub struct CaseStorage {
    inbox_base: PathBuf,
    index_base: PathBuf,
}

#[derive(Debug, Error)]
#[error("failed to remove {path}: {source}")]
pub struct RemoveError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl CaseStorage {
    pub fn new(inbox_base: impl Into<PathBuf>, index_base: impl Into<PathBuf>) -> Self {
        Self {
            inbox_base: inbox_base.into(),
            index_base: index_base.into(),
        }
    }

    /// `{INBOX_DIR}/{case_id}/original`
    pub fn input_dir(&self, case_id: i32) -> PathBuf {
        self.inbox_base.join(case_id.to_string()).join("original")
    }

    /// `{INDEX_DIR}/{case_id}`
    pub fn index_dir(&self, case_id: i32) -> PathBuf {
        self.index_base.join(case_id.to_string())
    }

    /// Creates both directories for a case, parents included. Idempotent.
    /// Failures propagate; a case without its directories is unusable.
    pub fn ensure_case_dirs(&self, case_id: i32) -> io::Result<(PathBuf, PathBuf)> {
        let input_dir = self.input_dir(case_id);
        let index_dir = self.index_dir(case_id);
        fs::create_dir_all(&input_dir)?;
        fs::create_dir_all(&index_dir)?;
        Ok((input_dir, index_dir))
    }
}

/// Best-effort removal of a case's recorded paths. Returns the failures
/// instead of propagating them: the caller logs each one and the request
/// still succeeds. Empty and already-missing paths count as removed.
pub fn remove_case_dirs(input_dir: &str, index_dir: &str) -> Vec<RemoveError> {
    [input_dir, index_dir]
        .iter()
        .filter(|path| !path.is_empty())
        .filter_map(|path| remove_path(Path::new(path)).err())
        .collect()
}

fn remove_path(path: &Path) -> Result<(), RemoveError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };
    result.map_err(|source| RemoveError {
        path: path.to_path_buf(),
        source,
    })
}
