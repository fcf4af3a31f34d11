//! Discovery and creation of the `.docflow/` directory.

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

const DOCFLOW_DIR_NAME: &str = ".docflow";

/// Overrides directory discovery when set to an existing directory.
const DOCFLOW_DIR_ENV: &str = "DOCFLOW_DIR";

/// SQLite database file inside `.docflow/`.
pub const DATABASE_FILE: &str = "docflow.db";

/// Walks up from `start` looking for a `.docflow/` directory.
///
/// `DOCFLOW_DIR` wins when it names an existing directory.
pub fn find_docflow_dir(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(DOCFLOW_DIR_ENV) {
        let env_path = PathBuf::from(&env_dir);
        if env_path.is_dir() {
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    let mut current = start.as_path();
    loop {
        let candidate = current.join(DOCFLOW_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }
    None
}

/// Creates `.docflow/` under `path` (or `path` itself when it already ends
/// in `.docflow`). Returns the directory.
pub fn ensure_docflow_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let dir = if path.ends_with(DOCFLOW_DIR_NAME) {
        path.to_path_buf()
    } else {
        path.join(DOCFLOW_DIR_NAME)
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn database_path(docflow_dir: &Path) -> PathBuf {
    docflow_dir.join(DATABASE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_dir_from_child() {
        let dir = tempfile::tempdir().unwrap();
        let docflow = dir.path().join(".docflow");
        std::fs::create_dir(&docflow).unwrap();
        let child = dir.path().join("forms").join("2026");
        std::fs::create_dir_all(&child).unwrap();

        let found = find_docflow_dir(&child).unwrap().canonicalize().unwrap();
        assert_eq!(found, docflow.canonicalize().unwrap());
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_docflow_dir(dir.path()).unwrap();
        let second = ensure_docflow_dir(&first).unwrap();
        assert!(first.is_dir());
        assert_eq!(first, second);
        assert!(database_path(&first).ends_with(".docflow/docflow.db"));
    }
}
