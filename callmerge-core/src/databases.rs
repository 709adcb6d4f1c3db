//! Database pre-flight verification.
//!
//! Before any expensive stage runs, every enabled database must resolve to an
//! existing, non-empty resource. A database path may name a file, a
//! directory, or a BLAST-style prefix (`nr` for `nr.pal`, `nr.00.phr`, ...).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::types::CallmergeError;

/// One configured database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSpec {
    pub name: String,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl DatabaseSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            enabled: true,
        }
    }
}

/// Pre-flight check for configured databases.
pub trait DatabaseVerifier: Sync {
    /// Fails with a configuration error naming every database that does not resolve.
    fn verify(&self, databases: &[DatabaseSpec]) -> Result<(), CallmergeError>;
}

/// Checks databases against the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemVerifier;

impl DatabaseVerifier for FilesystemVerifier {
    fn verify(&self, databases: &[DatabaseSpec]) -> Result<(), CallmergeError> {
        let missing: Vec<String> = databases
            .iter()
            .filter(|db| db.enabled)
            .filter(|db| {
                let found = resolves(&db.path);
                debug!(database = %db.name, path = %db.path.display(), found, "checked database");
                !found
            })
            .map(|db| format!("{} ({})", db.name, db.path.display()))
            .collect();

        if missing.is_empty() {
            info!(
                count = databases.iter().filter(|db| db.enabled).count(),
                "all databases verified"
            );
            Ok(())
        } else {
            Err(CallmergeError::Configuration(format!(
                "missing or empty databases: {}",
                missing.join(", ")
            )))
        }
    }
}

fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

/// Whether a database path names a usable resource.
#[must_use]
pub fn resolves(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    if path.is_dir() {
        return non_empty_dir(path);
    }
    if non_empty_file(path) {
        return true;
    }
    blast_prefix_resolves(path)
}

fn blast_prefix_resolves(prefix: &Path) -> bool {
    let Some(stem) = prefix.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let parent = match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(entries) = fs::read_dir(parent) else {
        return false;
    };
    let dotted = format!("{stem}.");
    entries.filter_map(Result::ok).any(|entry| {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&dotted))
            && non_empty_file(&entry.path())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_directory_and_prefix_resolve() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pvogs.fasta");
        fs::write(&file, ">p1\nMKV\n").unwrap();
        let db_dir = dir.path().join("hmm");
        fs::create_dir(&db_dir).unwrap();
        fs::write(db_dir.join("profiles.hmm"), "HMMER3").unwrap();
        fs::write(dir.path().join("nr.pal"), "TITLE nr").unwrap();

        assert!(resolves(&file));
        assert!(resolves(&db_dir));
        assert!(resolves(&dir.path().join("nr")));
    }

    #[test]
    fn test_empty_resources_do_not_resolve() {
        let dir = TempDir::new().unwrap();
        let empty_file = dir.path().join("empty.fasta");
        fs::write(&empty_file, "").unwrap();
        let empty_dir = dir.path().join("empty_dir");
        fs::create_dir(&empty_dir).unwrap();

        assert!(!resolves(&empty_file));
        assert!(!resolves(&empty_dir));
        assert!(!resolves(&dir.path().join("absent")));
        assert!(!resolves(Path::new("")));
    }

    #[test]
    fn test_verifier_lists_every_missing_database() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("kegg.fasta");
        fs::write(&present, ">k\nMA\n").unwrap();

        let databases = vec![
            DatabaseSpec::new("kegg", &present),
            DatabaseSpec::new("pvogs", dir.path().join("pvogs")),
            DatabaseSpec::new("phantome", dir.path().join("phantome.fasta")),
        ];
        let err = FilesystemVerifier.verify(&databases).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, CallmergeError::Configuration(_)));
        assert!(message.contains("pvogs"));
        assert!(message.contains("phantome"));
        assert!(!message.contains("kegg"));
    }

    #[test]
    fn test_verifier_skips_disabled_databases() {
        let databases = vec![DatabaseSpec {
            name: "nr".to_string(),
            path: PathBuf::from("/nonexistent/nr"),
            enabled: false,
        }];
        assert!(FilesystemVerifier.verify(&databases).is_ok());
    }
}
