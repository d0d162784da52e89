//! Configuration and data directory management.
//!
//! Segue stores its library database in the platform-standard data
//! directory:
//! - Linux: `~/.local/share/segue/`
//! - macOS: `~/Library/Application Support/segue/`
//! - Windows: `%APPDATA%\segue\`
//!
//! The directory is created on first use. An explicit `--db` path on the
//! CLI (or `SEGUE_DB`) overrides the default location entirely.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Returns the platform-appropriate database file path, creating the
/// `segue` data subdirectory if it does not exist yet.
///
/// # Errors
///
/// Fails when the platform has no standard data directory or the
/// subdirectory cannot be created.
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("library.db"))
}

/// Returns the `segue` data directory itself, creating it if needed.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("could not determine the system data directory for this platform")?;
    let segue_dir = data_dir.join("segue");
    fs::create_dir_all(&segue_dir).with_context(|| {
        format!(
            "failed to create data directory at {}",
            segue_dir.display()
        )
    })?;
    Ok(segue_dir)
}

/// Runtime settings resolved from defaults, environment, and CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the library database file.
    pub db_path: PathBuf,
    /// User id all operations run as. Single-user installs keep the
    /// default of 1.
    pub user_id: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: get_db_path().unwrap_or_else(|_| PathBuf::from("library.db")),
            user_id: 1,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Result<Self> {
        Ok(Self {
            db_path: get_db_path()?,
            user_id: 1,
        })
    }

    /// Configuration with an explicit database path, e.g. from `--db`.
    #[must_use]
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self { db_path, user_id: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_is_stable_and_absolute() {
        let path1 = get_db_path().expect("first call should succeed");
        let path2 = get_db_path().expect("second call should succeed");
        assert_eq!(path1, path2);
        assert!(path1.is_absolute());
        assert_eq!(path1.file_name().unwrap(), "library.db");
    }

    #[test]
    fn db_path_lives_under_the_segue_directory() {
        let path = get_db_path().expect("should get valid path");
        let parent = path.parent().expect("should have parent directory");
        assert_eq!(parent.file_name().unwrap(), "segue");
        assert!(parent.is_dir());
    }

    #[test]
    fn explicit_path_overrides_default() {
        let cfg = RuntimeConfig::with_db_path(PathBuf::from("/tmp/other.db"));
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(cfg.user_id, 1);
    }
}
