//! Runtime configuration consumed by the storage engine
//!
//! Flag/env parsing proper belongs to the surrounding process bootstrap; this
//! module only reads the handful of settings the engine itself consumes.
//! Presence of a database DSN selects the relational backend, its absence the
//! in-memory one.

use std::env;
use std::path::PathBuf;

const STORE_INTERVAL: &str = "STORE_INTERVAL";
const FILE_STORAGE_PATH: &str = "FILE_STORAGE_PATH";
const RESTORE: &str = "RESTORE";
const DATABASE_DSN: &str = "DATABASE_DSN";

const DEFAULT_STORE_INTERVAL: u64 = 300;
const DEFAULT_FILE_STORAGE_PATH: &str = "/tmp/metrics-db.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between periodic snapshot saves; zero disables them.
    pub store_interval: u64,

    /// Path of the snapshot file.
    pub file_storage_path: PathBuf,

    /// Whether to restore the in-memory store from the snapshot at startup.
    pub restore: bool,

    /// Database connection string; `None` selects the in-memory backend.
    pub database_dsn: Option<String>,
}

impl Config {
    /// Read configuration from the environment, falling back to defaults for
    /// unset or unparsable values.
    pub fn from_env() -> Self {
        let store_interval = env::var(STORE_INTERVAL)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_STORE_INTERVAL);

        let file_storage_path = env::var(FILE_STORAGE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_FILE_STORAGE_PATH));

        let restore = env::var(RESTORE)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(true);

        let database_dsn = env::var(DATABASE_DSN).ok().filter(|dsn| !dsn.is_empty());

        Self {
            store_interval,
            file_storage_path,
            restore,
            database_dsn,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_interval: DEFAULT_STORE_INTERVAL,
            file_storage_path: PathBuf::from(DEFAULT_FILE_STORAGE_PATH),
            restore: true,
            database_dsn: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.store_interval, 300);
        assert_eq!(
            config.file_storage_path,
            PathBuf::from("/tmp/metrics-db.json")
        );
        assert!(config.restore);
        assert!(config.database_dsn.is_none());
    }
}
