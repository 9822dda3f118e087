//! Snapshot persistence for the metric table
//!
//! Bridges the volatility of the in-memory store without a write-ahead log:
//! the whole table is serialized to a JSON file on a timer and on shutdown,
//! and read back exactly once at process start.
//!
//! ## File format
//!
//! One JSON object: `{"<name>": {"type": "counter"|"gauge", "value": <n>}}`.
//! Values are plain JSON numbers and are read back through `f64`, with
//! counters narrowed by truncation — counters beyond 2^53 lose exact integer
//! round-trip. The write is not rename-atomic; a crash mid-write can leave a
//! truncated file, which the restore path treats as "start empty".

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{Mutex, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::metric::Metric;
use crate::storage::memory::MemStorage;
use crate::storage::{Storage, StorageError, StorageResult};

/// Periodic snapshot writer for the active store.
pub struct Snapshotter {
    interval: Duration,
    path: PathBuf,
    storage: Arc<dyn Storage>,
    // serializes timer-triggered saves against the shutdown save
    save_lock: Mutex<()>,
}

impl Snapshotter {
    /// `interval_secs` of zero disables periodic saving; the shutdown save
    /// still runs.
    pub fn new(interval_secs: u64, path: impl Into<PathBuf>, storage: Arc<dyn Storage>) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            path: path.into(),
            storage,
            save_lock: Mutex::new(()),
        }
    }

    /// Drive the save loop until the shutdown signal fires, then save one
    /// final time. A failed periodic save is logged and the loop continues;
    /// only the shutdown save propagates its error.
    pub async fn run(&self, mut shutdown: watch::Receiver<()>) -> StorageResult<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            file = %self.path.display(),
            "starting snapshot service"
        );

        if self.interval.is_zero() {
            let _ = shutdown.changed().await;
            return self.save().await;
        }

        let mut ticker = time::interval(self.interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.save().await {
                        error!(error = %err, "failed to save metrics snapshot");
                    }
                }
                _ = shutdown.changed() => {
                    return self.save().await;
                }
            }
        }
    }

    /// Serialize the whole table to the snapshot file.
    pub async fn save(&self) -> StorageResult<()> {
        let _guard = self.save_lock.lock().await;

        debug!(file = %self.path.display(), "saving metrics snapshot");

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let metrics = self.storage.get_metrics().await?;

        let file = File::create(&self.path)?;
        serde_json::to_writer(file, &metrics)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        Ok(())
    }
}

/// Raw snapshot entry, deserialized leniently so one bad entry cannot sink
/// the rest of the file.
#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

impl SnapshotEntry {
    fn into_metric(self) -> Option<Metric> {
        let value = self.value.as_f64()?;
        match self.kind.as_str() {
            // truncating narrow, same as the save-side coercion to a JSON number
            "counter" => Some(Metric::Counter(value as i64)),
            "gauge" => Some(Metric::Gauge(value)),
            _ => None,
        }
    }
}

/// Rebuild an in-memory store from a snapshot file.
///
/// A missing file is a normal first run and yields an empty store. A file
/// that exists but cannot be opened or parsed yields
/// [`StorageError::RestoreFailed`]; the caller's policy is to log and fall
/// back to an empty store. Entries with an unrecognized kind or a
/// non-numeric value are skipped individually.
pub async fn restore_from_file(path: &Path) -> StorageResult<MemStorage> {
    if !path.exists() {
        info!(file = %path.display(), "snapshot file does not exist, starting with empty storage");
        return Ok(MemStorage::new());
    }

    let file = File::open(path).map_err(|err| StorageError::RestoreFailed(err.to_string()))?;
    let entries: HashMap<String, SnapshotEntry> =
        serde_json::from_reader(file).map_err(|err| StorageError::RestoreFailed(err.to_string()))?;

    let storage = MemStorage::new();
    for (name, entry) in entries {
        match entry.into_metric() {
            Some(metric) => {
                if let Err(err) = storage.update_metric(&name, metric).await {
                    warn!(name = %name, error = %err, "failed to restore metric");
                }
            }
            None => {
                warn!(name = %name, "skipping snapshot entry with unrecognized kind or value");
            }
        }
    }

    Ok(storage)
}
