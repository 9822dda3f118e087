//! Storage backends for metric accumulation
//!
//! A single trait, two implementations selected at startup by configuration:
//!
//! - **In-memory** (default): lock-protected table, single process, volatile;
//!   paired with the snapshot subsystem for restart survival
//! - **PostgreSQL** (feature `storage-postgres`): upsert-based table, safe
//!   for multiple writer processes
//!
//! Callers go through the [`crate::repository::MetricRepository`] facade
//! rather than the trait directly.

pub mod error;
pub mod memory;
#[cfg(feature = "storage-postgres")]
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::Config;
use crate::metric::Metric;
use crate::snapshot;

pub use error::{StorageError, StorageResult};
pub use memory::MemStorage;
#[cfg(feature = "storage-postgres")]
pub use postgres::PgStorage;

/// Trait for metric storage backends
///
/// Implementations must be `Send + Sync`; they are called concurrently from
/// request-handling tasks, the snapshot timer and the shutdown path.
///
/// ## Contract
///
/// - A metric is created implicitly by its first successful update.
/// - For a fixed name the kind never changes; conflicting updates are
///   rejected with [`StorageError::KindMismatch`].
/// - Counter updates add their delta to the running total; gauge updates
///   replace the stored value.
/// - Reads return owned copies, never references into the table.
/// - `update_metrics_batch` is all-or-nothing: an invalid entry anywhere in
///   the batch leaves the table in its pre-batch state.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Apply a single metric update.
    async fn update_metric(&self, name: &str, metric: Metric) -> StorageResult<()>;

    /// Fetch one metric by name, [`StorageError::NotFound`] if absent.
    async fn get_metric(&self, name: &str) -> StorageResult<Metric>;

    /// Fetch a point-in-time copy of the whole table.
    async fn get_metrics(&self) -> StorageResult<HashMap<String, Metric>>;

    /// Apply every entry of the batch atomically.
    async fn update_metrics_batch(&self, metrics: &HashMap<String, Metric>) -> StorageResult<()>;
}

/// Build the storage backend selected by the configuration.
///
/// A configured database DSN selects the PostgreSQL store; otherwise the
/// in-memory store is used, populated from the snapshot file when `restore`
/// is set. A failed restore is logged and degrades to an empty store rather
/// than failing startup — losing accumulated values is preferable to
/// refusing to serve.
pub async fn from_config(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    #[cfg(feature = "storage-postgres")]
    if let Some(dsn) = &config.database_dsn {
        let storage = PgStorage::connect(dsn).await?;
        info!("using PostgreSQL metric storage");
        return Ok(Arc::new(storage));
    }

    #[cfg(not(feature = "storage-postgres"))]
    if config.database_dsn.is_some() {
        tracing::warn!(
            "database DSN configured but postgres support is compiled out, using in-memory storage"
        );
    }

    let storage = if config.restore {
        match snapshot::restore_from_file(&config.file_storage_path).await {
            Ok(storage) => storage,
            Err(err) => {
                error!(
                    error = %err,
                    file = %config.file_storage_path.display(),
                    "failed to restore metrics from file, using empty storage"
                );
                MemStorage::new()
            }
        }
    } else {
        MemStorage::new()
    };

    info!("using in-memory metric storage");
    Ok(Arc::new(storage))
}
