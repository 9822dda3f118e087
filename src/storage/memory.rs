//! In-memory storage backend
//!
//! Single-process metric table guarded by a read-write lock. Reads take a
//! shared hold and return owned copies; writes take an exclusive hold for
//! their entire duration, including the merge arithmetic. Splitting the read
//! and the write of a counter update into separate locked sections would
//! re-introduce the lost-update race this layout exists to prevent.
//!
//! All data is lost on restart; the snapshot subsystem bridges that gap.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::Storage;
use super::error::{StorageError, StorageResult};
use crate::metric::Metric;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemStorage {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Merge an incoming metric into the table under an already-held write lock.
///
/// Counters accumulate (a missing prior value counts as zero, covered by the
/// insert arm), gauges overwrite, and a kind change for an existing name is
/// rejected.
fn apply(table: &mut HashMap<String, Metric>, name: &str, incoming: Metric) -> StorageResult<()> {
    match table.get_mut(name) {
        None => {
            table.insert(name.to_string(), incoming);
            Ok(())
        }
        Some(Metric::Counter(total)) => match incoming {
            Metric::Counter(delta) => {
                *total += delta;
                Ok(())
            }
            Metric::Gauge(_) => Err(StorageError::KindMismatch(name.to_string())),
        },
        Some(Metric::Gauge(current)) => match incoming {
            Metric::Gauge(value) => {
                *current = value;
                Ok(())
            }
            Metric::Counter(_) => Err(StorageError::KindMismatch(name.to_string())),
        },
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn update_metric(&self, name: &str, metric: Metric) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidName);
        }

        let mut table = self
            .metrics
            .write()
            .map_err(|_| StorageError::TablePoisoned)?;

        apply(&mut table, name, metric)
    }

    async fn get_metric(&self, name: &str) -> StorageResult<Metric> {
        let table = self
            .metrics
            .read()
            .map_err(|_| StorageError::TablePoisoned)?;

        table
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn get_metrics(&self) -> StorageResult<HashMap<String, Metric>> {
        let table = self
            .metrics
            .read()
            .map_err(|_| StorageError::TablePoisoned)?;

        // Owned copy; callers never see a reference into the table
        Ok(table.clone())
    }

    async fn update_metrics_batch(&self, metrics: &HashMap<String, Metric>) -> StorageResult<()> {
        let mut table = self
            .metrics
            .write()
            .map_err(|_| StorageError::TablePoisoned)?;

        // Validate every entry before touching the table so an invalid entry
        // anywhere in the batch leaves the pre-batch state intact. The write
        // lock is held across both passes, so concurrent readers observe
        // either the pre-batch or the fully-applied state.
        for (name, metric) in metrics {
            if name.is_empty() {
                return Err(StorageError::InvalidName);
            }
            if let Some(existing) = table.get(name) {
                if existing.kind() != metric.kind() {
                    return Err(StorageError::KindMismatch(name.clone()));
                }
            }
        }

        for (name, metric) in metrics {
            // cannot fail: validated above
            apply(&mut table, name, *metric)?;
        }

        Ok(())
    }
}
