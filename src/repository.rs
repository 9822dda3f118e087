//! Backend-agnostic facade over metric storage
//!
//! The service/handler layer talks to [`MetricRepository`] instead of a
//! concrete store. Built with [`MetricRepository::with_retries`], every call
//! is wrapped by the retry executor — the right construction when the
//! backend is the relational store, whose failures can be transient. The
//! in-memory store only ever fails with non-retriable errors, so the plain
//! constructor skips the wrapping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::metric::Metric;
use crate::retry;
use crate::storage::{Storage, StorageResult};

/// Facade over the configured storage backend.
#[derive(Clone)]
pub struct MetricRepository {
    storage: Arc<dyn Storage>,
    retry: bool,
}

impl MetricRepository {
    /// Facade without retry wrapping, for the in-memory backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            retry: false,
        }
    }

    /// Facade with every call wrapped by the retry executor, for the
    /// relational backend.
    pub fn with_retries(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            retry: true,
        }
    }

    /// Apply a single metric update.
    pub async fn update_one(&self, name: &str, metric: Metric) -> StorageResult<()> {
        if self.retry {
            retry::with_retries(|| self.storage.update_metric(name, metric)).await
        } else {
            self.storage.update_metric(name, metric).await
        }
    }

    /// Add a delta to a counter, creating it at zero if absent.
    pub async fn update_counter(&self, name: &str, delta: i64) -> StorageResult<()> {
        self.update_one(name, Metric::Counter(delta)).await
    }

    /// Overwrite a gauge value.
    pub async fn update_gauge(&self, name: &str, value: f64) -> StorageResult<()> {
        self.update_one(name, Metric::Gauge(value)).await
    }

    /// Fetch one metric by name.
    pub async fn get_one(&self, name: &str) -> StorageResult<Metric> {
        if self.retry {
            retry::with_retries(|| self.storage.get_metric(name)).await
        } else {
            self.storage.get_metric(name).await
        }
    }

    /// Fetch a copy of the whole metric table.
    pub async fn get_all(&self) -> StorageResult<HashMap<String, Metric>> {
        if self.retry {
            retry::with_retries(|| self.storage.get_metrics()).await
        } else {
            self.storage.get_metrics().await
        }
    }

    /// Apply a batch of updates atomically.
    pub async fn update_batch(&self, metrics: &HashMap<String, Metric>) -> StorageResult<()> {
        if self.retry {
            retry::with_retries(|| self.storage.update_metrics_batch(metrics)).await
        } else {
            self.storage.update_metrics_batch(metrics).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use assert_matches::assert_matches;
    use crate::storage::StorageError;

    fn repo() -> MetricRepository {
        MetricRepository::new(Arc::new(MemStorage::new()))
    }

    #[tokio::test]
    async fn test_typed_writers() {
        let repo = repo();

        repo.update_counter("requests", 5).await.unwrap();
        repo.update_counter("requests", 3).await.unwrap();
        repo.update_gauge("temp", 36.6).await.unwrap();
        repo.update_gauge("temp", 37.1).await.unwrap();

        assert_eq!(repo.get_one("requests").await.unwrap(), Metric::Counter(8));
        assert_eq!(repo.get_one("temp").await.unwrap(), Metric::Gauge(37.1));
    }

    #[tokio::test]
    async fn test_batch_through_facade() {
        let repo = repo();

        let batch = HashMap::from([
            ("requests".to_string(), Metric::Counter(5)),
            ("temp".to_string(), Metric::Gauge(36.6)),
        ]);
        repo.update_batch(&batch).await.unwrap();

        assert_eq!(repo.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_wrapping_passes_validation_errors_through() {
        // validation errors are non-retriable, so the wrapped facade returns
        // them immediately even with retries enabled
        let repo = MetricRepository::with_retries(Arc::new(MemStorage::new()));

        assert_matches!(
            repo.update_counter("", 1).await,
            Err(StorageError::InvalidName)
        );
        assert_matches!(
            repo.get_one("missing").await,
            Err(StorageError::NotFound(_))
        );
    }
}
