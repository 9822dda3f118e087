//! PostgreSQL storage backend implementation
//!
//! Equivalent contract to the in-memory store, safe for multiple concurrent
//! writer processes. Counter accumulation happens server-side in a single
//! upsert (`delta = metrics.delta + $2`), so the database's row-level
//! atomicity stands in for the in-process lock of the memory backend — no
//! client-side read-modify-write is ever issued.
//!
//! This store never retries; transient failures are classified and retried by
//! the layer above (see `retry`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info, instrument};

use super::Storage;
use super::error::{StorageError, StorageResult};
use crate::metric::Metric;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    delta BIGINT,
    value DOUBLE PRECISION
)"#;

// The DO UPDATE arms carry a type guard so an update that disagrees with the
// registered kind affects zero rows instead of silently corrupting them; the
// caller turns that into a KindMismatch error.
const UPSERT_GAUGE: &str = r#"
INSERT INTO metrics (id, type, delta, value)
VALUES ($1, 'gauge', NULL, $2)
ON CONFLICT (id) DO UPDATE
SET delta = NULL,
    value = $2
WHERE metrics.type = 'gauge'"#;

const UPSERT_COUNTER: &str = r#"
INSERT INTO metrics (id, type, delta, value)
VALUES ($1, 'counter', $2, NULL)
ON CONFLICT (id) DO UPDATE
SET delta = metrics.delta + $2,
    value = NULL
WHERE metrics.type = 'counter'"#;

const SELECT_ONE: &str = "SELECT id, type, delta, value FROM metrics WHERE id = $1";
const SELECT_ALL: &str = "SELECT id, type, delta, value FROM metrics";

/// PostgreSQL storage backend
pub struct PgStorage {
    pool: Pool<Postgres>,
}

impl PgStorage {
    /// Connect to the database and bootstrap the metrics table.
    ///
    /// Table creation is idempotent and runs once per construction.
    #[instrument(skip_all)]
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        info!("initializing PostgreSQL metric storage");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(dsn)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        debug!("metrics table ready");

        Ok(Self { pool })
    }

    /// Close the connection pool, waiting for in-flight operations.
    pub async fn close(&self) {
        info!("closing PostgreSQL metric storage");
        self.pool.close().await;
    }

    /// Reconstruct a metric from whichever of delta/value is non-null.
    fn decode_row(row: &PgRow) -> StorageResult<(String, Metric)> {
        let id: String = row.try_get("id")?;
        let kind: String = row.try_get("type")?;
        let delta: Option<i64> = row.try_get("delta")?;
        let value: Option<f64> = row.try_get("value")?;

        let metric = match (kind.as_str(), delta, value) {
            ("counter", Some(delta), _) => Metric::Counter(delta),
            ("gauge", _, Some(value)) => Metric::Gauge(value),
            _ => return Err(StorageError::UnknownKind(kind)),
        };

        Ok((id, metric))
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn update_metric(&self, name: &str, metric: Metric) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidName);
        }

        let result = match metric {
            Metric::Gauge(value) => {
                sqlx::query(UPSERT_GAUGE)
                    .bind(name)
                    .bind(value)
                    .execute(&self.pool)
                    .await?
            }
            Metric::Counter(delta) => {
                sqlx::query(UPSERT_COUNTER)
                    .bind(name)
                    .bind(delta)
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StorageError::KindMismatch(name.to_string()));
        }

        Ok(())
    }

    async fn get_metric(&self, name: &str) -> StorageResult<Metric> {
        let row = sqlx::query(SELECT_ONE)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::decode_row(&row).map(|(_, metric)| metric),
            None => Err(StorageError::NotFound(name.to_string())),
        }
    }

    async fn get_metrics(&self) -> StorageResult<HashMap<String, Metric>> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;

        rows.iter().map(Self::decode_row).collect()
    }

    #[instrument(skip_all, fields(count = metrics.len()))]
    async fn update_metrics_batch(&self, metrics: &HashMap<String, Metric>) -> StorageResult<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        debug!("applying metric batch in one transaction");

        // sqlx prepares and caches the two upsert statements per connection,
        // so each map entry reuses a prepared statement. Early returns drop
        // the transaction, which rolls it back.
        let mut tx = self.pool.begin().await?;

        for (name, metric) in metrics {
            if name.is_empty() {
                return Err(StorageError::InvalidName);
            }

            let result = match metric {
                Metric::Gauge(value) => {
                    sqlx::query(UPSERT_GAUGE)
                        .bind(name)
                        .bind(value)
                        .execute(&mut *tx)
                        .await?
                }
                Metric::Counter(delta) => {
                    sqlx::query(UPSERT_COUNTER)
                        .bind(name)
                        .bind(delta)
                        .execute(&mut *tx)
                        .await?
                }
            };

            if result.rows_affected() == 0 {
                return Err(StorageError::KindMismatch(name.clone()));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
