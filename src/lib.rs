//! Metric accumulation engine
//!
//! The storage core of a metrics collection pipeline: an agent pushes
//! runtime measurements to a server, and this crate owns the correctness of
//! the accumulated values under concurrent writers.
//!
//! - [`metric`]: the domain model — counters accumulate, gauges overwrite
//! - [`storage`]: one trait, two backends (in-memory and PostgreSQL)
//! - [`snapshot`]: crash-safe-enough persistence for the in-memory backend
//! - [`retry`]: classifies failures and re-runs transient ones
//! - [`repository`]: the facade the service layer consumes
//! - [`config`]: the environment settings the engine reacts to

pub mod config;
pub mod metric;
pub mod repository;
pub mod retry;
pub mod snapshot;
pub mod storage;

pub use config::Config;
pub use metric::{Metric, MetricKind};
pub use repository::MetricRepository;
pub use snapshot::Snapshotter;
pub use storage::{Storage, StorageError, StorageResult};
