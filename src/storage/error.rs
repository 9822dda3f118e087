//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
///
/// Validation and not-found errors are routine and handled by the caller; the
/// connection/timeout variants represent transient infrastructure trouble and
/// are the ones the retry layer considers worth re-attempting.
#[derive(Debug)]
pub enum StorageError {
    /// No metric with the requested name
    NotFound(String),

    /// Empty metric name on a write
    InvalidName,

    /// A stored row or snapshot entry carries a kind that is neither
    /// counter nor gauge
    UnknownKind(String),

    /// Update kind conflicts with the kind the name was first written with
    KindMismatch(String),

    /// The metric table lock was poisoned by a panicking writer
    TablePoisoned,

    /// Could not reach or keep a connection to the database
    Connection(String),

    /// Operation or connection acquisition timed out
    Timeout(String),

    /// Database query failed for a non-transient reason
    QueryFailed(String),

    /// I/O error (file access, sockets)
    Io(std::io::Error),

    /// Snapshot serialization failed
    Serialization(String),

    /// Snapshot file exists but could not be read back
    RestoreFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(name) => write!(f, "metric not found: {}", name),
            StorageError::InvalidName => write!(f, "metric name must not be empty"),
            StorageError::UnknownKind(kind) => write!(f, "unknown metric kind: {}", kind),
            StorageError::KindMismatch(name) => {
                write!(f, "metric {} already registered with a different kind", name)
            }
            StorageError::TablePoisoned => write!(f, "metric table lock is poisoned"),
            StorageError::Connection(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::Timeout(msg) => write!(f, "storage operation timed out: {}", msg),
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::Io(err) => write!(f, "I/O error: {}", err),
            StorageError::Serialization(msg) => write!(f, "snapshot serialization error: {}", msg),
            StorageError::RestoreFailed(msg) => write!(f, "error restoring from file: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// PostgreSQL SQLSTATE classes that indicate connection-level trouble:
/// connection exception, does-not-exist, failure, the client/server
/// establishment rejections, and unknown transaction resolution.
#[cfg(feature = "storage-postgres")]
const CONNECTION_SQLSTATES: [&str; 6] = ["08000", "08001", "08003", "08004", "08006", "40000"];

#[cfg(feature = "storage-postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::Io(io_err),
            sqlx::Error::PoolTimedOut => {
                StorageError::Timeout("connection pool acquire timed out".to_string())
            }
            sqlx::Error::PoolClosed => {
                StorageError::Connection("connection pool is closed".to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) if CONNECTION_SQLSTATES.contains(&code.as_ref()) => {
                    StorageError::Connection(db_err.to_string())
                }
                _ => StorageError::QueryFailed(db_err.to_string()),
            },
            other => StorageError::QueryFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StorageError::NotFound("requests".to_string()).to_string(),
            "metric not found: requests"
        );
        assert_eq!(
            StorageError::InvalidName.to_string(),
            "metric name must not be empty"
        );
        assert!(
            StorageError::KindMismatch("temp".to_string())
                .to_string()
                .contains("different kind")
        );
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err: StorageError = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(err.source().is_some());
    }
}
