use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

/// Failures raised by the execution substrate (driver, pool, worker threads).
#[derive(Debug, Error)]
pub enum DbError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Worker closed: {0}")]
    WorkerClosed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A row was produced but a value could not be decoded into its target field.
#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    #[error("expected {expected} scan targets but the row has {found} columns")]
    ColumnCount { expected: usize, found: usize },

    #[error("column {index}: NULL scanned into non-nullable {target}")]
    UnexpectedNull { index: usize, target: &'static str },

    #[error("column {index}: cannot scan {found} into {target}")]
    TypeMismatch {
        index: usize,
        target: &'static str,
        found: &'static str,
    },

    #[error("column {index}: value {value} out of range for {target}")]
    OutOfRange {
        index: usize,
        target: &'static str,
        value: String,
    },

    #[error("column {index}: unparseable timestamp {value:?}")]
    InvalidTimestamp { index: usize, value: String },
}

/// Errors returned by the typed fetchers.
///
/// Everything except [`DaoError::NotFound`] and [`DaoError::InvalidArgument`] carries the
/// operation name and the query text so a log line is enough to find the failing call site.
#[derive(Debug, Error)]
pub enum DaoError {
    #[error("database record not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{op} failed\n{query}: {source}")]
    Execution {
        op: &'static str,
        query: String,
        #[source]
        source: DbError,
    },

    #[error("{op} scan error\n{query}: {source}")]
    Scan {
        op: &'static str,
        query: String,
        #[source]
        source: ScanError,
    },

    #[error("{op} cursor fault\n{query}: {source}")]
    CursorFault {
        op: &'static str,
        query: String,
        #[source]
        source: DbError,
    },
}

impl DaoError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DaoError::NotFound)
    }

    /// True when the substrate aborted because the caller's context was cancelled or expired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            DaoError::Execution {
                source: DbError::Cancelled | DbError::DeadlineExceeded,
                ..
            } | DaoError::CursorFault {
                source: DbError::Cancelled | DbError::DeadlineExceeded,
                ..
            }
        )
    }

    pub(crate) fn execution(op: &'static str, query: &str, source: DbError) -> Self {
        DaoError::Execution {
            op,
            query: query.to_owned(),
            source,
        }
    }

    pub(crate) fn scan(op: &'static str, query: &str, source: ScanError) -> Self {
        DaoError::Scan {
            op,
            query: query.to_owned(),
            source,
        }
    }

    pub(crate) fn cursor_fault(op: &'static str, query: &str, source: DbError) -> Self {
        DaoError::CursorFault {
            op,
            query: query.to_owned(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<bb8::RunError<DbError>> for DbError {
    fn from(err: bb8::RunError<DbError>) -> Self {
        match err {
            bb8::RunError::User(e) => e,
            bb8::RunError::TimedOut => DbError::ConnectionError(
                "sqlite checkout error: timed out waiting for a connection".into(),
            ),
        }
    }
}
