use std::future::Future;
use std::time::Duration;

use bb8::{ErrorSink, ManageConnection};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{trace, warn};

use crate::error::DbError;

use super::connection::SqliteDatabase;

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
    /// Switch the database to WAL journaling on connect.
    pub wal: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            db_path: ":memory:".into(),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            wal: true,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            ..Self::default()
        }
    }

    /// Read options from `DATABASE_PATH`, `DATABASE_POOL_SIZE`, `DATABASE_BUSY_TIMEOUT_MS` and
    /// `DATABASE_WAL`. Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns [`DbError::ConfigError`] if `DATABASE_PATH` is missing or a numeric/boolean
    /// variable does not parse.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse options from a JSON document; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns [`DbError::ConfigError`] if the document is not valid.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        serde_json::from_str(json)
            .map_err(|e| DbError::ConfigError(format!("invalid SQLite options: {e}")))
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("DATABASE_PATH")
            .ok_or_else(|| DbError::ConfigError("DATABASE_PATH is not set".into()))?;
        let mut opts = Self::new(db_path);
        if let Some(raw) = lookup("DATABASE_POOL_SIZE") {
            opts.pool_size = parse_var("DATABASE_POOL_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("DATABASE_BUSY_TIMEOUT_MS") {
            opts.busy_timeout_ms = parse_var("DATABASE_BUSY_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("DATABASE_WAL") {
            opts.wal = parse_var("DATABASE_WAL", &raw)?;
        }
        Ok(opts)
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, DbError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| DbError::ConfigError(format!("{key}={raw:?}: {e}")))
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build the pooled database handle.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if pool creation or the initial smoke test fails.
    pub async fn build(self) -> Result<SqliteDatabase, DbError> {
        SqliteDatabase::connect(self.finish()).await
    }
}

/// bb8 manager for rusqlite connections.
///
/// Opening a connection can wait on the busy timeout, so it runs on a blocking thread.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
    wal: bool,
}

impl SqliteManager {
    #[must_use]
    pub fn new(opts: &SqliteOptions) -> Self {
        Self {
            db_path: opts.db_path.clone(),
            busy_timeout: opts.busy_timeout(),
            wal: opts.wal,
        }
    }

    /// Open a connection and check it answers, surfacing the driver error as is.
    ///
    /// # Errors
    /// Returns [`DbError::SqliteError`] if the file cannot be opened, the pragmas fail (for
    /// example `database is locked` once the busy timeout runs out) or the check query fails.
    pub async fn open_checked(&self) -> Result<(), DbError> {
        let manager = self.clone();
        spawn_open(move || {
            let conn = manager.open()?;
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    fn open(&self) -> Result<rusqlite::Connection, DbError> {
        let conn = rusqlite::Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        if self.wal {
            apply_wal_pragmas(&conn)?;
        }
        Ok(conn)
    }
}

async fn spawn_open<F, R>(func: F) -> Result<R, DbError>
where
    F: FnOnce() -> Result<R, DbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(func)
        .await
        .map_err(|e| DbError::ConnectionError(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Run a short driver call without stalling other tasks on a multi-threaded runtime.
///
/// `block_in_place` is unavailable on a current-thread runtime; there the call runs inline.
fn run_in_place<R>(func: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(func),
        _ => func(),
    }
}

impl ManageConnection for SqliteManager {
    type Connection = rusqlite::Connection;
    type Error = DbError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let manager = self.clone();
        async move { spawn_open(move || manager.open()).await }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        // `SELECT 1` reads no pages, so it never waits on another connection's lock.
        let outcome = run_in_place(|| conn.query_row("SELECT 1", [], |_| Ok(())))
            .map_err(DbError::from);
        async move { outcome }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Forwards connection errors bb8 hits in the background to `tracing`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogErrorSink;

impl ErrorSink<DbError> for LogErrorSink {
    fn sink(&self, error: DbError) {
        warn!(%error, "sqlite pool failed to open a connection");
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<DbError>> {
        Box::new(*self)
    }
}

/// Switch a connection to WAL journaling.
///
/// `PRAGMA journal_mode` answers with a row, so it is read with `query_row` rather than run as
/// a plain statement. In-memory databases report `memory` and stay as they are.
///
/// # Errors
/// Returns the driver error if the pragma cannot be executed.
pub fn apply_wal_pragmas(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    trace!(%mode, "journal mode applied");
    Ok(())
}
