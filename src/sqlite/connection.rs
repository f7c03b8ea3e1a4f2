use std::fmt;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tracing::{debug, info};

use crate::context::QueryContext;
use crate::error::DbError;
use crate::executor::{ExecOutcome, Executor, RowCursor};
use crate::types::RowValues;

use super::config::{LogErrorSink, SqliteManager, SqliteOptions, SqliteOptionsBuilder};
use super::cursor::SqliteCursor;
use super::params::Params;
use super::query::next_values;

pub(crate) type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// Pooled `SQLite` database implementing [`Executor`].
///
/// Every operation checks a connection out of the bb8 pool and runs the driver call on a
/// blocking thread; cursors keep their connection until they are exhausted or dropped.
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: Pool<SqliteManager>,
    options: SqliteOptions,
}

impl SqliteDatabase {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Open and check one connection, then create the pool.
    ///
    /// The up-front open reports driver failures (a locked or unreadable file) directly
    /// instead of as a checkout timeout.
    ///
    /// # Errors
    /// Returns [`DbError::ConfigError`] for a zero pool size, or the driver error from opening
    /// the first connection.
    pub async fn connect(options: SqliteOptions) -> Result<Self, DbError> {
        if options.pool_size == 0 {
            return Err(DbError::ConfigError("pool_size must be at least 1".into()));
        }
        let manager = SqliteManager::new(&options);
        manager.open_checked().await?;
        let pool = Pool::builder()
            .max_size(options.pool_size)
            .error_sink(Box::new(LogErrorSink))
            .build(manager)
            .await?;

        info!(
            options = %serde_json::to_string(&options).unwrap_or_default(),
            "sqlite pool ready"
        );
        Ok(Self { pool, options })
    }

    /// Build from `DATABASE_*` environment variables (see [`SqliteOptions::from_env`]).
    ///
    /// # Errors
    /// Returns [`DbError::ConfigError`] for bad variables, or any error from [`Self::connect`].
    pub async fn from_env() -> Result<Self, DbError> {
        Self::connect(SqliteOptions::from_env()?).await
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }

    /// Run a batch of statements (schema setup, fixtures) in one transaction.
    ///
    /// # Errors
    /// Returns [`DbError`] if checkout or any statement fails.
    pub async fn execute_batch(&self, ctx: &QueryContext, sql: &str) -> Result<(), DbError> {
        let sql_owned = sql.to_owned();
        self.with_connection(ctx, move |conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(&sql_owned)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Run synchronous `rusqlite` logic against a pooled connection on a blocking thread.
    ///
    /// # Errors
    /// Propagates errors from checkout, from `func`, or from the context firing.
    pub async fn with_connection<F, R>(&self, ctx: &QueryContext, func: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, DbError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.checkout(ctx).await?;
        run_blocking(ctx, conn, func).await
    }

    pub(crate) async fn checkout(
        &self,
        ctx: &QueryContext,
    ) -> Result<SqlitePooledConnection, DbError> {
        ctx.run(async {
            self.pool
                .get_owned()
                .await
                .map_err(DbError::from)
        })
        .await
    }
}

impl fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("options", &self.options)
            .field("state", &self.pool.state())
            .finish()
    }
}

#[async_trait]
impl Executor for SqliteDatabase {
    async fn execute(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, DbError> {
        let sql_owned = query.to_owned();
        let params = Params::convert(params);
        self.with_connection(ctx, move |conn| {
            let mut stmt = conn.prepare_cached(&sql_owned)?;
            let rows_affected = stmt.execute(&params.as_refs()[..])?;
            Ok(ExecOutcome {
                rows_affected,
                last_insert_id: conn.last_insert_rowid(),
            })
        })
        .await
    }

    async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, DbError> {
        let conn = self.checkout(ctx).await?;
        let cursor = SqliteCursor::open(ctx.clone(), conn, query.to_owned(), Params::convert(params))
            .await?;
        Ok(Box::new(cursor))
    }

    async fn query_first(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[RowValues],
    ) -> Result<Option<Vec<RowValues>>, DbError> {
        let sql_owned = query.to_owned();
        let params = Params::convert(params);
        self.with_connection(ctx, move |conn| {
            let mut stmt = conn.prepare_cached(&sql_owned)?;
            let column_count = stmt.column_count();
            let mut rows = stmt.query(&params.as_refs()[..])?;
            next_values(&mut rows, column_count)
        })
        .await
    }
}

/// Run `func` on a blocking thread with exclusive use of `conn`.
///
/// The blocking task hands the connection back with its result, so the connection stays out
/// of the pool until the race with the context is decided. If the context fires first the
/// connection is interrupted while still held, so the statement in flight fails fast and no
/// other borrower can be hit. Work that has already finished wins over a late deadline.
pub(crate) async fn run_blocking<F, R>(
    ctx: &QueryContext,
    mut conn: SqlitePooledConnection,
    func: F,
) -> Result<R, DbError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DbError> + Send + 'static,
    R: Send + 'static,
{
    ctx.check()?;
    let interrupt = conn.get_interrupt_handle();
    let mut task = tokio::task::spawn_blocking(move || {
        let outcome = func(&mut *conn);
        (conn, outcome)
    });
    tokio::select! {
        biased;
        joined = &mut task => {
            let (conn, outcome) = joined.map_err(|e| {
                DbError::ConnectionError(format!("sqlite spawn_blocking join error: {e}"))
            })?;
            drop(conn);
            outcome
        }
        err = ctx.done() => {
            debug!(error = %err, "interrupting sqlite connection");
            interrupt.interrupt();
            // Dropping the handle leaves the task to finish and return the connection itself.
            drop(task);
            Err(err)
        }
    }
}
