//! The execution substrate the generic fetchers are written against.
//!
//! A backend implements [`Executor`] (statement execution and cursor opening) and hands out
//! [`RowCursor`]s. The fetchers in [`dao`](crate::dao) only ever call these methods, so any
//! driver that can produce raw [`RowValues`] rows can sit underneath them.

use async_trait::async_trait;

use crate::context::QueryContext;
use crate::error::DbError;
use crate::types::RowValues;

/// Result of a mutating statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: usize,
    /// Driver-assigned id of the most recent insert on the connection that ran the statement.
    pub last_insert_id: i64,
}

/// Live handle to an in-progress multi-row result.
///
/// A cursor exclusively owns the connection it was opened on until it is exhausted, fails,
/// is closed, or is dropped; implementations must release it on every one of those paths.
#[async_trait]
pub trait RowCursor: Send {
    /// Fetch the next raw row.
    ///
    /// Returns `Ok(None)` once the result is exhausted. An `Err` is a fault raised by the
    /// substrate while stepping the result (after zero or more rows were delivered); the cursor
    /// is closed afterwards.
    ///
    /// # Errors
    /// Returns [`DbError`] when stepping the result fails or the context fires.
    async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DbError>;

    /// Release the underlying resources. Further calls to [`next_row`](Self::next_row) return
    /// `Ok(None)`.
    fn close(&mut self);
}

/// Statement execution and query substrate.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run an INSERT/UPDATE/DELETE.
    ///
    /// # Errors
    /// Returns [`DbError`] on connectivity, constraint or syntax failures.
    async fn execute(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, DbError>;

    /// Open a cursor over a query's result.
    ///
    /// # Errors
    /// Returns [`DbError`] if the query cannot be started.
    async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor>, DbError>;

    /// Fetch only the first row of a query, ignoring any further rows.
    ///
    /// # Errors
    /// Returns [`DbError`] if the query cannot be started or stepped.
    async fn query_first(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[RowValues],
    ) -> Result<Option<Vec<RowValues>>, DbError> {
        let mut cursor = self.query(ctx, query, params).await?;
        let first = cursor.next_row().await;
        cursor.close();
        first
    }
}
