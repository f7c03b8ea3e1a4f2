use tracing::debug;

use crate::context::QueryContext;
use crate::error::DaoError;
use crate::executor::Executor;
use crate::typed::{Column, Row, scan_column, scan_row};
use crate::types::RowValues;

/// Fetch one row as `T`.
///
/// Only the first row of the result is consumed; extra rows are not an error.
///
/// # Errors
/// - [`DaoError::NotFound`] if the query matched no rows.
/// - [`DaoError::Execution`] if the query could not run.
/// - [`DaoError::Scan`] if the row could not be decoded into `T`.
pub async fn get_row<T: Row>(
    db: &dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
) -> Result<T, DaoError> {
    const OP: &str = "dao::get_row";
    debug!(query, args = args.len(), "dao::get_row");
    let values = db
        .query_first(ctx, query, args)
        .await
        .map_err(|err| DaoError::execution(OP, query, err))?
        .ok_or(DaoError::NotFound)?;
    scan_row::<T>(values).map_err(|err| DaoError::scan(OP, query, err))
}

/// Fetch a single scalar, e.g. `SELECT COUNT(*) ...`.
///
/// # Errors
/// Same trichotomy as [`get_row`]: [`DaoError::NotFound`], [`DaoError::Execution`] or
/// [`DaoError::Scan`].
pub async fn get_column<S: Column>(
    db: &dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
) -> Result<S, DaoError> {
    const OP: &str = "dao::get_column";
    debug!(query, args = args.len(), "dao::get_column");
    let values = db
        .query_first(ctx, query, args)
        .await
        .map_err(|err| DaoError::execution(OP, query, err))?
        .ok_or(DaoError::NotFound)?;
    scan_column::<S>(values).map_err(|err| DaoError::scan(OP, query, err))
}
