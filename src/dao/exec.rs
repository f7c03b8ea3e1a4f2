use tracing::debug;

use crate::context::QueryContext;
use crate::error::DaoError;
use crate::executor::Executor;
use crate::types::RowValues;

/// Execute an INSERT and return the driver-assigned last-inserted id.
///
/// # Errors
/// Returns [`DaoError::Execution`] wrapping the statement text if execution fails.
pub async fn create(
    db: &dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
) -> Result<i64, DaoError> {
    debug!(query, args = args.len(), "dao::create");
    db.execute(ctx, query, args)
        .await
        .map(|outcome| outcome.last_insert_id)
        .map_err(|err| DaoError::execution("dao::create", query, err))
}

/// Execute an UPDATE/DELETE (or any statement without a result) and return rows affected.
///
/// # Errors
/// Returns [`DaoError::Execution`] wrapping the statement text if execution fails.
pub async fn execute(
    db: &dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
) -> Result<usize, DaoError> {
    debug!(query, args = args.len(), "dao::execute");
    db.execute(ctx, query, args)
        .await
        .map(|outcome| outcome.rows_affected)
        .map_err(|err| DaoError::execution("dao::execute", query, err))
}
