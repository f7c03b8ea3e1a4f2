use rusqlite::types::Value;

use crate::error::DbError;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns [`DbError`] if the column cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, DbError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Step `rows` once and copy the row out as owned values.
///
/// # Errors
/// Returns [`DbError`] if stepping the statement or reading a column fails.
pub(crate) fn next_values(
    rows: &mut rusqlite::Rows<'_>,
    column_count: usize,
) -> Result<Option<Vec<RowValues>>, DbError> {
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut values = Vec::with_capacity(column_count);
    for idx in 0..column_count {
        values.push(sqlite_extract_value_sync(row, idx)?);
    }
    Ok(Some(values))
}
