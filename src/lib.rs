//! Typed data-access helpers over pooled SQL connections.
//!
//! Write the SQL yourself; let the crate run it, scan the result into your types and wrap
//! failures with the query that caused them. See [`dao`] for the operations and [`prelude`]
//! for the usual imports.

pub mod context;
pub mod dao;
pub mod error;
pub mod executor;
pub mod prelude;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod typed;
pub mod types;

pub use context::QueryContext;
pub use dao::{
    RowStream, create, execute, find_columns, find_rows, get_column, get_row, in_args,
};
pub use error::{DaoError, DbError, ScanError};
pub use executor::{ExecOutcome, Executor, RowCursor};
pub use typed::{Column, FromValue, Row, ScanTarget, ToValue};
pub use types::RowValues;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteOptions, SqliteOptionsBuilder};
