//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types, functions and macros so call sites
//! can start with a single `use typed_dao::prelude::*;`.

pub use crate::context::QueryContext;
pub use crate::dao::{
    RowStream, create, execute, find_columns, find_rows, get_column, get_row, in_args,
};
pub use crate::error::{DaoError, DbError, ScanError};
pub use crate::executor::{ExecOutcome, Executor, RowCursor};
pub use crate::typed::{Column, FromValue, Row, ScanTarget, ToValue};
pub use crate::types::RowValues;
pub use crate::{column_newtype, impl_row};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDatabase, SqliteOptions, SqliteOptionsBuilder};
