//! Generic typed operations over any [`Executor`](crate::executor::Executor).
//!
//! Call sites supply SQL text, positional arguments and a target type; these functions handle
//! execution, scanning and error wrapping.
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use typed_dao::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Like {
//!     id: i64,
//!     user_id: i64,
//!     partner_id: i64,
//! }
//! impl_row!(Like { id, user_id, partner_id });
//!
//! # async fn demo(db: &SqliteDatabase) -> Result<(), DaoError> {
//! let ctx = QueryContext::background();
//! let id = create(db, &ctx, "INSERT INTO likes (user_id, partner_id) VALUES (?, ?)", &[
//!     RowValues::Int(1),
//!     RowValues::Int(2),
//! ])
//! .await?;
//! let like: Like = get_row(db, &ctx, "SELECT id, user_id, partner_id FROM likes WHERE id = ?", &[
//!     RowValues::Int(id),
//! ])
//! .await?;
//!
//! let mut likes = find_rows::<Like>(db, &ctx, "SELECT id, user_id, partner_id FROM likes", &[]);
//! while let Some(like) = likes.next().await {
//!     let like = like?;
//!     println!("{like:?}");
//! }
//! # Ok(()) }
//! ```

mod args;
mod exec;
mod single;
mod stream;

pub use args::in_args;
pub use exec::{create, execute};
pub use single::{get_column, get_row};
pub use stream::{RowStream, find_columns, find_rows};
