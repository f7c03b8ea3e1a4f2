//! Row and column contracts used by the generic fetchers.
//!
//! A record type implements [`Row`] (usually through [`impl_row!`](crate::impl_row)); a scalar
//! implements [`Column`]. The fetchers in [`dao`](crate::dao) are bounded by these traits, so
//! single-column calls cannot target aggregates and row calls cannot target bare scalars.

mod macros;
mod traits;

pub(crate) use traits::{scan_column, scan_row};
pub use traits::{Column, FromValue, Row, ScanTarget, ToValue};
