//! `SQLite` backend: bb8-pooled rusqlite connections behind the [`Executor`](crate::Executor)
//! trait.
//!
//! - config: options, env/JSON loading and the bb8 connection manager
//! - connection: the pooled database handle and blocking execution
//! - cursor: worker-driven cursors for streaming results
//! - params: conversion from [`RowValues`](crate::RowValues) to driver values
//! - query: row extraction

pub mod config;
pub mod connection;
mod cursor;
pub mod params;
pub mod query;

pub use config::{SqliteManager, SqliteOptions, SqliteOptionsBuilder, apply_wal_pragmas};
pub use connection::SqliteDatabase;
pub use cursor::SqliteCursor;
pub use params::Params;
