//! # async-sqlite-pool
//!
//! An asynchronous SQLite driver backed by a worker pool. SQLite itself is
//! a synchronous, file-backed engine; this crate adds the concurrency
//! layer: queries are dispatched as jobs to a bounded set of workers, each
//! exclusively owning one connection, so async callers never block on disk
//! I/O or on SQLite's locks.
//!
//! ## Highlights
//!
//! - **Composed queries**: [`compose`] interleaves SQL fragments with `?`
//!   placeholders and carries values out-of-band — value content never
//!   reaches the SQL text
//! - **Pinned transactions**: [`Database::transaction`] leases one worker
//!   for the transaction's whole duration, so multi-statement transactions
//!   are safe at any pool size
//! - **Contention handling**: transactions open with `BEGIN IMMEDIATE` and
//!   `database is locked` failures are retried with exponential backoff
//!   instead of surfacing to callers
//! - **Graceful shutdown**: [`Database::close`] lets running queries finish;
//!   queries still waiting in the queue are dropped — that is the contract
//!
//! ## Usage
//!
//! ```no_run
//! use async_sqlite_pool::{Database, Value, compose};
//!
//! #[tokio::main]
//! async fn main() -> async_sqlite_pool::Result<()> {
//!     let db = Database::open_path("app.db").await?;
//!
//!     db.execute_batch(
//!         "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
//!     )
//!     .await?;
//!
//!     db.execute(compose(
//!         &["INSERT INTO users (name) VALUES (", ")"],
//!         vec![Value::from("alice")],
//!     )?)
//!     .await?;
//!
//!     let row = db.transaction(|tx| async move {
//!         tx.execute(compose(
//!             &["INSERT INTO users (name) VALUES (", ")"],
//!             vec![Value::from("bob")],
//!         )?)
//!         .await?;
//!         tx.fetch_optional(compose(
//!             &["SELECT * FROM users WHERE name = ", ""],
//!             vec![Value::from("bob")],
//!         )?)
//!         .await
//!     })
//!     .await?;
//!     assert!(row.is_some());
//!
//!     db.close().await?;
//!     Ok(())
//! }
//! ```

mod database;
mod error;
mod json;
mod options;
mod transaction;

pub use database::Database;
pub use error::{Error, Result};
pub use json::{json_to_value, row_to_json, value_to_json};
pub use options::{DatabaseOptions, Driver};
pub use transaction::Transaction;

// Re-export the pool vocabulary used throughout the public API
pub use sqlx_sqlite_job_pool::{
   Error as PoolError, PoolConfig, RetryPolicy, Row, SqlError, Statement, Value, WriteResult,
   compose,
};
