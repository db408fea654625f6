//! # sqlx-sqlite-job-pool
//!
//! A job-dispatching worker pool for SQLite built on SQLx: a bounded set of
//! workers, each exclusively owning one SQLite connection, served from a
//! FIFO queue so async callers never block on disk I/O or SQLite's locks.
//!
//! ## Core Types
//!
//! - **[`Dispatcher`]**: the pool — routes submitted jobs to idle workers
//! - **[`Request`]** / **[`Outcome`]**: the job vocabulary and result shapes
//! - **[`WorkerLease`]**: exclusive reservation of one worker (transaction pinning)
//! - **[`Statement`]** / **[`compose`]**: parameterized SQL with out-of-band values
//! - **[`PoolConfig`]** / **[`RetryPolicy`]** / **[`WorkerInit`]**: configuration
//! - **[`Error`]** / **[`SqlError`]**: error types
//!
//! ## Architecture
//!
//! - **One connection per worker**: a worker task owns its connection for
//!   its whole life; nothing else ever touches it
//! - **FIFO routing**: jobs are matched to idle workers in submission order,
//!   with at most one job in flight per worker
//! - **Contention retry**: `database is locked` failures are retried on the
//!   same worker with exponential backoff instead of surfacing to callers
//! - **Graceful shutdown**: running jobs finish and resolve their callers;
//!   queued but not-yet-started jobs are rejected
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_sqlite_job_pool::{Dispatcher, PoolConfig, Request, Value, WorkerInit};
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_job_pool::Result<()> {
//!     let pool = Dispatcher::new(WorkerInit::new("example.db"), PoolConfig::default()).await?;
//!
//!     pool.submit(Request::Exec {
//!         sql: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)".into(),
//!     })
//!     .await?;
//!
//!     pool.submit(Request::Run {
//!         sql: "INSERT INTO users (name) VALUES (?)".into(),
//!         values: vec![Value::from("alice")],
//!     })
//!     .await?;
//!
//!     pool.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Principles
//!
//! - Workers are spawned eagerly; connection failures surface at
//!   construction, not on the first job
//! - Errors cross the worker boundary by value ([`SqlError`]), never by
//!   reference
//! - Statement preparation is cached per worker by exact SQL text, bounded
//!   by [`PoolConfig::statement_cache_capacity`]
//! - Transactions pin to one worker via [`Dispatcher::lease`]; the pool
//!   never fans a transaction out across connections
//!
mod compose;
mod config;
mod dispatcher;
mod error;
mod handle;
mod job;
mod runtime;
mod value;

pub use compose::{Statement, compose};
pub use config::{PoolConfig, RetryPolicy, WorkerInit};
pub use dispatcher::{Dispatcher, WorkerLease};
pub use error::{CONTENTION_MESSAGE, Error, Result, SqlError};
pub use job::{Outcome, Request, WriteResult};
pub use value::{Row, Value};
