//! Error types for sqlx-sqlite-job-pool

use serde::{Deserialize, Serialize};

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SQLite error message emitted when a lock cannot be acquired.
///
/// Jobs failing with exactly this message are retried by the dispatcher
/// instead of being surfaced to the caller.
pub const CONTENTION_MESSAGE: &str = "database is locked";

/// An engine error carried by value from a worker back to the submitter.
///
/// Workers never hand out references into their own state, so failures are
/// flattened into this owned payload before crossing the channel: a
/// machine-readable `code`, the engine's message verbatim, and the chain of
/// underlying error sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SqlError {
   /// Machine-readable code: `SQLITE_<code>` for engine errors (e.g.
   /// `SQLITE_2067` for a unique-constraint violation), `SQLX_ERROR` for
   /// driver errors without an engine code, `UNSUPPORTED_DATATYPE` for
   /// column types that cannot be decoded.
   pub code: String,

   /// Error message, verbatim from the engine where available.
   pub message: String,

   /// Messages of the underlying error sources, outermost first.
   pub chain: Vec<String>,
}

impl SqlError {
   pub(crate) fn from_sqlx(err: &sqlx::Error) -> Self {
      let code = err
         .as_database_error()
         .and_then(|db_err| db_err.code())
         .map(|code| format!("SQLITE_{code}"))
         .unwrap_or_else(|| "SQLX_ERROR".to_string());

      let message = match err.as_database_error() {
         Some(db_err) => db_err.message().to_string(),
         None => err.to_string(),
      };

      let mut chain = Vec::new();
      let mut source = std::error::Error::source(err);
      while let Some(cause) = source {
         chain.push(cause.to_string());
         source = cause.source();
      }

      Self {
         code,
         message,
         chain,
      }
   }

   pub(crate) fn unsupported_datatype(type_name: &str) -> Self {
      Self {
         code: "UNSUPPORTED_DATATYPE".to_string(),
         message: format!("cannot decode SQLite type: {type_name}"),
         chain: Vec::new(),
      }
   }

   /// Whether this error is lock contention (`database is locked`).
   pub fn is_contention(&self) -> bool {
      self.message == CONTENTION_MESSAGE
   }
}

/// Errors that may occur when working with sqlx-sqlite-job-pool
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error reported by the SQLite engine while a worker ran a job.
   /// Carried by value across the worker boundary.
   #[error(transparent)]
   Sqlite(#[from] SqlError),

   /// Malformed query input: fragment/value arity mismatch, or a
   /// multi-statement script carrying bound values.
   #[error("invalid query: {0}")]
   InvalidQuery(String),

   /// Rejected pool configuration (e.g. a zero worker count).
   #[error("invalid configuration: {0}")]
   InvalidConfig(String),

   /// A worker connection could not be opened at pool startup.
   #[error("failed to open worker connection: {0}")]
   Connect(#[from] sqlx::Error),

   /// Job submitted after the pool was closed.
   #[error("pool has been closed")]
   Closed,

   /// Job submitted while the waiting queue was at its configured bound.
   #[error("job queue is full ({0} entries)")]
   QueueFull(usize),

   /// Job was still queued when shutdown started. Queued jobs are dropped;
   /// only the jobs already running are allowed to finish.
   #[error("pool is shutting down; queued job was dropped")]
   ShuttingDown,

   /// A job was handed to a worker that already had one in flight.
   #[error("worker already has a job in flight")]
   WorkerBusy,

   /// The worker task exited without replying.
   #[error("worker exited unexpectedly")]
   WorkerCrashed,

   /// A worker reply did not have the result shape its request calls for.
   #[error("worker replied with an unexpected result shape")]
   UnexpectedReply,
}

impl Error {
   /// Whether this error is lock contention (`database is locked`).
   ///
   /// The dispatcher consumes contention errors internally via its retry
   /// policy; callers only see one when retries are exhausted.
   pub fn is_contention(&self) -> bool {
      matches!(self, Error::Sqlite(err) if err.is_contention())
   }
}
