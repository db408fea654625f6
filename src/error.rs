use sqlx_sqlite_job_pool::Error as PoolError;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the SQLite driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from the worker pool, including engine errors carried across
   /// the worker boundary.
   #[error(transparent)]
   Pool(#[from] PoolError),

   /// Driver name not recognized at construction time.
   #[error("unknown driver: {0}")]
   UnknownDriver(String),

   /// Application-defined failure, typically raised inside a transaction
   /// callback to trigger a rollback.
   #[error("{0}")]
   Other(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   /// Engine errors use the `SQLITE_<code>` convention.
   pub fn error_code(&self) -> String {
      match self {
         Error::Pool(err) => match err {
            PoolError::Sqlite(sql_err) => sql_err.code.clone(),
            PoolError::InvalidQuery(_) => "INVALID_QUERY".to_string(),
            PoolError::InvalidConfig(_) => "INVALID_CONFIG".to_string(),
            PoolError::Connect(_) => "CONNECT_ERROR".to_string(),
            PoolError::Closed => "POOL_CLOSED".to_string(),
            PoolError::QueueFull(_) => "QUEUE_FULL".to_string(),
            PoolError::ShuttingDown => "POOL_SHUTTING_DOWN".to_string(),
            PoolError::WorkerBusy => "WORKER_BUSY".to_string(),
            PoolError::WorkerCrashed => "WORKER_CRASHED".to_string(),
            PoolError::UnexpectedReply => "UNEXPECTED_REPLY".to_string(),
         },
         Error::UnknownDriver(_) => "UNKNOWN_DRIVER".to_string(),
         Error::Other(_) => "ERROR".to_string(),
      }
   }
}
