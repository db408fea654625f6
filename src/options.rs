//! Database construction options and driver selection

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx_sqlite_job_pool::{PoolConfig, RetryPolicy, WorkerInit};

use crate::error::{Error, Result};

/// SQLite engine backing a [`Database`](crate::Database).
///
/// There is exactly one engine today (the bundled SQLite that ships with
/// sqlx), but driver names are still validated at construction so that a
/// misconfigured name fails loudly instead of silently selecting a default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Driver {
   #[default]
   Sqlite,
}

impl Driver {
   /// Parse a driver name.
   ///
   /// A trailing `sqlite3` is normalized to `sqlite`, so both `"sqlite"` and
   /// `"sqlite3"` select the bundled engine. Anything else fails with
   /// [`Error::UnknownDriver`].
   pub fn parse(name: &str) -> Result<Self> {
      match normalize_driver_name(name).as_str() {
         "sqlite" => Ok(Driver::Sqlite),
         _ => Err(Error::UnknownDriver(name.to_string())),
      }
   }

   /// Worker count used when [`DatabaseOptions::workers`] is not set.
   ///
   /// A `:memory:` database gets one worker per available CPU — each worker
   /// owns an independent in-memory database, so this only suits read-heavy
   /// or scratch workloads. File databases default to 2: SQLite serializes
   /// writers at the file level anyway, and transactions pin to one worker
   /// regardless of pool size.
   pub(crate) fn default_workers(self, filename: &Path) -> usize {
      if filename.as_os_str() == ":memory:" {
         std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(2)
      } else {
         2
      }
   }
}

fn normalize_driver_name(name: &str) -> String {
   match name.strip_suffix("sqlite3") {
      Some(prefix) => format!("{prefix}sqlite"),
      None => name.to_string(),
   }
}

/// Options for opening a [`Database`](crate::Database).
///
/// # Examples
///
/// ```
/// use async_sqlite_pool::DatabaseOptions;
///
/// // In-memory database with defaults
/// let options = DatabaseOptions::default();
///
/// // File database with a custom pool size
/// let options = DatabaseOptions {
///     workers: Some(4),
///     ..DatabaseOptions::new("app.db")
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOptions {
   /// Database file path, or `:memory:` (the default).
   pub filename: PathBuf,

   /// Engine selection; see [`Driver::parse`] for name handling.
   pub driver: Driver,

   /// Worker count. `None` picks a default from the driver and filename.
   pub workers: Option<usize>,

   /// Bound on jobs waiting for an idle worker; `None` is unbounded.
   pub max_queue: Option<usize>,

   /// Retry policy for `database is locked` failures.
   pub retry: RetryPolicy,

   /// Per-worker prepared-statement cache capacity.
   pub statement_cache_capacity: usize,

   /// How long a worker lets SQLite wait on a lock before the retry policy
   /// takes over.
   pub busy_timeout: Duration,

   /// Extra pragmas forwarded verbatim to every worker connection.
   pub pragmas: Vec<(String, String)>,
}

impl Default for DatabaseOptions {
   fn default() -> Self {
      Self::new(":memory:")
   }
}

impl DatabaseOptions {
   pub fn new(filename: impl Into<PathBuf>) -> Self {
      let pool = PoolConfig::default();
      Self {
         filename: filename.into(),
         driver: Driver::default(),
         workers: None,
         max_queue: None,
         retry: pool.retry,
         statement_cache_capacity: pool.statement_cache_capacity,
         busy_timeout: pool.busy_timeout,
         pragmas: Vec::new(),
      }
   }

   /// Select the engine by name, typically from configuration.
   ///
   /// Routes through [`Driver::parse`], so `"sqlite"` and `"sqlite3"` both
   /// work and anything else fails with
   /// [`Error::UnknownDriver`](crate::Error::UnknownDriver) before any
   /// worker is started.
   ///
   /// # Examples
   ///
   /// ```
   /// use async_sqlite_pool::DatabaseOptions;
   ///
   /// let options = DatabaseOptions::new("app.db").with_driver("sqlite3").unwrap();
   ///
   /// assert!(DatabaseOptions::new("app.db").with_driver("postgres").is_err());
   /// ```
   pub fn with_driver(mut self, name: &str) -> Result<Self> {
      self.driver = Driver::parse(name)?;
      Ok(self)
   }

   pub(crate) fn pool_config(&self) -> PoolConfig {
      PoolConfig {
         workers: self
            .workers
            .unwrap_or_else(|| self.driver.default_workers(&self.filename)),
         max_queue: self.max_queue,
         retry: self.retry.clone(),
         statement_cache_capacity: self.statement_cache_capacity,
         busy_timeout: self.busy_timeout,
      }
   }

   pub(crate) fn worker_init(&self) -> WorkerInit {
      WorkerInit {
         filename: self.filename.clone(),
         pragmas: self.pragmas.clone(),
      }
   }
}
