//! Pool and worker configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for a worker pool.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_job_pool::PoolConfig;
///
/// // Use defaults
/// let config = PoolConfig::default();
///
/// // Override just one field
/// let config = PoolConfig {
///     workers: 4,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
   /// Number of workers, each owning one SQLite connection.
   ///
   /// Must be at least 1. For `:memory:` filenames every worker gets its own
   /// independent in-memory database.
   ///
   /// Default: 2
   pub workers: usize,

   /// Upper bound on jobs waiting for an idle worker.
   ///
   /// Submitting past the bound fails immediately instead of queueing.
   /// `None` leaves the queue unbounded.
   ///
   /// Default: None
   pub max_queue: Option<usize>,

   /// Retry policy applied when a job fails with `database is locked`.
   pub retry: RetryPolicy,

   /// Capacity of each worker's prepared-statement cache.
   ///
   /// Statements run through `Run`/`Get`/`All` are prepared once per worker
   /// and reused by exact SQL text; the cache evicts least-recently-used
   /// entries past this bound. `Exec` scripts bypass the cache.
   ///
   /// Default: 100
   pub statement_cache_capacity: usize,

   /// How long a worker lets SQLite itself wait on a lock before the failure
   /// surfaces as contention and the retry policy takes over.
   ///
   /// Default: 100ms
   pub busy_timeout: Duration,
}

impl Default for PoolConfig {
   fn default() -> Self {
      Self {
         workers: 2,
         max_queue: None,
         retry: RetryPolicy::default(),
         statement_cache_capacity: 100,
         busy_timeout: Duration::from_millis(100),
      }
   }
}

/// Exponential-backoff retry for lock contention.
///
/// A job that fails with `database is locked` is retried on the same worker
/// after `first_delay`, doubling up to `max_delay`, until it succeeds, fails
/// differently, or `max_attempts` total attempts are spent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
   /// Total attempts per job, including the first. `0` retries forever.
   ///
   /// Default: 16
   pub max_attempts: u32,

   /// Delay before the first retry.
   ///
   /// Default: 1ms
   pub first_delay: Duration,

   /// Ceiling for the doubled delays.
   ///
   /// Default: 250ms
   pub max_delay: Duration,
}

impl Default for RetryPolicy {
   fn default() -> Self {
      Self {
         max_attempts: 16,
         first_delay: Duration::from_millis(1),
         max_delay: Duration::from_millis(250),
      }
   }
}

impl RetryPolicy {
   /// Backoff before retry number `retry` (zero-based).
   pub(crate) fn delay_for(&self, retry: u32) -> Duration {
      let factor = 1u32 << retry.min(16);
      self.first_delay.saturating_mul(factor).min(self.max_delay)
   }

   /// Whether another attempt is allowed after `attempts` spent ones.
   pub(crate) fn allows_retry(&self, attempts: u32) -> bool {
      self.max_attempts == 0 || attempts < self.max_attempts
   }
}

/// Connection parameters handed to every worker at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInit {
   /// Database file path, or `:memory:` for a per-worker in-memory database.
   ///
   /// The file is created if it does not exist.
   pub filename: PathBuf,

   /// Extra pragmas applied verbatim after the built-in connection setup
   /// (foreign keys, journal mode). Forwarded opaquely to SQLite.
   pub pragmas: Vec<(String, String)>,
}

impl WorkerInit {
   pub fn new(filename: impl Into<PathBuf>) -> Self {
      Self {
         filename: filename.into(),
         pragmas: Vec::new(),
      }
   }

   pub(crate) fn is_memory(&self) -> bool {
      self.filename.as_os_str() == ":memory:"
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_backoff_doubles_up_to_ceiling() {
      let policy = RetryPolicy {
         max_attempts: 8,
         first_delay: Duration::from_millis(10),
         max_delay: Duration::from_millis(50),
      };

      assert_eq!(policy.delay_for(0), Duration::from_millis(10));
      assert_eq!(policy.delay_for(1), Duration::from_millis(20));
      assert_eq!(policy.delay_for(2), Duration::from_millis(40));
      assert_eq!(policy.delay_for(3), Duration::from_millis(50));
      assert_eq!(policy.delay_for(30), Duration::from_millis(50));
   }

   #[test]
   fn test_retry_attempt_limit() {
      let policy = RetryPolicy {
         max_attempts: 3,
         ..Default::default()
      };
      assert!(policy.allows_retry(1));
      assert!(policy.allows_retry(2));
      assert!(!policy.allows_retry(3));

      let unbounded = RetryPolicy {
         max_attempts: 0,
         ..Default::default()
      };
      assert!(unbounded.allows_retry(1_000_000));
   }

   #[test]
   fn test_memory_filename_detection() {
      assert!(WorkerInit::new(":memory:").is_memory());
      assert!(!WorkerInit::new("test.db").is_memory());
   }
}
