//! Database façade over the worker pool

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx_sqlite_job_pool::{
   Dispatcher, Error as PoolError, Outcome, Request, Row, Statement, WriteResult,
};

use crate::error::Result;
use crate::options::DatabaseOptions;

/// Asynchronous SQLite database backed by a worker pool.
///
/// Every query is dispatched as a job to a bounded set of workers, each
/// owning one SQLite connection, so callers never block on disk I/O or on
/// SQLite's locks. The wrapper is cheap to clone; clones share the same
/// pool.
///
/// # Example
///
/// ```no_run
/// use async_sqlite_pool::{Database, Value, compose};
///
/// # async fn example() -> async_sqlite_pool::Result<()> {
/// let db = Database::open_path("app.db").await?;
///
/// db.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").await?;
///
/// let insert = compose(
///     &["INSERT INTO users (name) VALUES (", ")"],
///     vec![Value::from("alice")],
/// )?;
/// let result = db.execute(insert).await?;
/// println!("inserted row {}", result.last_insert_rowid);
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
   pub(crate) pool: Arc<Dispatcher>,
   pub(crate) active_transactions: Arc<AtomicUsize>,
}

impl Database {
   /// Open a database with explicit options.
   ///
   /// All workers are started eagerly; a connection that cannot be opened
   /// fails here rather than on the first query.
   pub async fn open(options: DatabaseOptions) -> Result<Self> {
      let pool = Dispatcher::new(options.worker_init(), options.pool_config()).await?;
      Ok(Self {
         pool: Arc::new(pool),
         active_transactions: Arc::new(AtomicUsize::new(0)),
      })
   }

   /// Open a file database with default options.
   pub async fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
      Self::open(DatabaseOptions::new(path)).await
   }

   /// Open an in-memory database with default options.
   ///
   /// Note that with more than one worker each worker owns an independent
   /// in-memory database; use `workers: Some(1)` in
   /// [`DatabaseOptions`] when a single shared scratch database is wanted.
   pub async fn open_in_memory() -> Result<Self> {
      Self::open(DatabaseOptions::default()).await
   }

   /// Run a script of one or more `;`-separated statements.
   ///
   /// Scripts cannot carry bound values; passing a statement with values
   /// fails with an invalid-query error.
   pub async fn execute_batch(&self, script: impl Into<Statement>) -> Result<()> {
      let script = script.into();
      if !script.values.is_empty() {
         return Err(
            PoolError::InvalidQuery("a script cannot carry bound values".to_string()).into(),
         );
      }

      match self.pool.submit(Request::Exec { sql: script.sql }).await? {
         Outcome::Done => Ok(()),
         _ => Err(PoolError::UnexpectedReply.into()),
      }
   }

   /// Run one statement for its side effects (INSERT/UPDATE/DELETE/DDL).
   pub async fn execute(&self, statement: impl Into<Statement>) -> Result<WriteResult> {
      let statement = statement.into();
      match self
         .pool
         .submit(Request::Run {
            sql: statement.sql,
            values: statement.values,
         })
         .await?
      {
         Outcome::Write(result) => Ok(result),
         _ => Err(PoolError::UnexpectedReply.into()),
      }
   }

   /// Run one SELECT and return its first row, or `None` when the result is
   /// empty.
   pub async fn fetch_optional(&self, statement: impl Into<Statement>) -> Result<Option<Row>> {
      let statement = statement.into();
      match self
         .pool
         .submit(Request::Get {
            sql: statement.sql,
            values: statement.values,
         })
         .await?
      {
         Outcome::Row(row) => Ok(row),
         _ => Err(PoolError::UnexpectedReply.into()),
      }
   }

   /// Run one SELECT and return every row, in result order.
   pub async fn fetch_all(&self, statement: impl Into<Statement>) -> Result<Vec<Row>> {
      let statement = statement.into();
      match self
         .pool
         .submit(Request::All {
            sql: statement.sql,
            values: statement.values,
         })
         .await?
      {
         Outcome::Rows(rows) => Ok(rows),
         _ => Err(PoolError::UnexpectedReply.into()),
      }
   }

   /// Execute multiple statements atomically on one worker.
   ///
   /// All statements either succeed together or fail together. Use this for
   /// a fixed batch of writes; for transactions that interleave reads and
   /// application logic, use [`transaction`](Self::transaction).
   ///
   /// # Examples
   ///
   /// ```no_run
   /// # async fn example(db: &async_sqlite_pool::Database) -> async_sqlite_pool::Result<()> {
   /// use async_sqlite_pool::{Statement, Value};
   ///
   /// let results = db.execute_transaction(vec![
   ///     Statement::from(("INSERT INTO users (name) VALUES (?)", vec![Value::from("bob")])),
   ///     Statement::from(("INSERT INTO users (name) VALUES (?)", vec![Value::from("carol")])),
   /// ]).await?;
   ///
   /// assert_eq!(results.len(), 2);
   /// # Ok(())
   /// # }
   /// ```
   pub async fn execute_transaction(
      &self,
      statements: Vec<Statement>,
   ) -> Result<Vec<WriteResult>> {
      match self
         .pool
         .submit(Request::Batch { steps: statements })
         .await?
      {
         Outcome::Batch(results) => Ok(results),
         _ => Err(PoolError::UnexpectedReply.into()),
      }
   }

   /// Whether a [`transaction`](Self::transaction) call on this database is
   /// currently active.
   pub fn in_transaction(&self) -> bool {
      self.active_transactions.load(Ordering::SeqCst) > 0
   }

   /// Gracefully shut the pool down.
   ///
   /// Queries already running on a worker finish and resolve their callers;
   /// **queries still waiting in the queue are dropped** and fail with a
   /// shutting-down error. Further calls fail immediately.
   pub async fn close(&self) -> Result<()> {
      self.pool.shutdown().await?;
      Ok(())
   }
}
