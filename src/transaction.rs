//! Closure-based transactions pinned to a single worker

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx_sqlite_job_pool::{
   Error as PoolError, Outcome, Request, Row, Statement, WorkerLease, WriteResult,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;

/// Handle to an open transaction, pinned to one pool worker.
///
/// Every statement issued through this handle runs on the worker the
/// transaction leased, in issue order — the transaction never straddles
/// connections. Clones share the same lease, so the handle can be moved
/// into sub-tasks of the callback if needed.
#[derive(Clone)]
pub struct Transaction {
   lease: Arc<WorkerLease>,
}

impl Transaction {
   /// Run one statement for its side effects inside the transaction.
   pub async fn execute(&self, statement: impl Into<Statement>) -> Result<WriteResult> {
      let statement = statement.into();
      match self
         .lease
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

   /// Run one SELECT inside the transaction and return its first row.
   ///
   /// Reads observe the transaction's own uncommitted writes.
   pub async fn fetch_optional(&self, statement: impl Into<Statement>) -> Result<Option<Row>> {
      let statement = statement.into();
      match self
         .lease
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

   /// Run one SELECT inside the transaction and return every row.
   pub async fn fetch_all(&self, statement: impl Into<Statement>) -> Result<Vec<Row>> {
      let statement = statement.into();
      match self
         .lease
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

   /// Run a script of `;`-separated statements inside the transaction.
   pub async fn execute_batch(&self, script: impl Into<Statement>) -> Result<()> {
      let script = script.into();
      if !script.values.is_empty() {
         return Err(
            PoolError::InvalidQuery("a script cannot carry bound values".to_string()).into(),
         );
      }
      match self.lease.submit(Request::Exec { sql: script.sql }).await? {
         Outcome::Done => Ok(()),
         _ => Err(PoolError::UnexpectedReply.into()),
      }
   }

   /// Nested transaction call.
   ///
   /// SQLite transactions do not nest, so the callback runs directly
   /// against the already-open transaction — no new `BEGIN`, and commit or
   /// rollback stays with the outermost call.
   pub async fn transaction<F, Fut, T>(&self, callback: F) -> Result<T>
   where
      F: FnOnce(Transaction) -> Fut,
      Fut: Future<Output = Result<T>>,
   {
      callback(self.clone()).await
   }
}

/// Decrements the active-transaction count when the transaction ends, on
/// every exit path.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
   fn enter(counter: &Arc<AtomicUsize>) -> Self {
      counter.fetch_add(1, Ordering::SeqCst);
      Self(Arc::clone(counter))
   }
}

impl Drop for ActiveGuard {
   fn drop(&mut self) {
      self.0.fetch_sub(1, Ordering::SeqCst);
   }
}

impl Database {
   /// Run `callback` inside a transaction pinned to one worker.
   ///
   /// A worker is leased for the transaction's whole duration, so every
   /// statement issued through the [`Transaction`] handle hits the same
   /// connection regardless of pool size. The transaction opens with
   /// `BEGIN IMMEDIATE`, paying any lock contention up front where retrying
   /// is safe.
   ///
   /// On success the transaction commits and the callback's value is
   /// returned. On error it rolls back — a rollback failure is logged and
   /// swallowed — and the callback's error is re-raised. A failed `BEGIN`
   /// or `COMMIT` propagates to the caller.
   ///
   /// # Examples
   ///
   /// ```no_run
   /// # async fn example(db: &async_sqlite_pool::Database) -> async_sqlite_pool::Result<()> {
   /// use async_sqlite_pool::{Value, compose};
   ///
   /// let row = db.transaction(|tx| async move {
   ///     tx.execute(compose(
   ///         &["INSERT INTO users (name) VALUES (", ")"],
   ///         vec![Value::from("bob")],
   ///     )?)
   ///     .await?;
   ///
   ///     tx.fetch_optional(compose(
   ///         &["SELECT * FROM users WHERE name = ", ""],
   ///         vec![Value::from("bob")],
   ///     )?)
   ///     .await
   /// })
   /// .await?;
   ///
   /// assert!(row.is_some());
   /// # Ok(())
   /// # }
   /// ```
   pub async fn transaction<F, Fut, T>(&self, callback: F) -> Result<T>
   where
      F: FnOnce(Transaction) -> Fut,
      Fut: Future<Output = Result<T>>,
   {
      let lease = self.pool.lease().await?;
      let transaction_id = Uuid::new_v4();
      debug!(%transaction_id, worker_id = lease.worker_id(), "transaction started");

      lease.submit(Request::Begin).await?;

      let _active = ActiveGuard::enter(&self.active_transactions);
      let tx = Transaction {
         lease: Arc::new(lease),
      };

      match callback(tx.clone()).await {
         Ok(value) => {
            tx.lease.submit(Request::Commit).await?;
            debug!(%transaction_id, "transaction committed");
            Ok(value)
         }
         Err(err) => {
            if let Err(rollback_err) = tx.lease.submit(Request::Rollback).await {
               warn!(
                  %transaction_id,
                  error = %rollback_err,
                  "rollback failed after transaction error"
               );
            } else {
               debug!(%transaction_id, "transaction rolled back");
            }
            Err(err)
         }
      }
   }
}
