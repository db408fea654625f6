//! Jobs, replies, and result shapes

use serde::{Deserialize, Serialize};

use crate::compose::Statement;
use crate::error::SqlError;
use crate::value::{Row, Value};

/// A unit of work routed through the pool.
///
/// Ids are assigned by the dispatcher at submit time, strictly increasing for
/// its whole lifetime, and echoed verbatim in the worker's reply so the
/// handle can correlate the two.
#[derive(Debug, Clone)]
pub(crate) struct Job {
   pub id: u64,
   pub request: Request,
}

/// The operations a worker knows how to run against its connection.
#[derive(Debug, Clone)]
pub enum Request {
   /// A script of one or more `;`-separated statements, without parameters.
   Exec { sql: String },

   /// One parameterized statement executed for its side effects.
   Run { sql: String, values: Vec<Value> },

   /// One parameterized statement; yields the first result row, if any.
   Get { sql: String, values: Vec<Value> },

   /// One parameterized statement; yields every result row in order.
   All { sql: String, values: Vec<Value> },

   /// `BEGIN IMMEDIATE` — takes the reserved lock up front so later writes
   /// inside the transaction cannot fail with contention mid-way.
   Begin,

   /// `COMMIT`.
   Commit,

   /// `ROLLBACK`.
   Rollback,

   /// Statements executed in order inside a single immediate transaction.
   /// The first failing step rolls back everything before the error is
   /// reported.
   Batch { steps: Vec<Statement> },
}

/// Result of a successful job, one shape per request family.
#[derive(Debug, Clone)]
pub enum Outcome {
   /// `Exec`, `Begin`, `Commit`, `Rollback`.
   Done,

   /// `Run`.
   Write(WriteResult),

   /// `Get`. `None` when the query produced no rows.
   Row(Option<Row>),

   /// `All`. Empty when the query produced no rows.
   Rows(Vec<Row>),

   /// `Batch`, one entry per step.
   Batch(Vec<WriteResult>),
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
   /// The number of rows affected by the statement.
   pub rows_affected: u64,

   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only meaningful for INSERT statements on tables with a ROWID.
   pub last_insert_rowid: i64,
}

/// A worker's answer to exactly one job, id echoed verbatim.
#[derive(Debug)]
pub(crate) struct Reply {
   pub id: u64,
   pub outcome: Result<Outcome, SqlError>,
}
