//! Parameterized SQL composition
//!
//! Queries are assembled from literal SQL fragments with the bound values
//! carried out-of-band: a `?` placeholder is inserted between consecutive
//! fragments and the values travel alongside the text, so value content can
//! never become part of the SQL itself.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// A single SQL statement with its positionally bound values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
   pub sql: String,
   pub values: Vec<Value>,
}

impl Statement {
   pub fn new(sql: impl Into<String>, values: Vec<Value>) -> Self {
      Self {
         sql: sql.into(),
         values,
      }
   }
}

impl From<&str> for Statement {
   fn from(sql: &str) -> Self {
      Self {
         sql: sql.to_string(),
         values: Vec::new(),
      }
   }
}

impl From<String> for Statement {
   fn from(sql: String) -> Self {
      Self {
         sql,
         values: Vec::new(),
      }
   }
}

impl From<(&str, Vec<Value>)> for Statement {
   fn from((sql, values): (&str, Vec<Value>)) -> Self {
      Self {
         sql: sql.to_string(),
         values,
      }
   }
}

impl From<(String, Vec<Value>)> for Statement {
   fn from((sql, values): (String, Vec<Value>)) -> Self {
      Self { sql, values }
   }
}

/// Interleave literal SQL fragments with bound values.
///
/// `fragments` must contain exactly one more piece than `values`. The result
/// is `fragments[0] ? fragments[1] ? … fragments[n]` with the values returned
/// unchanged, in order, for positional binding.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_job_pool::{compose, Value};
///
/// let stmt = compose(
///     &["SELECT * FROM users WHERE id = ", " AND active = ", ""],
///     vec![Value::Integer(1), Value::Integer(1)],
/// ).unwrap();
///
/// assert_eq!(stmt.sql, "SELECT * FROM users WHERE id = ? AND active = ?");
/// assert_eq!(stmt.values.len(), 2);
/// ```
pub fn compose(fragments: &[&str], values: Vec<Value>) -> Result<Statement, Error> {
   if fragments.is_empty() {
      return Err(Error::InvalidQuery(
         "at least one SQL fragment is required".to_string(),
      ));
   }

   if fragments.len() != values.len() + 1 {
      return Err(Error::InvalidQuery(format!(
         "{} fragments require {} interleaved values, got {}",
         fragments.len(),
         fragments.len() - 1,
         values.len()
      )));
   }

   if values.is_empty() {
      return Ok(Statement {
         sql: fragments.concat(),
         values,
      });
   }

   let mut sql =
      String::with_capacity(fragments.iter().map(|f| f.len()).sum::<usize>() + values.len());
   sql.push_str(fragments[0]);
   for fragment in &fragments[1..] {
      sql.push('?');
      sql.push_str(fragment);
   }

   Ok(Statement { sql, values })
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_interleaves_placeholders() {
      let stmt = compose(
         &["INSERT INTO users (id, name) VALUES (", ", ", ")"],
         vec![Value::Integer(1), Value::Text("alice".to_string())],
      )
      .unwrap();

      assert_eq!(stmt.sql, "INSERT INTO users (id, name) VALUES (?, ?)");
      assert_eq!(
         stmt.values,
         vec![Value::Integer(1), Value::Text("alice".to_string())]
      );
   }

   #[test]
   fn test_placeholder_count_matches_values() {
      let fragments = ["a = ", " AND b = ", " AND c = ", ""];
      let values = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
      let stmt = compose(&fragments, values.clone()).unwrap();

      assert_eq!(stmt.sql.matches('?').count(), values.len());

      // Removing the placeholders gives back the original fragments
      let pieces: Vec<&str> = stmt.sql.split('?').collect();
      assert_eq!(pieces, fragments);
   }

   #[test]
   fn test_single_fragment_fast_path() {
      let stmt = compose(&["SELECT 1 FROM t"], vec![]).unwrap();
      assert_eq!(stmt.sql, "SELECT 1 FROM t");
      assert!(stmt.values.is_empty());
   }

   #[test]
   fn test_trailing_empty_fragment() {
      let stmt = compose(&["X", ""], vec![Value::Integer(9)]).unwrap();
      assert_eq!(stmt.sql, "X?");
      assert_eq!(stmt.values, vec![Value::Integer(9)]);
   }

   #[test]
   fn test_empty_fragments_rejected() {
      let result = compose(&[], vec![]);
      assert!(matches!(result, Err(Error::InvalidQuery(_))));
   }

   #[test]
   fn test_arity_mismatch_rejected() {
      let too_few = compose(&["a = ", " AND b = ", ""], vec![Value::Integer(1)]);
      assert!(matches!(too_few, Err(Error::InvalidQuery(_))));

      let too_many = compose(&["a = ", ""], vec![Value::Integer(1), Value::Integer(2)]);
      assert!(matches!(too_many, Err(Error::InvalidQuery(_))));

      let none_at_all = compose(&["a = ", ""], vec![]);
      assert!(matches!(none_at_all, Err(Error::InvalidQuery(_))));
   }

   #[test]
   fn test_values_never_reach_sql_text() {
      let stmt = compose(
         &["SELECT * FROM t WHERE name = ", ""],
         vec![Value::Text("'; DROP TABLE t; --".to_string())],
      )
      .unwrap();

      assert_eq!(stmt.sql, "SELECT * FROM t WHERE name = ?");
      assert!(!stmt.sql.contains("DROP"));
   }

   #[test]
   fn test_plain_string_passes_through() {
      let stmt = Statement::from("SELECT 1");
      assert_eq!(stmt.sql, "SELECT 1");
      assert!(stmt.values.is_empty());
   }
}
