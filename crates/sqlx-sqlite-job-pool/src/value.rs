//! Bindable scalar values and decoded rows

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteValueRef};
use sqlx::{Sqlite, TypeInfo, Value as _, ValueRef};
use time::PrimitiveDateTime;

use crate::error::SqlError;

/// A scalar that can be bound positionally to a `?` placeholder and carried
/// across the worker boundary by value.
///
/// SQLite has exactly five storage classes and this enum mirrors them.
/// Booleans are stored as `Integer` (0 or 1), matching how SQLite itself
/// stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
   Null,
   Integer(i64),
   Real(f64),
   Text(String),
   Blob(Vec<u8>),
}

/// One result row: column name to value, in SELECT column order.
pub type Row = IndexMap<String, Value>;

impl From<i64> for Value {
   fn from(v: i64) -> Self {
      Value::Integer(v)
   }
}

impl From<i32> for Value {
   fn from(v: i32) -> Self {
      Value::Integer(v.into())
   }
}

impl From<u32> for Value {
   fn from(v: u32) -> Self {
      Value::Integer(v.into())
   }
}

impl From<f64> for Value {
   fn from(v: f64) -> Self {
      Value::Real(v)
   }
}

impl From<bool> for Value {
   fn from(v: bool) -> Self {
      Value::Integer(v.into())
   }
}

impl From<&str> for Value {
   fn from(v: &str) -> Self {
      Value::Text(v.to_string())
   }
}

impl From<String> for Value {
   fn from(v: String) -> Self {
      Value::Text(v)
   }
}

impl From<&[u8]> for Value {
   fn from(v: &[u8]) -> Self {
      Value::Blob(v.to_vec())
   }
}

impl From<Vec<u8>> for Value {
   fn from(v: Vec<u8>) -> Self {
      Value::Blob(v)
   }
}

impl<T: Into<Value>> From<Option<T>> for Value {
   fn from(v: Option<T>) -> Self {
      match v {
         Some(v) => v.into(),
         None => Value::Null,
      }
   }
}

/// Attach a value to a SQLx query as the next positional argument.
pub(crate) fn bind_value<'a>(
   query: Query<'a, Sqlite, SqliteArguments<'a>>,
   value: Value,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   match value {
      Value::Null => query.bind(None::<String>),
      Value::Integer(v) => query.bind(v),
      Value::Real(v) => query.bind(v),
      Value::Text(v) => query.bind(v),
      Value::Blob(v) => query.bind(v),
   }
}

/// Decode a single column of a result row.
///
/// Decoding follows SQLite's type affinity rather than the declared column
/// type alone, so `BOOLEAN`, `DATE`, `TIME` and `DATETIME` columns come back
/// as the storage class SQLite actually used (integers and ISO-8601 text).
pub(crate) fn decode_column(value: SqliteValueRef<'_>) -> Result<Value, SqlError> {
   if value.is_null() {
      return Ok(Value::Null);
   }

   let column_type = value.type_info();

   let decoded = match column_type.name() {
      "TEXT" => value.to_owned().try_decode::<String>().map(Value::Text).ok(),

      "REAL" => value.to_owned().try_decode::<f64>().map(Value::Real).ok(),

      "INTEGER" | "NUMERIC" => value
         .to_owned()
         .try_decode::<i64>()
         .map(Value::Integer)
         .ok(),

      "BOOLEAN" => value
         .to_owned()
         .try_decode::<bool>()
         .map(|v| Value::Integer(v.into()))
         .ok(),

      // SQLite stores dates and times as ISO-8601 text
      "DATE" | "TIME" => value.to_owned().try_decode::<String>().map(Value::Text).ok(),

      "DATETIME" => {
         if let Ok(dt) = value.to_owned().try_decode::<PrimitiveDateTime>() {
            Some(Value::Text(dt.to_string()))
         } else {
            value.to_owned().try_decode::<String>().map(Value::Text).ok()
         }
      }

      "BLOB" => value.to_owned().try_decode::<Vec<u8>>().map(Value::Blob).ok(),

      "NULL" => Some(Value::Null),

      // For unknown declared types, fall back to text
      _ => value.to_owned().try_decode::<String>().map(Value::Text).ok(),
   };

   decoded.ok_or_else(|| SqlError::unsupported_datatype(column_type.name()))
}
