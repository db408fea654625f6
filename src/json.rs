//! JSON interop for values and rows
//!
//! SQLite's scalar types and JSON do not line up exactly; the conversions
//! here pin down the edges:
//!
//! - BLOB values become base64-encoded strings, since JSON has no binary type
//! - booleans become integers (0/1), matching SQLite's own storage
//! - JSON arrays and objects are stored as their serialized text
//! - `u64` values that do not fit `i64` degrade to `f64`, losing precision

use base64::Engine;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx_sqlite_job_pool::{Row, Value};

/// Convert a JSON value into a bindable scalar.
pub fn json_to_value(value: JsonValue) -> Value {
   match value {
      JsonValue::Null => Value::Null,
      JsonValue::Bool(v) => Value::Integer(v.into()),
      JsonValue::Number(number) => {
         if let Some(v) = number.as_i64() {
            Value::Integer(v)
         } else if let Some(v) = number.as_u64() {
            // Too large for i64 (SQLite's INTEGER); fall back to f64
            Value::Real(v as f64)
         } else {
            Value::Real(number.as_f64().unwrap_or_default())
         }
      }
      JsonValue::String(text) => Value::Text(text),
      structured @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
         Value::Text(structured.to_string())
      }
   }
}

/// Convert a bindable scalar into a JSON value.
pub fn value_to_json(value: Value) -> JsonValue {
   match value {
      Value::Null => JsonValue::Null,
      Value::Integer(v) => JsonValue::Number(v.into()),
      Value::Real(v) => JsonValue::from(v),
      Value::Text(v) => JsonValue::String(v),
      Value::Blob(bytes) => JsonValue::String(base64_encode(&bytes)),
   }
}

/// Convert a result row into an ordered map of JSON values.
///
/// Column order is preserved.
pub fn row_to_json(row: Row) -> IndexMap<String, JsonValue> {
   row
      .into_iter()
      .map(|(column, value)| (column, value_to_json(value)))
      .collect()
}

/// Base64 encode binary data for JSON serialization.
fn base64_encode(data: &[u8]) -> String {
   base64::engine::general_purpose::STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_base64_encode() {
      assert_eq!(base64_encode(b"hello"), "aGVsbG8=");
      assert_eq!(base64_encode(&[1, 2, 3, 4, 5]), "AQIDBAU=");
      assert_eq!(base64_encode(&[]), "");
   }

   #[test]
   fn test_blob_round_trips_as_base64() {
      let encoded = value_to_json(Value::Blob(b"Hello".to_vec()));
      assert_eq!(encoded, json!("SGVsbG8="));
   }

   #[test]
   fn test_scalars() {
      assert_eq!(json_to_value(JsonValue::Null), Value::Null);
      assert_eq!(json_to_value(json!(true)), Value::Integer(1));
      assert_eq!(json_to_value(json!(false)), Value::Integer(0));
      assert_eq!(json_to_value(json!(42)), Value::Integer(42));
      assert_eq!(json_to_value(json!(1.5)), Value::Real(1.5));
      assert_eq!(
         json_to_value(json!("alice")),
         Value::Text("alice".to_string())
      );

      assert_eq!(value_to_json(Value::Null), JsonValue::Null);
      assert_eq!(value_to_json(Value::Integer(42)), json!(42));
      assert_eq!(value_to_json(Value::Text("x".into())), json!("x"));
   }

   #[test]
   fn test_integer_precision_preserved() {
      // 2^53: past f64's exact-integer range, still a valid i64
      let large: i64 = 9_007_199_254_740_992;
      assert_eq!(json_to_value(json!(large)), Value::Integer(large));
      assert_eq!(value_to_json(Value::Integer(large)), json!(large));
   }

   #[test]
   fn test_oversized_u64_degrades_to_real() {
      let oversized = u64::MAX;
      match json_to_value(json!(oversized)) {
         Value::Real(v) => assert!(v > 0.0),
         other => panic!("expected real, got {other:?}"),
      }
   }

   #[test]
   fn test_structured_json_stored_as_text() {
      let value = json_to_value(json!({"a": [1, 2]}));
      assert_eq!(value, Value::Text("{\"a\":[1,2]}".to_string()));
   }

   #[test]
   fn test_row_to_json_preserves_column_order() {
      let mut row = Row::default();
      row.insert("z".to_string(), Value::Integer(1));
      row.insert("a".to_string(), Value::Blob(vec![0xff]));

      let json_row = row_to_json(row);
      let keys: Vec<&String> = json_row.keys().collect();
      assert_eq!(keys, vec!["z", "a"]);
      assert_eq!(json_row["a"], json!("/w=="));
   }
}
