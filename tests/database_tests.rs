use async_sqlite_pool::{Database, DatabaseOptions, Error, Statement, Value, compose};
use tempfile::TempDir;

async fn create_test_db() -> (Database, TempDir) {
   let temp_dir = TempDir::new().expect("failed to create temp directory");
   let db_path = temp_dir.path().join("test.db");
   let db = Database::open_path(db_path.as_path())
      .await
      .expect("failed to open test database");

   (db, temp_dir)
}

#[tokio::test]
async fn test_single_row_crud() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
      .await
      .unwrap();

   let result = db
      .execute(
         compose(
            &["INSERT INTO users (id, name) VALUES (", ", ", ")"],
            vec![Value::Integer(1), Value::from("alice")],
         )
         .unwrap(),
      )
      .await
      .unwrap();
   assert_eq!((result.rows_affected, result.last_insert_rowid), (1, 1));

   let row = db
      .fetch_optional(
         compose(
            &["SELECT id, name FROM users WHERE id = ", ""],
            vec![Value::Integer(1)],
         )
         .unwrap(),
      )
      .await
      .unwrap()
      .expect("row should exist");
   assert_eq!(row.get("id"), Some(&Value::Integer(1)));
   assert_eq!(row.get("name"), Some(&Value::Text("alice".to_string())));

   let rows = db.fetch_all("SELECT id, name FROM users").await.unwrap();
   assert_eq!(rows.len(), 1);
   assert_eq!(rows[0].get("name"), Some(&Value::Text("alice".to_string())));

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_write_results() {
   let (db, _temp) = create_test_db().await;

   // DDL through execute reports 0 rows affected
   let result = db
      .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
      .await
      .unwrap();
   assert_eq!(result.rows_affected, 0);

   let result = db
      .execute(("INSERT INTO t (name) VALUES (?)", vec![Value::from("alice")]))
      .await
      .unwrap();
   assert_eq!((result.rows_affected, result.last_insert_rowid), (1, 1));

   let result = db
      .execute(("INSERT INTO t (name) VALUES (?)", vec![Value::from("bob")]))
      .await
      .unwrap();
   assert_eq!((result.rows_affected, result.last_insert_rowid), (1, 2));

   // UPDATE affects multiple rows
   let result = db
      .execute("UPDATE t SET name = 'X' WHERE id > 0")
      .await
      .unwrap();
   assert_eq!(result.rows_affected, 2);

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_boundaries() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
      .await
      .unwrap();

   // No row: absent, not an empty mapping
   let row = db
      .fetch_optional(("SELECT * FROM t WHERE id = ?", vec![Value::Integer(999)]))
      .await
      .unwrap();
   assert!(row.is_none());

   // No rows: empty sequence
   let rows = db.fetch_all("SELECT * FROM t").await.unwrap();
   assert!(rows.is_empty());

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_script_with_values_rejected() {
   let (db, _temp) = create_test_db().await;

   let err = db
      .execute_batch(("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (?)", vec![
         Value::Integer(1),
      ]))
      .await
      .unwrap_err();
   assert_eq!(err.error_code(), "INVALID_QUERY");

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_multi_statement_script() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch(
      "CREATE TABLE a (x INTEGER); \
       CREATE TABLE b (y INTEGER); \
       INSERT INTO a (x) VALUES (1); \
       INSERT INTO b (y) SELECT x + 1 FROM a",
   )
   .await
   .unwrap();

   let row = db.fetch_optional("SELECT y FROM b").await.unwrap().unwrap();
   assert_eq!(row.get("y"), Some(&Value::Integer(2)));

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_type_binding_and_decoding() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch(
      "CREATE TABLE t (id INTEGER PRIMARY KEY, txt TEXT, num REAL, big INTEGER, flag BOOLEAN, data BLOB)",
   )
   .await
   .unwrap();

   let large_int: i64 = 9_007_199_254_740_992; // 2^53

   db.execute(("INSERT INTO t (txt) VALUES (?)", vec![Value::Null]))
      .await
      .unwrap();
   db.execute((
      "INSERT INTO t (txt, num) VALUES (?, ?)",
      vec![Value::from("hello"), Value::Real(1.23456)],
   ))
   .await
   .unwrap();
   db.execute(("INSERT INTO t (big) VALUES (?)", vec![Value::Integer(large_int)]))
      .await
      .unwrap();
   db.execute("INSERT INTO t (flag) VALUES (TRUE)").await.unwrap();
   db.execute(("INSERT INTO t (data) VALUES (?)", vec![Value::Blob(b"Hello".to_vec())]))
      .await
      .unwrap();

   let rows = db.fetch_all("SELECT * FROM t ORDER BY id").await.unwrap();

   // NULL decoding
   assert_eq!(rows[0].get("txt"), Some(&Value::Null));

   // Float decoding (with tolerance)
   match rows[1].get("num") {
      Some(Value::Real(num)) => assert!((num - 1.23456).abs() < 0.0001),
      other => panic!("expected real, got {other:?}"),
   }

   // Large integer precision
   assert_eq!(rows[2].get("big"), Some(&Value::Integer(large_int)));

   // Boolean stored as integer
   assert_eq!(rows[3].get("flag"), Some(&Value::Integer(1)));

   // BLOB round-trips as raw bytes
   assert_eq!(rows[4].get("data"), Some(&Value::Blob(b"Hello".to_vec())));

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_column_order_preserved() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch("CREATE TABLE t (z TEXT, a TEXT, m TEXT)")
      .await
      .unwrap();
   db.execute((
      "INSERT INTO t VALUES (?, ?, ?)",
      vec![Value::from("z"), Value::from("a"), Value::from("m")],
   ))
   .await
   .unwrap();

   let rows = db.fetch_all("SELECT z, a, m FROM t").await.unwrap();
   let keys: Vec<&String> = rows[0].keys().collect();
   assert_eq!(keys, vec!["z", "a", "m"]);

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_transaction_batch() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch(
      "CREATE TABLE t (id INTEGER PRIMARY KEY, val INTEGER NOT NULL); \
       INSERT INTO t (id, val) VALUES (1, 100), (2, 50)",
   )
   .await
   .unwrap();

   // Successful batch commits
   let results = db
      .execute_transaction(vec![
         Statement::from("UPDATE t SET val = val - 30 WHERE id = 1"),
         Statement::from("UPDATE t SET val = val + 30 WHERE id = 2"),
      ])
      .await
      .unwrap();
   assert_eq!(results.len(), 2);

   let rows = db.fetch_all("SELECT val FROM t ORDER BY id").await.unwrap();
   assert_eq!(rows[0].get("val"), Some(&Value::Integer(70)));
   assert_eq!(rows[1].get("val"), Some(&Value::Integer(80)));

   // Failed batch rolls back (NULL violates NOT NULL)
   let err = db
      .execute_transaction(vec![
         Statement::from("UPDATE t SET val = 999 WHERE id = 1"),
         Statement::from(("INSERT INTO t (id, val) VALUES (?, ?)", vec![
            Value::Integer(3),
            Value::Null,
         ])),
      ])
      .await;
   assert!(err.is_err());

   let row = db
      .fetch_optional("SELECT val FROM t WHERE id = 1")
      .await
      .unwrap()
      .unwrap();
   assert_eq!(row.get("val"), Some(&Value::Integer(70)));

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch(
      "CREATE TABLE parents (id INTEGER PRIMARY KEY); \
       CREATE TABLE children (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parents(id))",
   )
   .await
   .unwrap();

   let err = db
      .execute(("INSERT INTO children (parent_id) VALUES (?)", vec![
         Value::Integer(404),
      ]))
      .await
      .unwrap_err();
   assert!(err.error_code().starts_with("SQLITE_"));

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_close_rejects_followup_queries() {
   let (db, _temp) = create_test_db().await;

   db.execute_batch("CREATE TABLE t (id INTEGER)").await.unwrap();
   db.close().await.unwrap();

   let err = db.execute("INSERT INTO t (id) VALUES (1)").await.unwrap_err();
   assert_eq!(err.error_code(), "POOL_CLOSED");
}

#[tokio::test]
async fn test_driver_selection_by_name() {
   let temp_dir = TempDir::new().unwrap();
   let db_path = temp_dir.path().join("test.db");

   // Unknown driver names fail before any worker is started
   let err = DatabaseOptions::new(&db_path)
      .with_driver("postgres")
      .unwrap_err();
   assert!(matches!(err, Error::UnknownDriver(_)));
   assert_eq!(err.error_code(), "UNKNOWN_DRIVER");

   // The native-binding spelling normalizes to the bundled engine
   let options = DatabaseOptions::new(&db_path).with_driver("sqlite3").unwrap();
   let db = Database::open(options).await.unwrap();
   db.execute_batch("CREATE TABLE t (id INTEGER)").await.unwrap();
   db.close().await.unwrap();
}

#[tokio::test]
async fn test_in_memory_database() {
   let db = Database::open_in_memory().await.unwrap();

   // With multiple workers each owns its own in-memory database, so keep
   // everything on one connection via a transaction.
   let row = db
      .transaction(|tx| async move {
         tx.execute_batch("CREATE TABLE t (v TEXT)").await?;
         tx.execute(("INSERT INTO t (v) VALUES (?)", vec![Value::from("scratch")]))
            .await?;
         tx.fetch_optional("SELECT v FROM t").await
      })
      .await
      .unwrap()
      .unwrap();
   assert_eq!(row.get("v"), Some(&Value::Text("scratch".to_string())));

   db.close().await.unwrap();
}
