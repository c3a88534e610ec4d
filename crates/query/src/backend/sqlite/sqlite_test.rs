use super::*;

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::statement::Bindings;

async fn setup() -> (TempDir, SqliteBackend) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("trips.db").display());
    let backend = SqliteBackend::connect(&url, &PoolSettings::default())
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE trips (
            tpep_pickup_datetime TEXT,
            pulocationid INTEGER,
            fare_amount REAL,
            note BLOB
        )",
    )
    .execute(backend.pool())
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO trips VALUES
            ('2025-01-01 10:05:00', 1, 12.5, NULL),
            ('2025-01-01 10:30:00', 1, NULL, NULL),
            ('2025-01-02 09:00:00', 2, 7.0, x'00')",
    )
    .execute(backend.pool())
    .await
    .unwrap();

    (dir, backend)
}

#[tokio::test]
async fn test_health_check() {
    let (_dir, backend) = setup().await;
    backend.health_check().await.unwrap();
    assert_eq!(backend.name(), "sqlite");
    assert_eq!(backend.profile(), CapabilityProfile::Reduced);
}

#[tokio::test]
async fn test_decodes_storage_classes() {
    let (_dir, backend) = setup().await;
    let stmt = Statement::new(
        "SELECT pulocationid, fare_amount, tpep_pickup_datetime FROM trips \
         WHERE pulocationid = 1 ORDER BY tpep_pickup_datetime",
    );
    let result = backend.execute(&stmt).await.unwrap();

    assert_eq!(result.row_count, 2);
    assert_eq!(
        result.column_names(),
        vec!["pulocationid", "fare_amount", "tpep_pickup_datetime"]
    );
    assert_eq!(result.rows[0][0], Value::Integer(1));
    assert_eq!(result.rows[0][1], Value::Real(12.5));
    assert_eq!(result.rows[0][2], Value::Text("2025-01-01 10:05:00".into()));
    assert_eq!(result.rows[1][1], Value::Null);
    assert_eq!(result.columns[1].data_type, DataType::Real);
}

#[tokio::test]
async fn test_timestamp_params_compare_as_text() {
    let (_dir, backend) = setup().await;
    let start = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let mut bindings = Bindings::new();
    let s = bindings.bind("start", start);
    let e = bindings.bind("end", end);
    let sql = format!(
        "SELECT COUNT(*) AS n FROM trips \
         WHERE tpep_pickup_datetime >= {s} AND tpep_pickup_datetime < {e}"
    );
    let result = backend
        .execute(&Statement::with_bindings(sql, bindings))
        .await
        .unwrap();

    assert_eq!(result.scalar_i64().unwrap(), Some(2));
}

#[tokio::test]
async fn test_repeated_placeholder() {
    let (_dir, backend) = setup().await;
    let mut bindings = Bindings::new();
    let zone = bindings.bind("zone", 1i64);
    let again = bindings.bind("zone", 1i64);
    assert_eq!(zone, again);

    let sql = format!(
        "SELECT COUNT(*) FROM trips WHERE pulocationid = {zone} OR pulocationid = {again} + 100"
    );
    let result = backend
        .execute(&Statement::with_bindings(sql, bindings))
        .await
        .unwrap();
    assert_eq!(result.scalar_i64().unwrap(), Some(2));
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let (_dir, backend) = setup().await;
    let stmt = Statement::new("SELECT pulocationid AS zone_id, fare_amount FROM trips WHERE 1 = 0");
    let result = backend.execute(&stmt).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["zone_id", "fare_amount"]);
    assert!(matches!(result.scalar(), Err(QueryError::EmptyResult)));
}

#[tokio::test]
async fn test_aggregate_over_nothing_is_null() {
    let (_dir, backend) = setup().await;
    let stmt = Statement::new("SELECT SUM(fare_amount) FROM trips WHERE pulocationid = 99");
    let result = backend.execute(&stmt).await.unwrap();

    assert_eq!(result.row_count, 1);
    assert_eq!(result.scalar_f64().unwrap(), None);
}

#[tokio::test]
async fn test_blob_is_unsupported() {
    let (_dir, backend) = setup().await;
    let stmt = Statement::new("SELECT note FROM trips WHERE pulocationid = 2");
    let err = backend.execute(&stmt).await.unwrap_err();

    match err {
        QueryError::UnsupportedType { column, type_name } => {
            assert_eq!(column, "note");
            assert_eq!(type_name, "BLOB");
        }
        other => panic!("expected UnsupportedType, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejects_writes() {
    let (_dir, backend) = setup().await;
    let err = backend
        .execute(&Statement::new("DELETE FROM trips"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidSql(_)));
}

#[tokio::test]
async fn test_execution_error_leaves_pool_usable() {
    let (_dir, backend) = setup().await;
    let err = backend
        .execute(&Statement::new("SELECT no_such_column FROM trips"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Execution(_)));

    // Connection went back to the pool
    backend.health_check().await.unwrap();
}

#[tokio::test]
async fn test_math_functions_available() {
    let (_dir, backend) = setup().await;
    let stmt = Statement::new(
        "SELECT SQRT(MAX(AVG(fare_amount * fare_amount) - AVG(fare_amount) * AVG(fare_amount), 0.0))
         FROM trips",
    );
    let result = backend.execute(&stmt).await.unwrap();

    // Fares 12.5 and 7.0: population deviation is half the spread
    let std = result.scalar_f64().unwrap().unwrap();
    assert!((std - 2.75).abs() < 1e-9, "got {std}");
}
