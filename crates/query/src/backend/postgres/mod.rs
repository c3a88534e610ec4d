//! PostgreSQL backend for the full-capability profile
//!
//! Every numeric expression the analytics layer emits is cast to
//! `DOUBLE PRECISION` or `INTEGER`, so `NUMERIC` results are treated as an
//! adapter error rather than silently losing precision.

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as _, Executor as _, Postgres, Row as _, Statement as _, TypeInfo as _, ValueRef as _};

use crate::backend::{QueryBackend, validate_sql};
use crate::config::PoolSettings;
use crate::error::QueryError;
use crate::profile::CapabilityProfile;
use crate::result::{Column, DataType, QueryResult, Value};
use crate::statement::{ParamValue, Statement};

/// PostgreSQL backend
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresBackend {
    /// Open a pool against a PostgreSQL URL
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, QueryError> {
        let mut options = PgConnectOptions::from_str(url)
            .map_err(|e| QueryError::Config(format!("invalid postgres url: {}", e)))?
            .application_name("taxi-metrics");

        if let Some(timeout) = settings.statement_timeout {
            options = options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| QueryError::Connection(format!("PostgreSQL connection failed: {}", e)))?;

        tracing::info!(
            max_connections = settings.max_connections,
            statement_timeout_ms = settings.statement_timeout.map(|t| t.as_millis() as u64),
            "opened PostgreSQL pool"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryBackend for PostgresBackend {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, QueryError> {
        validate_sql(&statement.sql)?;

        let start = Instant::now();

        let mut conn = self.pool.acquire().await?;

        let query = bind_params(sqlx::query(&statement.sql), &statement.params);
        let rows: Vec<PgRow> = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| QueryError::Execution(format!("PostgreSQL error: {}", e)))?;

        let columns: Vec<Column> = if let Some(first) = rows.first() {
            first
                .columns()
                .iter()
                .map(|c| Column::new(c.name(), map_type(c.type_info().name())))
                .collect()
        } else {
            let prepared = (&mut *conn)
                .prepare(&statement.sql)
                .await
                .map_err(|e| QueryError::Execution(format!("PostgreSQL error: {}", e)))?;
            prepared
                .columns()
                .iter()
                .map(|c| Column::new(c.name(), map_type(c.type_info().name())))
                .collect()
        };

        let data = rows
            .iter()
            .map(|row| decode_row(row, &columns))
            .collect::<Result<Vec<_>, _>>()?;

        let execution_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            rows = data.len(),
            cols = columns.len(),
            params = statement.params.len(),
            time_ms = execution_time_ms,
            "PostgreSQL query executed"
        );

        Ok(QueryResult::new(columns, data, execution_time_ms))
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }

    fn profile(&self) -> CapabilityProfile {
        CapabilityProfile::Full
    }
}

/// Bind statement parameters in placeholder order
fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [ParamValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            ParamValue::Integer(i) => query.bind(*i),
            ParamValue::Real(f) => query.bind(*f),
            ParamValue::Text(s) => query.bind(s.as_str()),
            ParamValue::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

/// Map a PostgreSQL type name to a result data type
fn map_type(type_name: &str) -> DataType {
    match type_name {
        "INT2" | "INT4" | "INT8" | "BOOL" => DataType::Integer,
        "FLOAT4" | "FLOAT8" => DataType::Real,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "DATE" => DataType::Text,
        "TIMESTAMP" | "TIMESTAMPTZ" => DataType::Timestamp,
        _ => DataType::Unknown,
    }
}

/// Decode one row using each column's declared type
fn decode_row(row: &PgRow, columns: &[Column]) -> Result<Vec<Value>, QueryError> {
    let mut values = Vec::with_capacity(columns.len());

    for (idx, col) in columns.iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }

        let type_name = raw.type_info().name().to_string();
        let value = match type_name.as_str() {
            "INT2" => Value::Integer(i64::from(row.try_get::<i16, _>(idx)?)),
            "INT4" => Value::Integer(i64::from(row.try_get::<i32, _>(idx)?)),
            "INT8" => Value::Integer(row.try_get::<i64, _>(idx)?),
            "FLOAT4" => Value::real(f64::from(row.try_get::<f32, _>(idx)?)),
            "FLOAT8" => Value::real(row.try_get::<f64, _>(idx)?),
            "BOOL" => Value::Integer(i64::from(row.try_get::<bool, _>(idx)?)),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get::<String, _>(idx)?),
            "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(idx)?),
            "TIMESTAMPTZ" => {
                Value::Timestamp(row.try_get::<DateTime<Utc>, _>(idx)?.naive_utc())
            }
            "DATE" => Value::Text(row.try_get::<NaiveDate, _>(idx)?.format("%Y-%m-%d").to_string()),
            other => return Err(QueryError::unsupported_type(&col.name, other)),
        };
        values.push(value);
    }

    Ok(values)
}
