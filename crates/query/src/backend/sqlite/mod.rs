//! SQLite backend for the reduced-capability profile
//!
//! Reads the single-file trip store written by the batch loader. Timestamps
//! are stored as `YYYY-MM-DD HH:MM:SS` text, so timestamp parameters are
//! bound in that same format to keep comparisons lexicographically correct.

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Executor as _, Row as _, Sqlite, Statement as _, TypeInfo as _, ValueRef as _};

use crate::backend::{QueryBackend, validate_sql};
use crate::config::PoolSettings;
use crate::error::QueryError;
use crate::profile::CapabilityProfile;
use crate::result::{Column, DataType, QueryResult, TIMESTAMP_FORMAT, Value};
use crate::statement::{ParamValue, Statement};

/// How long a connection waits on a locked database file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite backend
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl SqliteBackend {
    /// Open a pool against a SQLite URL (`sqlite://path.db`)
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, QueryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| QueryError::Config(format!("invalid sqlite url: {}", e)))?
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| QueryError::Connection(format!("SQLite connection failed: {}", e)))?;

        tracing::info!(
            url = url,
            max_connections = settings.max_connections,
            "opened SQLite pool"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, QueryError> {
        validate_sql(&statement.sql)?;

        let start = Instant::now();

        // Scoped connection: returned to the pool when `conn` drops, on every path
        let mut conn = self.pool.acquire().await?;

        let query = bind_params(sqlx::query(&statement.sql), &statement.params);
        let rows: Vec<SqliteRow> = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| QueryError::Execution(format!("SQLite error: {}", e)))?;

        let columns: Vec<Column> = if let Some(first) = rows.first() {
            first
                .columns()
                .iter()
                .map(|c| Column::new(c.name(), DataType::Unknown))
                .collect()
        } else {
            // No rows: recover column names from the prepared statement
            let prepared = (&mut *conn)
                .prepare(&statement.sql)
                .await
                .map_err(|e| QueryError::Execution(format!("SQLite error: {}", e)))?;
            prepared
                .columns()
                .iter()
                .map(|c| Column::new(c.name(), DataType::Unknown))
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
            "SQLite query executed"
        );

        Ok(QueryResult::new(columns, data, execution_time_ms))
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn profile(&self) -> CapabilityProfile {
        CapabilityProfile::Reduced
    }
}

/// Bind statement parameters in placeholder order
fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [ParamValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            ParamValue::Integer(i) => query.bind(*i),
            ParamValue::Real(f) => query.bind(*f),
            ParamValue::Text(s) => query.bind(s.as_str()),
            ParamValue::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
        };
    }
    query
}

/// Decode one row using the storage class of each cell
///
/// SQLite columns are dynamically typed, so the declared column type says
/// nothing about computed expressions; the value's own type is used instead.
fn decode_row(row: &SqliteRow, columns: &[Column]) -> Result<Vec<Value>, QueryError> {
    let mut values = Vec::with_capacity(columns.len());

    for (idx, col) in columns.iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }

        let type_name = raw.type_info().name().to_ascii_uppercase();
        let value = match type_name.as_str() {
            "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => {
                Value::Integer(row.try_get_unchecked::<i64, _>(idx)?)
            }
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
                Value::real(row.try_get_unchecked::<f64, _>(idx)?)
            }
            "TEXT" | "DATETIME" | "DATE" | "TIME" => {
                Value::Text(row.try_get_unchecked::<String, _>(idx)?)
            }
            other => return Err(QueryError::unsupported_type(&col.name, other)),
        };
        values.push(value);
    }

    Ok(values)
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod sqlite_test;
