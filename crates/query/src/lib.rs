//! Taxi Query - pooled SQL execution for taxi trip analytics
//!
//! Provides a unified interface for running parameterised statements against
//! either trip store:
//! - **SQLite**: single-file store written by the batch loader (reduced profile)
//! - **PostgreSQL**: server store (full profile)
//!
//! # Usage
//!
//! ```ignore
//! use taxi_query::{QueryConfig, QueryEngine, Statement};
//!
//! let config = QueryConfig::sqlite("sqlite://nyc_taxi.db");
//! let engine = QueryEngine::from_query_config(&config).await?;
//!
//! let result = engine.execute(&Statement::new("SELECT COUNT(*) FROM trips")).await?;
//! println!("Rows: {}", result.row_count);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod profile;
pub mod result;
pub mod statement;

// Re-exports
pub use backend::QueryBackend;
pub use backend::postgres::PostgresBackend;
pub use backend::sqlite::SqliteBackend;
pub use config::{PoolSettings, QueryBackendType, QueryConfig, ResolvedQueryConfig};
pub use error::QueryError;
pub use profile::CapabilityProfile;
pub use result::{Column, DataType, QueryResult, TIMESTAMP_FORMAT, Value};
pub use statement::{Bindings, ParamValue, Placeholder, Statement};

use std::sync::Arc;

/// Query engine that routes statements to the configured backend
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct QueryEngine {
    backend: Arc<dyn QueryBackend>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("backend", &self.backend.name())
            .field("profile", &self.backend.profile())
            .finish()
    }
}

impl QueryEngine {
    /// Create a new query engine with a specific backend
    pub fn new(backend: impl QueryBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Create a query engine from resolved config
    pub async fn from_resolved_config(config: &ResolvedQueryConfig) -> Result<Self, QueryError> {
        match config.backend {
            QueryBackendType::Sqlite => {
                let backend = SqliteBackend::connect(&config.url, &config.pool).await?;
                Ok(Self::new(backend))
            }
            QueryBackendType::Postgres => {
                let backend = PostgresBackend::connect(&config.url, &config.pool).await?;
                Ok(Self::new(backend))
            }
        }
    }

    /// Create a query engine from raw query config
    pub async fn from_query_config(config: &QueryConfig) -> Result<Self, QueryError> {
        let resolved = ResolvedQueryConfig::from_config(config)?;
        Self::from_resolved_config(&resolved).await
    }

    /// Execute a statement that takes no parameters
    pub async fn query(&self, sql: &str) -> Result<QueryResult, QueryError> {
        self.backend.execute(&Statement::new(sql)).await
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

/// Output format for query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON document
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

// QueryEngine is itself a backend so the metrics layer can hold either
#[async_trait::async_trait]
impl QueryBackend for QueryEngine {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, QueryError> {
        self.backend.execute(statement).await
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        self.backend.health_check().await
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn profile(&self) -> CapabilityProfile {
        self.backend.profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[tokio::test]
    async fn test_engine_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueryConfig::sqlite(format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("engine.db").display()
        ));
        let engine = QueryEngine::from_query_config(&config).await.unwrap();

        assert_eq!(engine.backend_name(), "sqlite");
        assert_eq!(engine.profile(), CapabilityProfile::Reduced);
        engine.health_check().await.unwrap();

        let result = engine.query("SELECT 1 AS one").await.unwrap();
        assert_eq!(result.scalar_i64().unwrap(), Some(1));
    }
}
