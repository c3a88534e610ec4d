//! Query backend trait and implementations

pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::QueryError;
use crate::profile::CapabilityProfile;
use crate::result::QueryResult;
use crate::statement::Statement;

/// Query backend trait
///
/// Implemented by the SQLite and PostgreSQL backends. Implementations own a
/// connection pool and must be safe to call from many tasks at once: each
/// call acquires its own connection and returns it on every exit path.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute a parameterised statement
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, QueryError>;

    /// Check if backend is available
    async fn health_check(&self) -> Result<(), QueryError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Capability profile of this backend
    fn profile(&self) -> CapabilityProfile;
}

/// Validate SQL query - only allow SELECT and WITH (CTE) queries
///
/// Every statement this crate runs is composed by the analytics layer, so
/// this only catches composition mistakes before they reach the database.
pub fn validate_sql(sql: &str) -> Result<(), QueryError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();

    // Must start with SELECT or WITH (CTE)
    if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
        return Err(QueryError::InvalidSql(
            "only SELECT and WITH queries are allowed".to_string(),
        ));
    }

    // Block SELECT ... INTO (creates tables in some databases)
    if upper.contains(" INTO ") {
        return Err(QueryError::InvalidSql(
            "SELECT INTO is not allowed".to_string(),
        ));
    }

    // Disallow multiple statements; a trailing semicolon is fine
    if trimmed.trim_end_matches(';').contains(';') {
        return Err(QueryError::InvalidSql(
            "multiple statements not allowed".to_string(),
        ));
    }

    Ok(())
}
