//! Query error types

/// Errors that can occur during query execution
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Could not open or acquire a pooled connection
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend rejected or failed the query (carries the backend diagnostic)
    #[error("query execution failed: {0}")]
    Execution(String),

    /// A scalar was requested but the query returned no rows
    #[error("query returned no rows")]
    EmptyResult,

    /// Invalid SQL (only SELECT/WITH allowed)
    #[error("invalid SQL: {0}")]
    InvalidSql(String),

    /// A result column had a type this adapter cannot represent
    #[error("unsupported column type {type_name} in column '{column}'")]
    UnsupportedType {
        /// Column name
        column: String,
        /// Backend type name
        type_name: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// Create an UnsupportedType error
    pub fn unsupported_type(column: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            type_name: type_name.into(),
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                QueryError::Connection(err.to_string())
            }
            sqlx::Error::Configuration(e) => QueryError::Config(e.to_string()),
            other => QueryError::Execution(other.to_string()),
        }
    }
}
