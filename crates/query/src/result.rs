//! Query result types
//!
//! Unified result format across both backends (SQLite, PostgreSQL).

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::error::QueryError;

/// Format used when a timestamp is rendered as text
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A nullable scalar cell
///
/// `Null` is kept distinct from zero all the way to serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer
    Integer(i64),
    /// Real number (always finite)
    Real(f64),
    /// Text
    Text(String),
    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Build a real value, mapping NaN and infinities to `Null`
    pub fn real(v: f64) -> Self {
        if v.is_finite() {
            Value::Real(v)
        } else {
            Value::Null
        }
    }

    /// Whether this cell is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view (reals are truncated only when they hold a whole number)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Text view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Data type of this cell
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Unknown,
            Value::Integer(_) => DataType::Integer,
            Value::Real(_) => DataType::Real,
            Value::Text(_) => DataType::Text,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => {
                serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
            }
        }
    }
}

/// Unified query result across all backends
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column definitions, in declaration order
    pub columns: Vec<Column>,

    /// Rows, positionally aligned with `columns`
    pub rows: Vec<Vec<Value>>,

    /// Total row count
    pub row_count: usize,

    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    ///
    /// Column types left `Unknown` by the backend are inferred from the first
    /// non-null cell in that column.
    pub fn new(mut columns: Vec<Column>, rows: Vec<Vec<Value>>, execution_time_ms: u64) -> Self {
        for (i, col) in columns.iter_mut().enumerate() {
            if col.data_type == DataType::Unknown
                && let Some(v) = rows.iter().filter_map(|r| r.get(i)).find(|v| !v.is_null())
            {
                col.data_type = v.data_type();
            }
        }

        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time_ms: 0,
        }
    }

    /// Check if result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell of `row` under column `name`
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)
    }

    /// First cell of the first row
    ///
    /// Fails with [`QueryError::EmptyResult`] when there are no rows. A NULL
    /// cell is returned as `Value::Null`, not an error.
    pub fn scalar(&self) -> Result<&Value, QueryError> {
        self.rows
            .first()
            .and_then(|row| row.first())
            .ok_or(QueryError::EmptyResult)
    }

    /// First cell as f64 (`None` for NULL)
    pub fn scalar_f64(&self) -> Result<Option<f64>, QueryError> {
        Ok(self.scalar()?.as_f64())
    }

    /// First cell as i64 (`None` for NULL)
    pub fn scalar_i64(&self) -> Result<Option<i64>, QueryError> {
        Ok(self.scalar()?.as_i64())
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, val)| {
                        let json = serde_json::to_value(val).unwrap_or(serde_json::Value::Null);
                        (col.name.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Column definition
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Data type
    pub data_type: DataType,
}

impl Column {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Data types supported in query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Signed 64-bit integer
    Integer,
    /// 64-bit floating point
    Real,
    /// UTF-8 string
    Text,
    /// Timestamp without time zone
    Timestamp,
    /// No non-null value seen
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec![
                Column::new("zone_id", DataType::Unknown),
                Column::new("ratio", DataType::Unknown),
            ],
            vec![
                vec![Value::Integer(1), Value::Null],
                vec![Value::Integer(2), Value::Real(0.5)],
            ],
            3,
        )
    }

    #[test]
    fn test_infers_types_from_first_non_null() {
        let result = sample();
        assert_eq!(result.columns[0].data_type, DataType::Integer);
        assert_eq!(result.columns[1].data_type, DataType::Real);
        assert_eq!(result.row_count, 2);
    }

    #[test]
    fn test_get_by_name() {
        let result = sample();
        assert_eq!(result.get(1, "ratio"), Some(&Value::Real(0.5)));
        assert_eq!(result.get(0, "ratio"), Some(&Value::Null));
        assert!(result.get(0, "missing").is_none());
        assert!(result.get(5, "zone_id").is_none());
    }

    #[test]
    fn test_scalar_empty_result() {
        let result = QueryResult::empty();
        assert!(matches!(result.scalar(), Err(QueryError::EmptyResult)));
    }

    #[test]
    fn test_scalar_null_is_not_empty() {
        let result = QueryResult::new(
            vec![Column::new("total", DataType::Unknown)],
            vec![vec![Value::Null]],
            0,
        );
        assert_eq!(result.scalar_f64().unwrap(), None);
    }

    #[test]
    fn test_non_finite_real_becomes_null() {
        assert_eq!(Value::real(f64::INFINITY), Value::Null);
        assert_eq!(Value::real(f64::NAN), Value::Null);
        assert_eq!(Value::real(1.5), Value::Real(1.5));
    }

    #[test]
    fn test_serialize_values() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::Integer(3),
            Value::Real(2.5),
            Value::Text("0-2".into()),
            Value::Timestamp(ts),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,3,2.5,"0-2","2025-01-01 10:00:00"]"#);
    }

    #[test]
    fn test_to_records() {
        let records = sample().to_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["zone_id"], serde_json::json!(2));
        assert!(records[0]["ratio"].is_null());
    }
}
