//! Parameterised statements
//!
//! Values never enter SQL text. Callers allocate placeholders from a
//! [`Bindings`] set while composing SQL, then pair the finished text with the
//! bound values in a [`Statement`].
//!
//! Placeholders render as `$1..$n`. PostgreSQL takes these natively and the
//! SQLite driver accepts `$NNN` as a numbered parameter, so one rendering
//! serves both backends.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// A value bound to a statement placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Naive timestamp (stored timestamps carry no zone)
    Timestamp(NaiveDateTime),
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

/// Reference to a bound parameter, rendered as `$n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(usize);

impl Placeholder {
    /// 1-based position of the parameter
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Named parameter set under construction
///
/// Binding the same name twice returns the original placeholder, so a value
/// referenced from several CTEs is bound exactly once.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, ParamValue)>,
}

impl Bindings {
    /// Create an empty binding set
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a named value and return its placeholder
    pub fn bind(&mut self, name: &str, value: impl Into<ParamValue>) -> Placeholder {
        if let Some(pos) = self.entries.iter().position(|(n, _)| n == name) {
            return Placeholder(pos + 1);
        }
        self.entries.push((name.to_string(), value.into()));
        Placeholder(self.entries.len())
    }

    /// Look up a previously bound placeholder by name
    pub fn placeholder(&self, name: &str) -> Option<Placeholder> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(|pos| Placeholder(pos + 1))
    }

    /// Number of distinct parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameters are bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter names in placeholder order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Consume into positional values
    pub fn into_values(self) -> Vec<ParamValue> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }
}

/// SQL text with positionally bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text containing `$n` placeholders
    pub sql: String,

    /// Values for `$1..$n`, in order
    pub params: Vec<ParamValue>,
}

impl Statement {
    /// Create a statement with no parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Pair SQL text with a finished binding set
    pub fn with_bindings(sql: impl Into<String>, bindings: Bindings) -> Self {
        Self {
            sql: sql.into(),
            params: bindings.into_values(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_display() {
        let mut b = Bindings::new();
        let p = b.bind("threshold", 0.2);
        assert_eq!(p.to_string(), "$1");
        assert_eq!(p.index(), 1);
    }

    #[test]
    fn test_rebinding_same_name_reuses_placeholder() {
        let mut b = Bindings::new();
        let first = b.bind("start", 1i64);
        let second = b.bind("end", 2i64);
        let again = b.bind("start", 99i64);

        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(b.len(), 2);
        assert_eq!(b.into_values(), vec![ParamValue::Integer(1), ParamValue::Integer(2)]);
    }

    #[test]
    fn test_placeholder_lookup() {
        let mut b = Bindings::new();
        b.bind("limit", 20u32);
        assert_eq!(b.placeholder("limit").map(|p| p.index()), Some(1));
        assert!(b.placeholder("missing").is_none());
    }

    #[test]
    fn test_statement_with_bindings() {
        let mut b = Bindings::new();
        let p = b.bind("limit", 10u32);
        let stmt = Statement::with_bindings(format!("SELECT 1 LIMIT {}", p), b);
        assert_eq!(stmt.sql, "SELECT 1 LIMIT $1");
        assert_eq!(stmt.params, vec![ParamValue::Integer(10)]);
    }
}
