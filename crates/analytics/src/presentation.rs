//! Metric presentation
//!
//! Wraps metric data with the fixed assumptions behind it, plus a label for
//! every approximate statistic the query used.

use serde::{Deserialize, Serialize};

use crate::dialect::Approximation;

/// One documented assumption or limitation of a metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assumption {
    /// Short key (`congestion_index`, `approximation`)
    pub key: String,
    /// Explanation
    pub text: String,
}

impl Assumption {
    /// Create a new assumption
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }

    /// Assumption recording an approximate statistic
    pub fn approximation(approx: &Approximation) -> Self {
        Self::new("approximation", approx.describe())
    }
}

/// Build a list of assumptions from `(key, text)` pairs
pub fn assumptions(pairs: &[(&str, &str)]) -> Vec<Assumption> {
    pairs
        .iter()
        .map(|(key, text)| Assumption::new(*key, *text))
        .collect()
}

/// A metric result with its annotations
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport<T> {
    /// Metric name
    pub metric: String,
    /// Result data
    pub data: T,
    /// Assumptions and limitations
    pub assumptions: Vec<Assumption>,
}

impl<T> MetricReport<T> {
    /// Create a new report
    pub fn new(metric: impl Into<String>, data: T, assumptions: Vec<Assumption>) -> Self {
        Self {
            metric: metric.into(),
            data,
            assumptions,
        }
    }

    /// Append one approximation entry per label
    pub fn with_approximations(mut self, approximations: &[Approximation]) -> Self {
        self.assumptions
            .extend(approximations.iter().map(Assumption::approximation));
        self
    }

    /// Add a single assumption
    pub fn with_assumption(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.assumptions.push(Assumption::new(key, text));
        self
    }

    /// Whether the data relies on any approximate statistic
    pub fn is_approximate(&self) -> bool {
        self.assumptions.iter().any(|a| a.key == "approximation")
    }

    /// Transform the data, keeping the annotations
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MetricReport<U> {
        MetricReport {
            metric: self.metric,
            data: f(self.data),
            assumptions: self.assumptions,
        }
    }
}
