//! Dialect capability layer
//!
//! Translates the primitive operations every metric is composed from into
//! expression text for the active [`CapabilityProfile`]. Output depends only
//! on the profile and the operand names, so the same call always yields the
//! same string.
//!
//! | Primitive | Reduced (SQLite) | Full (PostgreSQL) |
//! |---|---|---|
//! | duration | `julianday` difference | `EXTRACT(EPOCH ...)` |
//! | hour bucket | `strftime('%Y-%m-%d %H:00:00')` | `DATE_TRUNC('hour')` |
//! | median / percentile | arithmetic mean (labelled) | `PERCENTILE_CONT` |
//! | conditional count | `SUM(CASE ...)` | `COUNT(*) FILTER (WHERE ...)` |
//! | standard deviation | clamped `sqrt(E[X²] - E[X]²)` | `STDDEV_POP` |
//! | nulls-last order | leading `alias IS NULL` key | `NULLS LAST` |
//!
//! Operands are column names (optionally alias-qualified). Anything else is
//! rejected with [`AnalyticsError::InvalidOperand`] before text is produced.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use taxi_query::{CapabilityProfile, Placeholder};

use crate::error::{AnalyticsError, Result};

static OPERAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("operand pattern is a valid regex")
});

/// Check that `name` is a plain or alias-qualified identifier
pub fn validate_operand(name: &str) -> Result<&str> {
    if OPERAND.is_match(name) {
        Ok(name)
    } else {
        Err(AnalyticsError::InvalidOperand(name.to_string()))
    }
}

/// A statistic computed by a documented substitute instead of exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approximation {
    /// Primitive that was approximated (`median`, `percentile(0.75)`)
    pub primitive: String,
    /// Operand it was applied to
    pub operand: String,
    /// Substitute method
    pub method: &'static str,
}

impl Approximation {
    /// Human-readable label
    pub fn describe(&self) -> String {
        format!(
            "{} of {} approximated by {}",
            self.primitive, self.operand, self.method
        )
    }
}

impl fmt::Display for Approximation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// An expression fragment, possibly carrying an approximation label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    sql: String,
    approximation: Option<Approximation>,
}

impl Fragment {
    fn exact(sql: String) -> Self {
        Self {
            sql,
            approximation: None,
        }
    }

    fn approximate(sql: String, approximation: Approximation) -> Self {
        Self {
            sql,
            approximation: Some(approximation),
        }
    }

    /// Expression text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Approximation label, if this is not the exact statistic
    pub fn approximation(&self) -> Option<&Approximation> {
        self.approximation.as_ref()
    }

    /// Whether this fragment computes the exact statistic
    pub fn is_exact(&self) -> bool {
        self.approximation.is_none()
    }

    /// Split into text and label
    pub fn into_parts(self) -> (String, Option<Approximation>) {
        (self.sql, self.approximation)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Row predicate for conditional aggregates
///
/// Built only from validated operands and bound placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `operand < bound`
    LessThan { operand: String, bound: Placeholder },
    /// `operand >= bound`
    AtLeast { operand: String, bound: Placeholder },
    /// `operand > baseline * (1 + margin)`
    ExceedsMargin {
        operand: String,
        baseline: String,
        margin: Placeholder,
    },
}

impl Predicate {
    /// `operand < bound`
    pub fn less_than(operand: &str, bound: Placeholder) -> Result<Self> {
        Ok(Self::LessThan {
            operand: validate_operand(operand)?.to_string(),
            bound,
        })
    }

    /// `operand >= bound`
    pub fn at_least(operand: &str, bound: Placeholder) -> Result<Self> {
        Ok(Self::AtLeast {
            operand: validate_operand(operand)?.to_string(),
            bound,
        })
    }

    /// `operand > baseline * (1 + margin)`
    pub fn exceeds_margin(operand: &str, baseline: &str, margin: Placeholder) -> Result<Self> {
        Ok(Self::ExceedsMargin {
            operand: validate_operand(operand)?.to_string(),
            baseline: validate_operand(baseline)?.to_string(),
            margin,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessThan { operand, bound } => write!(f, "{} < {}", operand, bound),
            Self::AtLeast { operand, bound } => write!(f, "{} >= {}", operand, bound),
            Self::ExceedsMargin {
                operand,
                baseline,
                margin,
            } => write!(f, "{} > {} * (1 + {})", operand, baseline, margin),
        }
    }
}

/// Expression generator for one capability profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    profile: CapabilityProfile,
}

impl Dialect {
    /// Create a dialect for a profile
    pub const fn new(profile: CapabilityProfile) -> Self {
        Self { profile }
    }

    /// Active profile
    pub fn profile(&self) -> CapabilityProfile {
        self.profile
    }

    /// Minutes between two timestamps, as a real with sub-minute precision
    pub fn duration_minutes(&self, pickup: &str, dropoff: &str) -> Result<Fragment> {
        let pickup = validate_operand(pickup)?;
        let dropoff = validate_operand(dropoff)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => format!(
                "((julianday({}) - julianday({})) * 1440.0)",
                dropoff, pickup
            ),
            CapabilityProfile::Full => format!(
                "(CAST(EXTRACT(EPOCH FROM ({} - {})) AS DOUBLE PRECISION) / 60.0)",
                dropoff, pickup
            ),
        };
        Ok(Fragment::exact(sql))
    }

    /// Hours between the earliest and latest value of a timestamp column
    ///
    /// Aggregate: only valid in a grouped select.
    pub fn span_hours(&self, column: &str) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => format!(
                "((julianday(MAX({c})) - julianday(MIN({c}))) * 24.0)",
                c = column
            ),
            CapabilityProfile::Full => format!(
                "(CAST(EXTRACT(EPOCH FROM (MAX({c}) - MIN({c}))) AS DOUBLE PRECISION) / 3600.0)",
                c = column
            ),
        };
        Ok(Fragment::exact(sql))
    }

    /// Timestamp truncated to the start of its hour
    pub fn hour_bucket(&self, column: &str) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => format!("strftime('%Y-%m-%d %H:00:00', {})", column),
            CapabilityProfile::Full => format!("DATE_TRUNC('hour', {})", column),
        };
        Ok(Fragment::exact(sql))
    }

    /// Hour of day, integer 0-23
    pub fn hour_of_day(&self, column: &str) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => format!("CAST(strftime('%H', {}) AS INTEGER)", column),
            CapabilityProfile::Full => format!("CAST(EXTRACT(HOUR FROM {}) AS INTEGER)", column),
        };
        Ok(Fragment::exact(sql))
    }

    /// Day of week, integer 0-6 with 0 = Sunday
    pub fn day_of_week(&self, column: &str) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => format!("CAST(strftime('%w', {}) AS INTEGER)", column),
            CapabilityProfile::Full => format!("CAST(EXTRACT(DOW FROM {}) AS INTEGER)", column),
        };
        Ok(Fragment::exact(sql))
    }

    /// Calendar date as `YYYY-MM-DD` text
    pub fn date(&self, column: &str) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => format!("date({})", column),
            CapabilityProfile::Full => format!("TO_CHAR({}, 'YYYY-MM-DD')", column),
        };
        Ok(Fragment::exact(sql))
    }

    /// 50th percentile of a column within the current grouping
    ///
    /// Per-partition medians come from grouping by the partition key.
    pub fn median(&self, column: &str) -> Result<Fragment> {
        self.percentile_labelled(column, 0.5, "median".to_string())
    }

    /// Continuous percentile `p` in `[0, 1]` within the current grouping
    pub fn percentile(&self, column: &str, p: f64) -> Result<Fragment> {
        self.percentile_labelled(column, p, format!("percentile({})", p))
    }

    fn percentile_labelled(&self, column: &str, p: f64, label: String) -> Result<Fragment> {
        let column = validate_operand(column)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(AnalyticsError::InvalidOperand(format!(
                "percentile {} outside [0, 1]",
                p
            )));
        }

        match self.profile {
            CapabilityProfile::Full => Ok(Fragment::exact(format!(
                "PERCENTILE_CONT({}) WITHIN GROUP (ORDER BY {})",
                p, column
            ))),
            CapabilityProfile::Reduced => Ok(Fragment::approximate(
                format!("AVG({})", column),
                Approximation {
                    primitive: label,
                    operand: column.to_string(),
                    method: "arithmetic mean",
                },
            )),
        }
    }

    /// Number of rows in the current grouping satisfying `predicate`
    pub fn conditional_count(&self, predicate: &Predicate) -> Fragment {
        let sql = match self.profile {
            CapabilityProfile::Reduced => {
                format!("SUM(CASE WHEN {} THEN 1 ELSE 0 END)", predicate)
            }
            CapabilityProfile::Full => format!("COUNT(*) FILTER (WHERE {})", predicate),
        };
        Fragment::exact(sql)
    }

    /// Sum of `column` over rows satisfying `predicate` (0 when none match)
    pub fn conditional_sum(&self, column: &str, predicate: &Predicate) -> Result<Fragment> {
        let column = validate_operand(column)?;
        Ok(Fragment::exact(format!(
            "SUM(CASE WHEN {} THEN {} ELSE 0 END)",
            predicate, column
        )))
    }

    /// Mean of `column` over rows satisfying `predicate` (NULL when none match)
    pub fn conditional_mean(&self, column: &str, predicate: &Predicate) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            CapabilityProfile::Reduced => {
                format!("AVG(CASE WHEN {} THEN {} END)", predicate, column)
            }
            CapabilityProfile::Full => format!("AVG({}) FILTER (WHERE {})", column, predicate),
        };
        Ok(Fragment::exact(sql))
    }

    /// Population standard deviation within the current grouping
    pub fn standard_deviation(&self, column: &str) -> Result<Fragment> {
        let column = validate_operand(column)?;
        let sql = match self.profile {
            // Rounding can push the variance slightly below zero
            CapabilityProfile::Reduced => format!(
                "SQRT(MAX(AVG({c} * {c}) - AVG({c}) * AVG({c}), 0.0))",
                c = column
            ),
            CapabilityProfile::Full => format!("STDDEV_POP({})", column),
        };
        Ok(Fragment::exact(sql))
    }

    /// Cast an expression to the profile's double type
    pub fn real(&self, expr: impl fmt::Display) -> String {
        match self.profile {
            CapabilityProfile::Reduced => format!("CAST({} AS REAL)", expr),
            CapabilityProfile::Full => format!("CAST({} AS DOUBLE PRECISION)", expr),
        }
    }

    /// `numerator / denominator`, NULL when the denominator is zero
    pub fn ratio(&self, numerator: impl fmt::Display, denominator: impl fmt::Display) -> String {
        format!("{} / NULLIF({}, 0)", self.real(numerator), denominator)
    }

    /// `ORDER BY` keys placing NULLs after every value of an output column
    ///
    /// PostgreSQL resolves output aliases only as bare sort keys, so the full
    /// profile uses `NULLS LAST`. SQLite sorts NULL first ascending and last
    /// descending, so the reduced profile leads with an `IS NULL` key.
    pub fn nulls_last(&self, alias: &str, descending: bool) -> Vec<String> {
        let direction = if descending { "DESC" } else { "ASC" };
        match self.profile {
            CapabilityProfile::Reduced => vec![
                format!("{} IS NULL", alias),
                format!("{} {}", alias, direction),
            ],
            CapabilityProfile::Full => vec![format!("{} {} NULLS LAST", alias, direction)],
        }
    }
}
