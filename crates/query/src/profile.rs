//! Backend capability profiles

use serde::{Deserialize, Serialize};

/// What the active backend can compute natively
///
/// Fixed for the lifetime of the process and derived from the configured
/// backend. Expression generation is a pure function of this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityProfile {
    /// Single-file engine: no window functions, no exact percentiles,
    /// no `FILTER` clause, no `FULL OUTER JOIN`
    Reduced,
    /// Full relational engine: `PERCENTILE_CONT`, `FILTER (WHERE ...)`,
    /// `DATE_TRUNC`, `EXTRACT`, `STDDEV_POP`
    Full,
}

impl CapabilityProfile {
    /// Profile name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reduced => "reduced",
            Self::Full => "full",
        }
    }

    /// `PERCENTILE_CONT ... WITHIN GROUP` is available
    pub fn has_exact_percentiles(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// `COUNT(*) FILTER (WHERE ...)` is available
    pub fn has_filter_clause(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// `FULL OUTER JOIN` is available
    pub fn has_full_outer_join(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// A native standard deviation aggregate is available
    pub fn has_native_stddev(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl std::fmt::Display for CapabilityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduced_lacks_advanced_features() {
        let p = CapabilityProfile::Reduced;
        assert!(!p.has_exact_percentiles());
        assert!(!p.has_filter_clause());
        assert!(!p.has_full_outer_join());
        assert!(!p.has_native_stddev());
    }

    #[test]
    fn test_full_has_advanced_features() {
        let p = CapabilityProfile::Full;
        assert!(p.has_exact_percentiles());
        assert!(p.has_filter_clause());
        assert!(p.has_full_outer_join());
        assert!(p.has_native_stddev());
    }

    #[test]
    fn test_display() {
        assert_eq!(CapabilityProfile::Reduced.to_string(), "reduced");
        assert_eq!(CapabilityProfile::Full.to_string(), "full");
    }
}
