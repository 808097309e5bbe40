//! Analysis configuration.
//!
//! All option structs deserialize with `#[serde(default)]`, so a partial
//! JSON document only overrides the fields it names.
//!
//! # Examples
//!
//! ```
//! use u_quality::options::AnalysisOptions;
//!
//! let opts = AnalysisOptions::from_json_str(r#"{ "capability": { "min_points": 10 } }"#).unwrap();
//! assert_eq!(opts.capability.min_points, 10);
//! assert_eq!(opts.gage.min_repeats, 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{QualityError, Result};
use crate::msa::InteractionTerm;

/// Complete configuration for the table adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisOptions {
    /// Column classification and coercion thresholds.
    pub coercion: CoercionOptions,
    /// Capability study thresholds.
    pub capability: CapabilityOptions,
    /// Gage R&R requirements and acceptance thresholds.
    pub gage: GageRrOptions,
}

impl AnalysisOptions {
    /// Parse options from JSON and validate them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| QualityError::invalid_argument(format!("options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check every nested option struct.
    pub fn validate(&self) -> Result<()> {
        self.coercion.validate()?;
        self.capability.validate()?;
        self.gage.validate()
    }

    pub fn with_coercion(mut self, coercion: CoercionOptions) -> Self {
        self.coercion = coercion;
        self
    }

    pub fn with_capability(mut self, capability: CapabilityOptions) -> Self {
        self.capability = capability;
        self
    }

    pub fn with_gage(mut self, gage: GageRrOptions) -> Self {
        self.gage = gage;
        self
    }
}

/// Thresholds used when classifying raw columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoercionOptions {
    /// Minimum fraction of cells that must coerce to a number (default: 0.8).
    pub min_valid_fraction: f64,
    /// Minimum number of cells that must coerce to a number (default: 3).
    pub min_valid_count: usize,
    /// Maximum distinct values for a category-like column (default: 75).
    pub max_categories: usize,
    /// Fraction of valid values that must be > 0 for a size column (default: 0.95).
    pub positive_fraction: f64,
}

impl Default for CoercionOptions {
    fn default() -> Self {
        Self {
            min_valid_fraction: 0.8,
            min_valid_count: 3,
            max_categories: 75,
            positive_fraction: 0.95,
        }
    }
}

impl CoercionOptions {
    /// Lenient settings for sparse exploratory tables.
    pub fn lenient() -> Self {
        Self {
            min_valid_fraction: 0.5,
            min_valid_count: 2,
            max_categories: 500,
            ..Default::default()
        }
    }

    pub fn with_min_valid_fraction(mut self, fraction: f64) -> Self {
        self.min_valid_fraction = fraction;
        self
    }

    pub fn with_min_valid_count(mut self, count: usize) -> Self {
        self.min_valid_count = count;
        self
    }

    pub fn with_max_categories(mut self, max: usize) -> Self {
        self.max_categories = max;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("min_valid_fraction", self.min_valid_fraction),
            ("positive_fraction", self.positive_fraction),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(QualityError::invalid_argument(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Capability study requirements and decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityOptions {
    /// Minimum finite observations for a capability study (default: 5).
    pub min_points: usize,
    /// Score at or above which the process is "capable" (default: 1.33).
    pub capable_threshold: f64,
    /// Score at or above which the process is "borderline" (default: 1.00).
    pub borderline_threshold: f64,
}

impl Default for CapabilityOptions {
    fn default() -> Self {
        Self {
            min_points: 5,
            capable_threshold: 1.33,
            borderline_threshold: 1.00,
        }
    }
}

impl CapabilityOptions {
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    pub fn with_thresholds(mut self, capable: f64, borderline: f64) -> Self {
        self.capable_threshold = capable;
        self.borderline_threshold = borderline;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.borderline_threshold.is_finite() && self.capable_threshold.is_finite())
            || self.borderline_threshold > self.capable_threshold
        {
            return Err(QualityError::invalid_argument(format!(
                "capability thresholds must be finite with borderline <= capable, got {} and {}",
                self.borderline_threshold, self.capable_threshold
            )));
        }
        Ok(())
    }
}

/// Gage R&R requirements and %GRR acceptance thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GageRrOptions {
    /// Minimum measurement rows after cleaning (default: 6).
    pub min_rows: usize,
    /// Minimum repeats in every part x operator cell (default: 2).
    pub min_repeats: usize,
    /// How the part x operator interaction is reported.
    pub interaction: InteractionTerm,
    /// %GRR at or below which the gage is acceptable (default: 10).
    pub acceptable_pct: f64,
    /// %GRR at or below which the gage is marginal (default: 30).
    pub marginal_pct: f64,
}

impl Default for GageRrOptions {
    fn default() -> Self {
        Self {
            min_rows: 6,
            min_repeats: 2,
            interaction: InteractionTerm::FoldedIntoReproducibility,
            acceptable_pct: 10.0,
            marginal_pct: 30.0,
        }
    }
}

impl GageRrOptions {
    pub fn with_interaction(mut self, interaction: InteractionTerm) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn with_thresholds(mut self, acceptable_pct: f64, marginal_pct: f64) -> Self {
        self.acceptable_pct = acceptable_pct;
        self.marginal_pct = marginal_pct;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_repeats < 2 {
            return Err(QualityError::invalid_argument(format!(
                "min_repeats must be >= 2, got {}",
                self.min_repeats
            )));
        }
        if !(self.acceptable_pct.is_finite() && self.marginal_pct.is_finite())
            || self.acceptable_pct > self.marginal_pct
        {
            return Err(QualityError::invalid_argument(format!(
                "%GRR thresholds must be finite with acceptable <= marginal, got {} and {}",
                self.acceptable_pct, self.marginal_pct
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = AnalysisOptions::default();
        assert!((opts.coercion.min_valid_fraction - 0.8).abs() < f64::EPSILON);
        assert_eq!(opts.coercion.min_valid_count, 3);
        assert_eq!(opts.capability.min_points, 5);
        assert_eq!(opts.gage.min_rows, 6);
        assert_eq!(opts.gage.interaction, InteractionTerm::FoldedIntoReproducibility);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let opts = AnalysisOptions::from_json_str(
            r#"{ "gage": { "interaction": "separate", "marginal_pct": 25.0 } }"#,
        )
        .unwrap();
        assert_eq!(opts.gage.interaction, InteractionTerm::Separate);
        assert!((opts.gage.marginal_pct - 25.0).abs() < f64::EPSILON);
        assert!((opts.gage.acceptable_pct - 10.0).abs() < f64::EPSILON);
        assert_eq!(opts.capability, CapabilityOptions::default());
    }

    #[test]
    fn unknown_field_rejected() {
        let err = AnalysisOptions::from_json_str(r#"{ "capabilty": {} }"#).unwrap_err();
        assert!(matches!(err, QualityError::InvalidArgument { .. }));
    }

    #[test]
    fn out_of_order_thresholds_rejected() {
        let json = r#"{ "capability": { "capable_threshold": 1.0, "borderline_threshold": 1.33 } }"#;
        assert!(AnalysisOptions::from_json_str(json).is_err());

        let opts = AnalysisOptions::default()
            .with_coercion(CoercionOptions::default().with_min_valid_fraction(1.5));
        assert!(opts.validate().is_err());
    }

    #[test]
    fn json_round_trip() {
        let opts = AnalysisOptions::default().with_gage(
            GageRrOptions::default()
                .with_interaction(InteractionTerm::Separate)
                .with_thresholds(5.0, 20.0),
        );
        let json = serde_json::to_string(&opts).unwrap();
        let back = AnalysisOptions::from_json_str(&json).unwrap();
        assert_eq!(opts, back);
    }
}
