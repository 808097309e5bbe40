//! Error types shared by all engines.
//!
//! Every failure is a rejection: engines either return a complete,
//! internally consistent result or one of these variants. Outcomes that are
//! merely *absent* (missing control limits, missing capability indices) are
//! modeled as `Option` fields on the result records, never as errors.

use thiserror::Error;

/// Errors raised at the engine and adapter boundaries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityError {
    /// Fewer points or rows than the computation requires.
    #[error("insufficient data for {context}: need at least {required}, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    /// Subgroup sizes are inconsistent or outside 2..=10 (X-bar-R).
    #[error("invalid subgroup structure: {reason}")]
    InvalidSubgroupStructure { reason: String },

    /// Every row was dropped by numeric coercion or validity filtering.
    #[error("no valid rows after cleaning {context}")]
    NoValidRowsAfterCleaning { context: String },

    /// Sigma is zero, negative, or non-finite where a dispersion is required.
    #[error("degenerate dispersion in {context}: sigma = {sigma}")]
    DegenerateDispersion { context: String, sigma: f64 },

    /// The ANOVA partition could not be computed.
    #[error("model fit failed: {reason}")]
    ModelFitFailure { reason: String },

    /// Two parallel inputs have different lengths.
    #[error("length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A named column does not exist in the table.
    #[error("column not found: {name}")]
    ColumnNotFound { name: String },

    /// An argument is outside its valid domain.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, QualityError>;

impl QualityError {
    pub(crate) fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context: context.into(),
            required,
            actual,
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn model_fit(reason: impl Into<String>) -> Self {
        Self::ModelFitFailure {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_constraint() {
        let err = QualityError::insufficient("capability of column 'width'", 5, 3);
        assert_eq!(
            err.to_string(),
            "insufficient data for capability of column 'width': need at least 5, got 3"
        );
    }

    #[test]
    fn test_display_subgroup() {
        let err = QualityError::InvalidSubgroupStructure {
            reason: "subgroup size 12 outside 2..=10".into(),
        };
        assert!(err.to_string().contains("outside 2..=10"));
    }
}
