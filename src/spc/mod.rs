//! Statistical Process Control (SPC) charts.
//!
//! Provides control chart computations for both variables and attributes data,
//! and the run-rule detector that scans a chart series for special causes.
//!
//! # Variables Charts
//!
//! - [`individuals_moving_range`] — Individuals and Moving Range chart for individual observations
//! - [`xbar_r`] — X-bar and Range chart for subgroup data (n=2..10)
//!
//! # Attributes Charts
//!
//! - [`attribute_chart`] with [`AttributeKind`] `P`, `Np`, `C`, or `U`
//!
//! # Run Rules
//!
//! - [`NelsonRules`] — Nelson tests R1 to R4, configurable
//! - [`detect`] — all four rules with the default configuration
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts
//! - Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
//!   *Journal of Quality Technology* 16(4), pp. 237-239.

mod attributes;
mod chart;
mod rules;
mod variables;

pub use attributes::{attribute_chart, AttributeChart, AttributeKind, AttributePoint};
pub use chart::{ChartLine, RuleId, Side, Violation};
pub use rules::{detect, z_scores, NelsonRules, RunRule};
pub use variables::{
    individuals_moving_range, moving_range_sigma, moving_ranges, xbar_r, IndividualPoint,
    IndividualsMovingRange, SubgroupPoint, XBarR, XBarRConstants, D2_MOVING_RANGE,
    D4_MOVING_RANGE,
};
