//! Core control chart types.
//!
//! Defines the building blocks shared by every chart: the [`ChartLine`]
//! (center line with optional 3-sigma limits) and the [`Violation`] record
//! produced by the run-rule detector.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

use std::fmt;

use serde::{Deserialize, Serialize};

/// Center line and control limits of one chart.
///
/// Limits are `None` when the input is degenerate (e.g. zero variation in
/// an individuals chart); the center line is always reported.
///
/// # Invariants
///
/// - When both limits are present, `lower_limit <= center <= upper_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartLine {
    /// Center line (process mean, average range, p-bar, ...).
    pub center: f64,
    /// Lower control limit.
    pub lower_limit: Option<f64>,
    /// Upper control limit.
    pub upper_limit: Option<f64>,
}

impl ChartLine {
    pub fn new(center: f64, lower_limit: f64, upper_limit: f64) -> Self {
        Self {
            center,
            lower_limit: Some(lower_limit),
            upper_limit: Some(upper_limit),
        }
    }

    /// A center line without limits.
    pub fn center_only(center: f64) -> Self {
        Self {
            center,
            lower_limit: None,
            upper_limit: None,
        }
    }

    /// `true` when both limits are present.
    pub fn has_limits(&self) -> bool {
        self.lower_limit.is_some() && self.upper_limit.is_some()
    }

    /// `true` if `value` lies strictly outside a present limit.
    ///
    /// A point exactly on a limit is in control.
    pub fn is_beyond(&self, value: f64) -> bool {
        self.upper_limit.is_some_and(|u| value > u) || self.lower_limit.is_some_and(|l| value < l)
    }
}

/// Run-rule identifiers (Nelson tests 1–4 as numbered here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleId {
    /// One point beyond 3 sigma.
    R1,
    /// 2 of 3 consecutive points beyond 2 sigma, same side.
    R2,
    /// 4 of 5 consecutive points beyond 1 sigma, same side.
    R3,
    /// 8 consecutive points on one side of the center line.
    R4,
}

impl RuleId {
    /// All rules in evaluation order.
    pub const ALL: [RuleId; 4] = [RuleId::R1, RuleId::R2, RuleId::R3, RuleId::R4];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::R1 => "R1",
            RuleId::R2 => "R2",
            RuleId::R3 => "R3",
            RuleId::R4 => "R4",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the center line a windowed rule fired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Above,
    Below,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Above => "above",
            Side::Below => "below",
        })
    }
}

/// One rule firing at one point.
///
/// Several rows may share a `point_index`; rules and sides are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Which rule fired.
    pub rule: RuleId,
    /// Zero-based index of the point in the series.
    pub point_index: usize,
    /// Value of the series at `point_index`.
    pub value: f64,
    /// Side of the center line, for side-specific rules.
    pub side: Option<Side>,
    /// Human-readable description.
    pub detail: String,
}
