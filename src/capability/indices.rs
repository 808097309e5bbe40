//! Process capability indices (Cp, Cpk, Pp, Ppk, Cpm) and defect rates.
//!
//! Process capability indices quantify how well a process output fits within
//! specification limits. Short-term indices (Cp, Cpk) use within-process
//! variation estimated from the moving range, while long-term indices
//! (Pp, Ppk) use the overall sample standard deviation.
//!
//! Every index is `Option<f64>`: it is present only when its sigma is
//! finite and positive and the specification limits it needs exist.
//!
//! # References
//!
//! - Montgomery (2019), *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 8.
//! - Kane (1986), "Process Capability Indices", *Journal of Quality Technology*
//!   18(1), pp. 41--52.
//! - Chan, Cheng & Spiring (1988), "A New Measure of Process Capability: Cpm",
//!   *Journal of Quality Technology* 20(3), pp. 162--175.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use u_numflow::{special, stats};

use crate::error::{QualityError, Result};
use crate::options::CapabilityOptions;
use crate::spc::moving_range_sigma;

/// Specification limits for a capability study.
///
/// Either limit may be absent. When both are present, `lsl < usl`.
///
/// # Examples
///
/// ```
/// use u_quality::capability::SpecLimits;
///
/// // Two-sided specification: LSL = 9.0, USL = 11.0
/// let spec = SpecLimits::new(Some(9.0), Some(11.0)).unwrap();
/// assert_eq!(spec.target(), Some(10.0));
///
/// // Upper limit only
/// let spec = SpecLimits::new(None, Some(10.0)).unwrap();
/// assert_eq!(spec.target(), None);
///
/// // Error: LSL >= USL
/// assert!(SpecLimits::new(Some(10.0), Some(5.0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecLimits {
    lsl: Option<f64>,
    usl: Option<f64>,
    target: Option<f64>,
}

impl SpecLimits {
    /// Creates a specification from optional lower and upper limits.
    ///
    /// # Errors
    ///
    /// [`QualityError::InvalidArgument`] if a limit is non-finite or
    /// `lsl >= usl`.
    pub fn new(lsl: Option<f64>, usl: Option<f64>) -> Result<Self> {
        for (name, limit) in [("LSL", lsl), ("USL", usl)] {
            if limit.is_some_and(|v| !v.is_finite()) {
                return Err(QualityError::invalid_argument(format!("{name} must be finite")));
            }
        }
        if let (Some(l), Some(u)) = (lsl, usl) {
            if l >= u {
                return Err(QualityError::invalid_argument(format!(
                    "LSL ({l}) must be less than USL ({u})"
                )));
            }
        }
        Ok(Self {
            lsl,
            usl,
            target: None,
        })
    }

    /// Sets an explicit target, used by Cpm.
    ///
    /// # Errors
    ///
    /// [`QualityError::InvalidArgument`] if `target` is non-finite.
    pub fn with_target(mut self, target: f64) -> Result<Self> {
        if !target.is_finite() {
            return Err(QualityError::invalid_argument("target must be finite"));
        }
        self.target = Some(target);
        Ok(self)
    }

    pub fn lsl(&self) -> Option<f64> {
        self.lsl
    }

    pub fn usl(&self) -> Option<f64> {
        self.usl
    }

    /// The explicit target, else the LSL/USL midpoint when both exist.
    pub fn target(&self) -> Option<f64> {
        self.target.or(match (self.lsl, self.usl) {
            (Some(l), Some(u)) => Some((l + u) / 2.0),
            _ => None,
        })
    }

    /// `true` if `x` falls strictly outside a present limit.
    pub fn is_out_of_spec(&self, x: f64) -> bool {
        self.lsl.is_some_and(|l| x < l) || self.usl.is_some_and(|u| x > u)
    }
}

/// Result of a capability study.
///
/// # Index interpretation
///
/// | Index | Value | Interpretation |
/// |-------|-------|----------------|
/// | Cp/Pp | >= 1.33 | Process is capable |
/// | Cpk/Ppk | >= 1.33 | Process is capable and centered |
/// | Cpm | >= 1.33 | Process meets Taguchi loss criterion |
///
/// Reference: Montgomery (2019), Chapter 8, Table 8.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    /// Number of finite observations used.
    pub n: usize,
    pub mean: Option<f64>,
    /// MR-bar / 1.128.
    pub stdev_within: Option<f64>,
    /// Sample standard deviation (n - 1 divisor).
    pub stdev_overall: Option<f64>,
    /// Cp = (USL - LSL) / (6 * sigma_within). Requires both limits.
    pub cp: Option<f64>,
    /// Cpk = min(Cpu, Cpl) over the limits present.
    pub cpk: Option<f64>,
    /// Cpu = (USL - mean) / (3 * sigma_within).
    pub cpu: Option<f64>,
    /// Cpl = (mean - LSL) / (3 * sigma_within).
    pub cpl: Option<f64>,
    /// Pp = (USL - LSL) / (6 * sigma_overall). Requires both limits.
    pub pp: Option<f64>,
    /// Ppk = min(Ppu, Ppl) over the limits present.
    pub ppk: Option<f64>,
    pub ppu: Option<f64>,
    pub ppl: Option<f64>,
    /// Cpm = Cp / sqrt(1 + ((mean - target) / sigma_within)^2).
    /// Requires both limits and a target.
    ///
    /// Reference: Chan, Cheng & Spiring (1988).
    pub cpm: Option<f64>,
    /// Explicit target or the LSL/USL midpoint.
    pub target: Option<f64>,
    /// Points below LSL plus points above USL.
    pub out_of_spec_count: usize,
    pub observed_ppm: Option<f64>,
    /// Normal-model PPM using the overall sigma.
    pub expected_ppm: Option<f64>,
}

impl CapabilityResult {
    /// The decision score: Ppk, else Cpk.
    pub fn score(&self) -> Option<f64> {
        self.ppk.or(self.cpk)
    }

    /// Decision with the default thresholds (1.33 / 1.00).
    pub fn decision(&self) -> CapabilityDecision {
        self.decision_with(&CapabilityOptions::default())
    }

    pub fn decision_with(&self, opts: &CapabilityOptions) -> CapabilityDecision {
        CapabilityDecision::from_score(self.score(), opts)
    }
}

/// Caller-facing capability verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityDecision {
    Capable,
    Borderline,
    NotCapable,
    Indeterminate,
}

impl CapabilityDecision {
    pub fn from_score(score: Option<f64>, opts: &CapabilityOptions) -> Self {
        match score {
            Some(s) if s >= opts.capable_threshold => Self::Capable,
            Some(s) if s >= opts.borderline_threshold => Self::Borderline,
            Some(s) if s.is_finite() => Self::NotCapable,
            _ => Self::Indeterminate,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Capable => "capable",
            Self::Borderline => "borderline",
            Self::NotCapable => "not capable",
            Self::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for CapabilityDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Computes a capability study.
///
/// Non-finite samples are ignored. With no samples every statistic is
/// absent and `n == 0`; this function never fails.
///
/// # Examples
///
/// ```
/// use u_quality::capability::{compute, SpecLimits};
///
/// let spec = SpecLimits::new(Some(9.0), Some(11.0)).unwrap();
/// let data = [9.5, 10.0, 10.2, 9.8, 10.1, 10.3, 9.9, 10.0];
/// let result = compute(&data, &spec);
/// assert!(result.cp.unwrap() > 0.0);
/// assert!(result.ppk.unwrap() > 0.0);
/// assert_eq!(result.out_of_spec_count, 0);
/// ```
pub fn compute(samples: &[f64], spec: &SpecLimits) -> CapabilityResult {
    let data: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    let n = data.len();
    debug!(n, lsl = ?spec.lsl, usl = ?spec.usl, "computing capability");

    let mean = stats::mean(&data);
    let stdev_overall = if n >= 2 { stats::std_dev(&data) } else { None };
    let stdev_within = moving_range_sigma(&data);

    let within = IndexSet::new(spec, mean, stdev_within);
    let overall = IndexSet::new(spec, mean, stdev_overall);

    let target = spec.target();
    // Taguchi Cpm index
    let cpm = match (within.spread, mean, target, stdev_within) {
        (Some(cp), Some(m), Some(t), Some(s)) => {
            let deviation_ratio = (m - t) / s;
            Some(cp / (1.0 + deviation_ratio * deviation_ratio).sqrt())
        }
        _ => None,
    };

    let out_of_spec_count = data.iter().filter(|&&x| spec.is_out_of_spec(x)).count();
    let observed_ppm = (n > 0).then(|| 1e6 * out_of_spec_count as f64 / n as f64);
    let expected_ppm = match (mean, usable(stdev_overall)) {
        (Some(m), Some(s)) => {
            let below = spec.lsl.map_or(0.0, |l| special::standard_normal_cdf((l - m) / s));
            let above = spec.usl.map_or(0.0, |u| 1.0 - special::standard_normal_cdf((u - m) / s));
            Some(1e6 * (below + above))
        }
        _ => None,
    };

    let result = CapabilityResult {
        n,
        mean,
        stdev_within,
        stdev_overall,
        cp: within.spread,
        cpk: within.min_side(),
        cpu: within.upper,
        cpl: within.lower,
        pp: overall.spread,
        ppk: overall.min_side(),
        ppu: overall.upper,
        ppl: overall.lower,
        cpm,
        target,
        out_of_spec_count,
        observed_ppm,
        expected_ppm,
    };
    debug!(cpk = ?result.cpk, ppk = ?result.ppk, out_of_spec_count, "capability computed");
    result
}

fn usable(sigma: Option<f64>) -> Option<f64> {
    sigma.filter(|s| s.is_finite() && *s > 0.0)
}

/// Spread and one-sided indices for one sigma estimate.
struct IndexSet {
    spread: Option<f64>,
    upper: Option<f64>,
    lower: Option<f64>,
}

impl IndexSet {
    fn new(spec: &SpecLimits, mean: Option<f64>, sigma: Option<f64>) -> Self {
        let (Some(m), Some(s)) = (mean, usable(sigma)) else {
            return Self {
                spread: None,
                upper: None,
                lower: None,
            };
        };
        Self {
            spread: match (spec.lsl, spec.usl) {
                (Some(l), Some(u)) => Some((u - l) / (6.0 * s)),
                _ => None,
            },
            upper: spec.usl.map(|u| (u - m) / (3.0 * s)),
            lower: spec.lsl.map(|l| (m - l) / (3.0 * s)),
        }
    }

    fn min_side(&self) -> Option<f64> {
        match (self.upper, self.lower) {
            (Some(u), Some(l)) => Some(u.min(l)),
            (Some(u), None) => Some(u),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn cpk_never_exceeds_cp(
            data in proptest::collection::vec(-50.0_f64..50.0, 2..=60),
            lsl in -100.0_f64..-60.0,
            usl in 60.0_f64..100.0,
        ) {
            let r = compute(&data, &SpecLimits::new(Some(lsl), Some(usl)).unwrap());
            if let (Some(cp), Some(cpk)) = (r.cp, r.cpk) {
                prop_assert!(cpk <= cp + 1e-12);
            }
            if let (Some(pp), Some(ppk)) = (r.pp, r.ppk) {
                prop_assert!(ppk <= pp + 1e-12);
            }
        }

        #[test]
        fn compute_is_idempotent(
            data in proptest::collection::vec(-10.0_f64..10.0, 0..=40),
        ) {
            let spec = SpecLimits::new(Some(-5.0), Some(5.0)).unwrap();
            prop_assert_eq!(compute(&data, &spec), compute(&data, &spec));
        }
    }
}
