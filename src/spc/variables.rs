//! Variables control charts: Individuals-MR and X-bar-R.
//!
//! These charts monitor continuous measurements in time order. The
//! individuals chart handles single observations and estimates sigma from
//! the moving range; the X-bar-R chart handles rational subgroups.
//!
//! # Control Chart Factors
//!
//! A2, D3, D4, and d2 are the tabulated values from ASTM E2587, not derived.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts
//! - Shewhart, W.A. (1931). *Economic Control of Quality of Manufactured Product*.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use u_numflow::stats;

use super::chart::ChartLine;
use crate::error::{QualityError, Result};

// ---------------------------------------------------------------------------
// Control chart factor tables (ASTM E2587), indexed by subgroup size n=2..10
// Index 0 corresponds to n=2.
// ---------------------------------------------------------------------------

/// A2 factors: X-bar limits = X-double-bar +/- A2 * R-bar.
const A2: [f64; 9] = [1.880, 1.023, 0.729, 0.577, 0.483, 0.419, 0.373, 0.337, 0.308];

/// D3 factors: R chart LCL = D3 * R-bar.
const D3: [f64; 9] = [0.0, 0.0, 0.0, 0.0, 0.0, 0.076, 0.136, 0.184, 0.223];

/// D4 factors: R chart UCL = D4 * R-bar.
const D4: [f64; 9] = [3.267, 2.574, 2.282, 2.114, 2.004, 1.924, 1.864, 1.816, 1.777];

/// d2 factors: sigma-hat = R-bar / d2.
const D2: [f64; 9] = [1.128, 1.693, 2.059, 2.326, 2.534, 2.704, 2.847, 2.970, 3.078];

/// d2 for a moving range of two consecutive observations.
pub const D2_MOVING_RANGE: f64 = 1.128;

/// D4 for a moving range of two consecutive observations.
pub const D4_MOVING_RANGE: f64 = 3.267;

/// Tabulated X-bar-R factors for one subgroup size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XBarRConstants {
    pub a2: f64,
    pub d3: f64,
    pub d4: f64,
    pub d2: f64,
}

impl XBarRConstants {
    /// Factors for subgroup size `n`, or `None` outside 2..=10.
    pub fn for_size(n: usize) -> Option<Self> {
        if !(2..=10).contains(&n) {
            return None;
        }
        let idx = n - 2;
        Some(Self {
            a2: A2[idx],
            d3: D3[idx],
            d4: D4[idx],
            d2: D2[idx],
        })
    }
}

// ---------------------------------------------------------------------------
// Individuals-MR
// ---------------------------------------------------------------------------

/// One observation on an individuals chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndividualPoint {
    /// Zero-based position in the cleaned series.
    pub index: usize,
    /// The observation.
    pub value: f64,
    /// |x_i - x_{i-1}|; absent for the first point.
    pub moving_range: Option<f64>,
}

/// Result of an Individuals and Moving Range analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualsMovingRange {
    /// Per-point series in measurement order.
    pub points: Vec<IndividualPoint>,
    /// Individuals chart: center = mean, limits = mean +/- 3 sigma.
    pub x_line: ChartLine,
    /// Moving range chart; absent with fewer than two points.
    pub mr_line: Option<ChartLine>,
    /// Within sigma = MR-bar / 1.128; absent when MR-bar is zero or undefined.
    pub sigma: Option<f64>,
}

impl IndividualsMovingRange {
    /// The observations, in order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Moving ranges |x_i - x_{i-1}| of a series.
///
/// # Errors
///
/// [`QualityError::InsufficientData`] with fewer than two points.
pub fn moving_ranges(samples: &[f64]) -> Result<Vec<f64>> {
    if samples.len() < 2 {
        return Err(QualityError::insufficient("moving range", 2, samples.len()));
    }
    Ok(samples.windows(2).map(|w| (w[1] - w[0]).abs()).collect())
}

/// Within-process sigma estimated as MR-bar / d2 (d2 = 1.128).
///
/// Returns `None` with fewer than two points or when MR-bar is zero or
/// non-finite.
pub fn moving_range_sigma(samples: &[f64]) -> Option<f64> {
    let mr = moving_ranges(samples).ok()?;
    let mr_bar = stats::mean(&mr)?;
    (mr_bar.is_finite() && mr_bar > 0.0).then(|| mr_bar / D2_MOVING_RANGE)
}

/// Individuals and Moving Range (I-MR) chart.
///
/// # Algorithm
///
/// 1. MR_i = |x_i - x_{i-1}| for i >= 1; MR-bar = mean of all MR_i.
/// 2. sigma = MR-bar / 1.128 (undefined when MR-bar is zero).
/// 3. X chart: CL = mean, UCL/LCL = CL +/- 3 sigma (absent if sigma undefined).
/// 4. MR chart: CL = MR-bar, UCL = 3.267 MR-bar, LCL = 0.
///
/// Non-finite samples are removed first; order is preserved.
///
/// # Errors
///
/// - [`QualityError::InsufficientData`] for empty input.
/// - [`QualityError::NoValidRowsAfterCleaning`] if no sample is finite.
///
/// # Examples
///
/// ```
/// use u_quality::spc::individuals_moving_range;
///
/// let imr = individuals_moving_range(&[25.0, 25.2, 24.8, 25.1, 24.9]).unwrap();
/// let ucl = imr.x_line.upper_limit.unwrap();
/// assert!(ucl > imr.x_line.center);
/// assert_eq!(imr.points[0].moving_range, None);
/// ```
///
/// # Reference
///
/// Montgomery, D.C. (2019), Chapter 6: Control Charts for Variables.
pub fn individuals_moving_range(samples: &[f64]) -> Result<IndividualsMovingRange> {
    let observations = clean_series(samples, "individuals chart")?;
    debug!(n = observations.len(), "computing individuals-moving range chart");

    let x_bar = stats::mean(&observations).ok_or_else(|| {
        QualityError::insufficient("individuals chart", 1, observations.len())
    })?;

    let mr_values = moving_ranges(&observations).unwrap_or_default();
    let mr_bar = stats::mean(&mr_values);
    let sigma = mr_bar.filter(|m| m.is_finite() && *m > 0.0).map(|m| m / D2_MOVING_RANGE);

    let x_line = match sigma {
        Some(s) => ChartLine::new(x_bar, x_bar - 3.0 * s, x_bar + 3.0 * s),
        None => {
            if observations.len() >= 2 {
                warn!(x_bar, "zero moving range; individuals limits are undefined");
            }
            ChartLine::center_only(x_bar)
        }
    };
    // LCL is always 0 for a moving range of two
    let mr_line = mr_bar.map(|m| ChartLine::new(m, 0.0, D4_MOVING_RANGE * m));

    let points = observations
        .iter()
        .enumerate()
        .map(|(i, &v)| IndividualPoint {
            index: i,
            value: v,
            moving_range: i.checked_sub(1).map(|j| mr_values[j]),
        })
        .collect();

    debug!(x_bar, ?mr_bar, ?sigma, "individuals chart computed");
    Ok(IndividualsMovingRange {
        points,
        x_line,
        mr_line,
        sigma,
    })
}

// ---------------------------------------------------------------------------
// X-bar-R
// ---------------------------------------------------------------------------

/// Statistics of one subgroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupPoint<K> {
    /// The caller's subgroup key.
    pub key: K,
    /// Number of observations in the subgroup.
    pub size: usize,
    /// Subgroup mean.
    pub mean: f64,
    /// Subgroup range (max - min).
    pub range: f64,
}

/// Result of an X-bar and Range analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XBarR<K> {
    /// Per-subgroup statistics in first-appearance order.
    pub subgroups: Vec<SubgroupPoint<K>>,
    /// X-bar chart: CL = grand mean, limits = CL +/- A2 R-bar.
    pub xbar_line: ChartLine,
    /// R chart: CL = R-bar, LCL = D3 R-bar, UCL = D4 R-bar.
    pub r_line: ChartLine,
    /// Detected subgroup size n.
    pub subgroup_size: usize,
    /// Factors used for `subgroup_size`.
    pub constants: XBarRConstants,
    /// Within sigma = R-bar / d2; absent when R-bar is zero.
    pub sigma_within: Option<f64>,
}

impl<K> XBarR<K> {
    pub fn means(&self) -> Vec<f64> {
        self.subgroups.iter().map(|s| s.mean).collect()
    }

    pub fn ranges(&self) -> Vec<f64> {
        self.subgroups.iter().map(|s| s.range).collect()
    }
}

/// X-bar and Range (X-bar-R) chart.
///
/// `subgroups[i]` is the subgroup key of `samples[i]`. Rows with a
/// non-finite sample are dropped together with their key.
///
/// # Algorithm
///
/// 1. Group observations by key, in first-appearance order.
/// 2. n = most frequent group size (ties resolved to the smallest size).
/// 3. Every group must have exactly n observations, n in 2..=10.
/// 4. X-double-bar = mean of subgroup means, R-bar = mean of ranges.
/// 5. X-bar limits = X-double-bar +/- A2 R-bar; R limits = D3 R-bar, D4 R-bar.
///
/// # Errors
///
/// - [`QualityError::LengthMismatch`] if the two slices differ in length.
/// - [`QualityError::InsufficientData`] / [`QualityError::NoValidRowsAfterCleaning`]
///   when nothing is left to group.
/// - [`QualityError::InvalidSubgroupStructure`] if n is outside 2..=10 or
///   any subgroup size differs from n.
///
/// # Examples
///
/// ```
/// use u_quality::spc::xbar_r;
///
/// let values = [45.0, 47.0, 50.0, 53.0, 55.0, 46.0, 48.0, 50.0, 52.0, 54.0];
/// let keys = [1, 1, 1, 1, 1, 2, 2, 2, 2, 2];
/// let chart = xbar_r(&values, &keys).unwrap();
/// assert_eq!(chart.subgroup_size, 5);
/// assert!((chart.constants.a2 - 0.577).abs() < 1e-12);
/// ```
///
/// # Reference
///
/// Montgomery, D.C. (2019), Chapter 6: Control Charts for Variables.
pub fn xbar_r<K>(samples: &[f64], subgroups: &[K]) -> Result<XBarR<K>>
where
    K: Eq + Hash + Clone,
{
    if samples.len() != subgroups.len() {
        return Err(QualityError::LengthMismatch {
            context: "X-bar-R subgroup assignment".into(),
            expected: samples.len(),
            actual: subgroups.len(),
        });
    }
    if samples.is_empty() {
        return Err(QualityError::insufficient("X-bar-R chart", 2, 0));
    }

    // Group in first-appearance order
    let mut order: Vec<K> = Vec::new();
    let mut members: Vec<Vec<f64>> = Vec::new();
    let mut slot: HashMap<&K, usize> = HashMap::new();
    let mut dropped = 0_usize;
    for (key, &x) in subgroups.iter().zip(samples) {
        if !x.is_finite() {
            dropped += 1;
            continue;
        }
        let idx = *slot.entry(key).or_insert_with(|| {
            order.push(key.clone());
            members.push(Vec::new());
            order.len() - 1
        });
        members[idx].push(x);
    }
    if dropped > 0 {
        warn!(dropped, "dropped non-finite observations before X-bar-R");
    }
    if members.is_empty() {
        return Err(QualityError::NoValidRowsAfterCleaning {
            context: "X-bar-R measurements".into(),
        });
    }

    let n = modal_size(&members);
    let constants = XBarRConstants::for_size(n).ok_or_else(|| {
        QualityError::InvalidSubgroupStructure {
            reason: format!("most frequent subgroup size is {n}; X-bar-R needs 2..=10"),
        }
    })?;
    let inconsistent = members.iter().filter(|g| g.len() != n).count();
    if inconsistent > 0 {
        return Err(QualityError::InvalidSubgroupStructure {
            reason: format!(
                "{inconsistent} of {} subgroups differ from the common size {n}",
                members.len()
            ),
        });
    }
    debug!(groups = members.len(), n, "computing X-bar-R chart");

    let mut points = Vec::with_capacity(members.len());
    for (key, group) in order.into_iter().zip(&members) {
        let mean = stats::mean(group).ok_or_else(|| QualityError::insufficient("subgroup mean", 1, 0))?;
        points.push(SubgroupPoint {
            key,
            size: group.len(),
            mean,
            range: subgroup_range(group),
        });
    }

    let means: Vec<f64> = points.iter().map(|p| p.mean).collect();
    let ranges: Vec<f64> = points.iter().map(|p| p.range).collect();
    let grand_mean = stats::mean(&means).ok_or_else(|| QualityError::insufficient("X-bar-R chart", 1, 0))?;
    let r_bar = stats::mean(&ranges).ok_or_else(|| QualityError::insufficient("X-bar-R chart", 1, 0))?;

    let xbar_line = ChartLine::new(
        grand_mean,
        grand_mean - constants.a2 * r_bar,
        grand_mean + constants.a2 * r_bar,
    );
    let r_line = ChartLine::new(r_bar, constants.d3 * r_bar, constants.d4 * r_bar);
    let sigma_within = (r_bar > 0.0).then(|| r_bar / constants.d2);

    debug!(grand_mean, r_bar, "X-bar-R chart computed");
    Ok(XBarR {
        subgroups: points,
        xbar_line,
        r_line,
        subgroup_size: n,
        constants,
        sigma_within,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drop non-finite values, distinguishing empty input from fully-invalid input.
fn clean_series(samples: &[f64], context: &str) -> Result<Vec<f64>> {
    if samples.is_empty() {
        return Err(QualityError::insufficient(context, 1, 0));
    }
    let cleaned: Vec<f64> = samples.iter().copied().filter(|x| x.is_finite()).collect();
    if cleaned.is_empty() {
        return Err(QualityError::NoValidRowsAfterCleaning {
            context: context.to_string(),
        });
    }
    if cleaned.len() < samples.len() {
        warn!(
            dropped = samples.len() - cleaned.len(),
            context, "dropped non-finite observations"
        );
    }
    Ok(cleaned)
}

/// Most frequent group cardinality; ties go to the smallest size.
fn modal_size(groups: &[Vec<f64>]) -> usize {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for g in groups {
        *freq.entry(g.len()).or_default() += 1;
    }
    freq.into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map_or(0, |(size, _)| size)
}

/// Range (max - min) of a non-empty subgroup of finite values.
fn subgroup_range(subgroup: &[f64]) -> f64 {
    let max = subgroup.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = subgroup.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
