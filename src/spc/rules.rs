//! Run rules for detecting non-random patterns in control charts.
//!
//! Implements Nelson tests 1 through 4 as zone tests on standardized
//! scores `z_i = (x_i - center) / sigma`:
//!
//! | Rule | Window | Condition |
//! |------|--------|-----------|
//! | R1   | 1      | \|z\| > 3 |
//! | R2   | 3      | at least 2 with z > 2, or at least 2 with z < -2 |
//! | R3   | 5      | at least 4 with z > 1, or at least 4 with z < -1 |
//! | R4   | 8      | all strictly above, or all strictly below, the center |
//!
//! Windows slide one point at a time and end at the flagged index. A window
//! that fires does not reset the scan, and sides are evaluated independently.
//!
//! # References
//!
//! - Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
//!   *Journal of Quality Technology* 16(4), pp. 237-239.
//! - Western Electric (1956). *Statistical Quality Control Handbook*.
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::chart::{RuleId, Side, Violation};
use crate::error::{QualityError, Result};

/// Trait for applying run rules to a chart series.
///
/// Run rules detect non-random patterns that indicate special causes of
/// variation even when individual points remain within control limits.
pub trait RunRule {
    /// Check a series against this rule set.
    ///
    /// A single point may appear multiple times if it triggers multiple
    /// rules or both sides of one rule.
    fn check(&self, series: &[f64], center: f64, sigma: Option<f64>) -> Vec<Violation>;
}

/// Nelson rules R1 to R4 with a configurable enabled set.
///
/// # Examples
///
/// ```
/// use u_quality::spc::{NelsonRules, RuleId, RunRule};
///
/// let rules = NelsonRules::only([RuleId::R1]);
/// let v = rules.check(&[0.0, 0.0, 0.0, 3.5, 0.0], 0.0, Some(1.0));
/// assert_eq!(v.len(), 1);
/// assert_eq!(v[0].point_index, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NelsonRules {
    enabled: Vec<RuleId>,
}

impl Default for NelsonRules {
    fn default() -> Self {
        Self {
            enabled: RuleId::ALL.to_vec(),
        }
    }
}

impl NelsonRules {
    /// Enable only the given rules.
    pub fn only(rules: impl IntoIterator<Item = RuleId>) -> Self {
        let mut enabled: Vec<RuleId> = rules.into_iter().collect();
        enabled.sort();
        enabled.dedup();
        Self { enabled }
    }

    pub fn enabled(&self) -> &[RuleId] {
        &self.enabled
    }

    pub fn is_enabled(&self, rule: RuleId) -> bool {
        self.enabled.contains(&rule)
    }
}

impl RunRule for NelsonRules {
    /// Apply the enabled rules.
    ///
    /// Returns an empty list when `sigma` is absent, non-finite, or not
    /// positive. Output is ordered by point index, then rule, then side.
    fn check(&self, series: &[f64], center: f64, sigma: Option<f64>) -> Vec<Violation> {
        let Some(z) = sigma.and_then(|s| z_scores(series, center, s).ok()) else {
            warn!(?sigma, "run rules skipped: no usable dispersion");
            return Vec::new();
        };

        let mut results = Vec::new();
        for rule in &self.enabled {
            match rule {
                RuleId::R1 => check_rule1(series, &z, &mut results),
                RuleId::R2 => check_zone_window(series, &z, RuleId::R2, 3, 2, 2.0, &mut results),
                RuleId::R3 => check_zone_window(series, &z, RuleId::R3, 5, 4, 1.0, &mut results),
                RuleId::R4 => check_rule4(series, &z, &mut results),
            }
        }
        results.sort_by_key(|v| (v.point_index, v.rule, v.side));
        debug!(points = series.len(), violations = results.len(), "run rules evaluated");
        results
    }
}

/// Apply all four rules. Shortcut for `NelsonRules::default().check(..)`.
pub fn detect(series: &[f64], center: f64, sigma: Option<f64>) -> Vec<Violation> {
    NelsonRules::default().check(series, center, sigma)
}

/// Standardized scores `(x - center) / sigma`.
///
/// # Errors
///
/// - [`QualityError::DegenerateDispersion`] if `sigma` is not finite and positive.
/// - [`QualityError::InvalidArgument`] if `center` is not finite.
pub fn z_scores(series: &[f64], center: f64, sigma: f64) -> Result<Vec<f64>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(QualityError::DegenerateDispersion {
            context: "run-rule z-scores".into(),
            sigma,
        });
    }
    if !center.is_finite() {
        return Err(QualityError::invalid_argument(format!(
            "center line must be finite, got {center}"
        )));
    }
    Ok(series.iter().map(|x| (x - center) / sigma).collect())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn violation(rule: RuleId, index: usize, value: f64, side: Side, detail: String) -> Violation {
    Violation {
        rule,
        point_index: index,
        value,
        side: Some(side),
        detail,
    }
}

/// R1: a single point beyond 3 sigma.
fn check_rule1(series: &[f64], z: &[f64], out: &mut Vec<Violation>) {
    for (i, &zi) in z.iter().enumerate() {
        if zi.abs() > 3.0 {
            let side = if zi > 0.0 { Side::Above } else { Side::Below };
            out.push(violation(
                RuleId::R1,
                i,
                series[i],
                side,
                format!("point beyond 3 sigma (z = {zi:.3})"),
            ));
        }
    }
}

/// R2 and R3: at least `hits` of the last `window` points beyond `limit`
/// sigma on one side.
fn check_zone_window(
    series: &[f64],
    z: &[f64],
    rule: RuleId,
    window: usize,
    hits: usize,
    limit: f64,
    out: &mut Vec<Violation>,
) {
    if z.len() < window {
        return;
    }
    for end in window - 1..z.len() {
        let w = &z[end + 1 - window..=end];
        let above = w.iter().filter(|&&v| v > limit).count();
        let below = w.iter().filter(|&&v| v < -limit).count();
        if above >= hits {
            out.push(violation(
                rule,
                end,
                series[end],
                Side::Above,
                format!("{above} of {window} points above +{limit} sigma"),
            ));
        }
        if below >= hits {
            out.push(violation(
                rule,
                end,
                series[end],
                Side::Below,
                format!("{below} of {window} points below -{limit} sigma"),
            ));
        }
    }
}

/// R4: 8 consecutive points strictly on one side of the center line.
///
/// Points exactly on the center break the run.
fn check_rule4(series: &[f64], z: &[f64], out: &mut Vec<Violation>) {
    const RUN: usize = 8;
    if z.len() < RUN {
        return;
    }
    for end in RUN - 1..z.len() {
        let w = &z[end + 1 - RUN..=end];
        let side = if w.iter().all(|&v| v > 0.0) {
            Side::Above
        } else if w.iter().all(|&v| v < 0.0) {
            Side::Below
        } else {
            continue;
        };
        out.push(violation(
            RuleId::R4,
            end,
            series[end],
            side,
            format!("{} consecutive points {side} center", RUN),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(v: &[Violation], rule: RuleId) -> Vec<usize> {
        v.iter().filter(|x| x.rule == rule).map(|x| x.point_index).collect()
    }

    // --- R1: beyond 3 sigma ---

    #[test]
    fn test_rule1_single_outlier() {
        let v = detect(&[0.0, 0.0, 0.0, 3.5, 0.0], 0.0, Some(1.0));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].rule, RuleId::R1);
        assert_eq!(v[0].point_index, 3);
        assert_eq!(v[0].side, Some(Side::Above));
        assert!((v[0].value - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rule1_on_limit_is_not_violation() {
        let v = detect(&[25.0, 28.0, 22.0], 25.0, Some(1.0));
        assert!(indices(&v, RuleId::R1).is_empty());
    }

    #[test]
    fn test_rule1_below() {
        let v = detect(&[25.0, 19.0, 25.0], 25.0, Some(1.0));
        assert_eq!(indices(&v, RuleId::R1), vec![1]);
        assert_eq!(v[0].side, Some(Side::Below));
    }

    // --- R2: 2 of 3 beyond 2 sigma ---

    #[test]
    fn test_rule2_two_of_three_above() {
        let v = NelsonRules::only([RuleId::R2]).check(&[2.5, 0.0, 2.5], 0.0, Some(1.0));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].point_index, 2);
        assert_eq!(v[0].side, Some(Side::Above));
    }

    #[test]
    fn test_rule2_mixed_sides_does_not_fire() {
        let v = NelsonRules::only([RuleId::R2]).check(&[2.5, 0.0, -2.5], 0.0, Some(1.0));
        assert!(v.is_empty());
    }

    #[test]
    fn test_rule2_slides_without_restart() {
        // windows ending at 2 and 3 both contain two points above 2 sigma
        let v = NelsonRules::only([RuleId::R2]).check(&[2.5, 2.5, 2.5, 0.0], 0.0, Some(1.0));
        assert_eq!(indices(&v, RuleId::R2), vec![2, 3]);
    }

    // --- R3: 4 of 5 beyond 1 sigma ---

    #[test]
    fn test_rule3_four_of_five_below() {
        let v = NelsonRules::only([RuleId::R3]).check(&[-1.5, -1.5, 0.0, -1.5, -1.5], 0.0, Some(1.0));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].point_index, 4);
        assert_eq!(v[0].side, Some(Side::Below));
    }

    #[test]
    fn test_rule3_three_of_five_not_enough() {
        let v = NelsonRules::only([RuleId::R3]).check(&[1.5, 1.5, 0.0, 0.0, 1.5], 0.0, Some(1.0));
        assert!(v.is_empty());
    }

    // --- R4: 8 on one side ---

    #[test]
    fn test_rule4_seven_not_enough() {
        let v = detect(&[0.5; 7], 0.0, Some(1.0));
        assert!(indices(&v, RuleId::R4).is_empty());
    }

    #[test]
    fn test_rule4_eight_fires_once_at_index_7() {
        let v = detect(&[0.5; 8], 0.0, Some(1.0));
        assert_eq!(indices(&v, RuleId::R4), vec![7]);
    }

    #[test]
    fn test_rule4_continuation() {
        let v = detect(&[-0.5; 10], 0.0, Some(1.0));
        assert_eq!(indices(&v, RuleId::R4), vec![7, 8, 9]);
        assert!(v.iter().all(|x| x.side == Some(Side::Below)));
    }

    #[test]
    fn test_rule4_point_on_center_breaks_run() {
        let mut series = vec![0.5; 9];
        series[4] = 0.0;
        let v = detect(&series, 0.0, Some(1.0));
        assert!(indices(&v, RuleId::R4).is_empty());
    }

    // --- Combined ---

    #[test]
    fn test_multiple_rules_same_index_not_merged() {
        // index 2: R1 (z = 4) and R2 (2 of 3 above 2 sigma)
        let v = detect(&[2.5, 0.0, 4.0], 0.0, Some(1.0));
        let at2: Vec<RuleId> = v.iter().filter(|x| x.point_index == 2).map(|x| x.rule).collect();
        assert_eq!(at2, vec![RuleId::R1, RuleId::R2]);
    }

    #[test]
    fn test_both_sides_fire_independently() {
        let v = NelsonRules::only([RuleId::R2]).check(&[2.5, 2.5, -2.5, -2.5], 0.0, Some(1.0));
        let sides: Vec<(usize, Option<Side>)> = v.iter().map(|x| (x.point_index, x.side)).collect();
        assert_eq!(
            sides,
            vec![(2, Some(Side::Above)), (3, Some(Side::Below))]
        );
    }

    #[test]
    fn test_ordering_index_then_rule_then_side() {
        let series = [3.5, 3.5, 3.5, 3.5, 3.5, 3.5, 3.5, 3.5];
        let v = detect(&series, 0.0, Some(1.0));
        let keys: Vec<(usize, RuleId)> = v.iter().map(|x| (x.point_index, x.rule)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.last(), Some(&(7, RuleId::R4)));
    }

    #[test]
    fn test_degenerate_sigma_returns_empty() {
        let series = [0.0, 10.0, -10.0];
        assert!(detect(&series, 0.0, None).is_empty());
        assert!(detect(&series, 0.0, Some(0.0)).is_empty());
        assert!(detect(&series, 0.0, Some(-1.0)).is_empty());
        assert!(detect(&series, 0.0, Some(f64::NAN)).is_empty());
    }

    #[test]
    fn test_z_scores_rejects_degenerate_sigma() {
        assert!(matches!(
            z_scores(&[1.0], 0.0, 0.0),
            Err(QualityError::DegenerateDispersion { .. })
        ));
        let z = z_scores(&[12.0, 8.0], 10.0, 2.0).unwrap();
        assert_eq!(z, vec![1.0, -1.0]);
    }

    #[test]
    fn test_no_violations_in_quiet_data() {
        let v = detect(&[25.5, 24.8, 25.2, 24.9, 25.1], 25.0, Some(1.0));
        assert!(v.is_empty());
    }

    #[test]
    fn test_only_dedups_rules() {
        let rules = NelsonRules::only([RuleId::R3, RuleId::R1, RuleId::R3]);
        assert_eq!(rules.enabled(), &[RuleId::R1, RuleId::R3]);
        assert!(!rules.is_enabled(RuleId::R4));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn violations_index_into_series(
            series in proptest::collection::vec(-5.0_f64..5.0, 0..=60),
            sigma in 0.1_f64..3.0,
        ) {
            let v = detect(&series, 0.0, Some(sigma));
            for x in &v {
                prop_assert!(x.point_index < series.len());
                prop_assert!((x.value - series[x.point_index]).abs() < f64::EPSILON);
            }
        }

        #[test]
        fn detect_is_idempotent(
            series in proptest::collection::vec(-5.0_f64..5.0, 0..=40),
        ) {
            prop_assert_eq!(detect(&series, 0.0, Some(1.0)), detect(&series, 0.0, Some(1.0)));
        }

        #[test]
        fn rule1_matches_z_threshold(
            series in proptest::collection::vec(-6.0_f64..6.0, 1..=40),
        ) {
            let v = NelsonRules::only([RuleId::R1]).check(&series, 0.0, Some(1.0));
            let expected: Vec<usize> = series
                .iter()
                .enumerate()
                .filter(|(_, x)| x.abs() > 3.0)
                .map(|(i, _)| i)
                .collect();
            let got: Vec<usize> = v.iter().map(|x| x.point_index).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
