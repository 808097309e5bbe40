//! Attributes control charts: P, NP, C, and U.
//!
//! These charts monitor discrete counts. Limits come from the binomial
//! (P, NP) or Poisson (C, U) model and may vary per point when sample
//! sizes differ.
//!
//! # Chart Selection Guide
//!
//! | Chart | Data Type | Sample Size |
//! |-------|-----------|-------------|
//! | P     | Proportion defective | Variable |
//! | NP    | Count defective | Per-row |
//! | C     | Count of defects | Constant area |
//! | U     | Defects per unit | Variable area |
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 7: Control Charts for Attributes.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::chart::ChartLine;
use crate::error::{QualityError, Result};

/// Which attributes chart to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Fraction nonconforming, p_i = count_i / size_i.
    P,
    /// Number nonconforming, plotted as the raw count.
    Np,
    /// Defect count per constant inspection unit.
    C,
    /// Defects per unit, u_i = count_i / size_i.
    U,
}

impl AttributeKind {
    /// Whether the chart needs a sample-size column.
    pub fn needs_sizes(&self) -> bool {
        !matches!(self, AttributeKind::C)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttributeKind::P => "p-chart",
            AttributeKind::Np => "np-chart",
            AttributeKind::C => "c-chart",
            AttributeKind::U => "u-chart",
        })
    }
}

/// A single point on an attributes chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributePoint {
    /// Index of the source row (before invalid rows were dropped).
    pub row: usize,
    /// Plotted statistic (proportion, count, or rate).
    pub value: f64,
    /// Center line and limits for this point.
    pub line: ChartLine,
    /// `true` if the value lies strictly outside a limit.
    pub out_of_control: bool,
}

/// Result of an attributes chart computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChart {
    pub kind: AttributeKind,
    /// Points for the rows that survived cleaning, in row order.
    pub points: Vec<AttributePoint>,
    /// Overall statistic: p-bar (P, NP), c-bar (C), or u-bar (U).
    pub center: f64,
    /// Rows removed for invalid counts or sizes.
    pub dropped_rows: usize,
}

impl AttributeChart {
    pub fn is_in_control(&self) -> bool {
        self.points.iter().all(|p| !p.out_of_control)
    }

    /// Row indices of out-of-control points.
    pub fn out_of_control_rows(&self) -> Vec<usize> {
        self.points
            .iter()
            .filter(|p| p.out_of_control)
            .map(|p| p.row)
            .collect()
    }
}

/// Build a P, NP, C, or U chart.
///
/// Rows with a non-finite or negative count, or (for P, NP, U) a
/// non-finite or non-positive size, are dropped before computation. The
/// C chart ignores `sizes`.
///
/// # Formulas
///
/// - P: p-bar = sum(count) / sum(size); limits p-bar +/- 3 sqrt(p-bar(1-p-bar)/n_i), clamped to [0, 1].
/// - NP: CL_i = p-bar n_i; limits CL_i +/- 3 sqrt(n_i p-bar (1-p-bar)), clamped >= 0.
/// - C: c-bar = mean(count); limits c-bar +/- 3 sqrt(c-bar), LCL clamped >= 0.
/// - U: u-bar = sum(count) / sum(size); limits u-bar +/- 3 sqrt(u-bar/n_i), LCL clamped >= 0.
///
/// # Errors
///
/// - [`QualityError::InvalidArgument`] if P, NP, or U is requested without sizes.
/// - [`QualityError::LengthMismatch`] if `sizes` and `counts` differ in length.
/// - [`QualityError::InsufficientData`] for empty input.
/// - [`QualityError::NoValidRowsAfterCleaning`] if every row is dropped.
///
/// # Examples
///
/// ```
/// use u_quality::spc::{attribute_chart, AttributeKind};
///
/// let counts = [5.0, 8.0, 3.0, 6.0];
/// let sizes = [100.0, 100.0, 100.0, 100.0];
/// let chart = attribute_chart(AttributeKind::P, &counts, Some(&sizes)).unwrap();
/// assert!((chart.center - 0.055).abs() < 1e-12);
/// ```
pub fn attribute_chart(kind: AttributeKind, counts: &[f64], sizes: Option<&[f64]>) -> Result<AttributeChart> {
    let sizes = match (kind.needs_sizes(), sizes) {
        (true, None) => {
            return Err(QualityError::invalid_argument(format!("{kind} requires sample sizes")));
        }
        (true, Some(s)) if s.len() != counts.len() => {
            return Err(QualityError::LengthMismatch {
                context: format!("{kind} sample sizes"),
                expected: counts.len(),
                actual: s.len(),
            });
        }
        (true, Some(s)) => Some(s),
        (false, _) => None,
    };
    if counts.is_empty() {
        return Err(QualityError::insufficient(kind.to_string(), 1, 0));
    }

    // (row, count, size)
    let rows: Vec<(usize, f64, f64)> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| (i, c, sizes.map_or(1.0, |s| s[i])))
        .filter(|&(_, c, n)| c.is_finite() && c >= 0.0 && n.is_finite() && n > 0.0)
        .collect();
    let dropped_rows = counts.len() - rows.len();
    if rows.is_empty() {
        return Err(QualityError::NoValidRowsAfterCleaning {
            context: format!("{kind} counts/sizes"),
        });
    }
    if dropped_rows > 0 {
        warn!(dropped_rows, %kind, "dropped rows with invalid count or size");
    }

    let total_count: f64 = rows.iter().map(|r| r.1).sum();
    let total_size: f64 = rows.iter().map(|r| r.2).sum();
    let center = match kind {
        AttributeKind::C => total_count / rows.len() as f64,
        _ => total_count / total_size,
    };
    debug!(%kind, rows = rows.len(), center, "computing attributes chart");

    let points = rows
        .iter()
        .map(|&(row, count, n)| {
            let (value, line) = match kind {
                AttributeKind::P => {
                    let sigma = (center * (1.0 - center) / n).sqrt();
                    let line = ChartLine::new(
                        center,
                        (center - 3.0 * sigma).clamp(0.0, 1.0),
                        (center + 3.0 * sigma).clamp(0.0, 1.0),
                    );
                    (count / n, line)
                }
                AttributeKind::Np => {
                    let np_bar = center * n;
                    let sigma = (n * center * (1.0 - center)).sqrt();
                    let line = ChartLine::new(
                        np_bar,
                        (np_bar - 3.0 * sigma).max(0.0),
                        (np_bar + 3.0 * sigma).max(0.0),
                    );
                    (count, line)
                }
                AttributeKind::C => {
                    let sigma = center.sqrt();
                    let line = ChartLine::new(center, (center - 3.0 * sigma).max(0.0), center + 3.0 * sigma);
                    (count, line)
                }
                AttributeKind::U => {
                    let sigma = (center / n).sqrt();
                    let line = ChartLine::new(center, (center - 3.0 * sigma).max(0.0), center + 3.0 * sigma);
                    (count / n, line)
                }
            };
            AttributePoint {
                row,
                value,
                line,
                out_of_control: line.is_beyond(value),
            }
        })
        .collect();

    Ok(AttributeChart {
        kind,
        points,
        center,
        dropped_rows,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- P Chart ---

    #[test]
    fn test_p_chart_basic() {
        // Textbook example: 10 samples of size 100
        let defectives = [5.0, 8.0, 3.0, 6.0, 4.0, 7.0, 2.0, 9.0, 5.0, 6.0];
        let sizes = [100.0; 10];
        let chart = attribute_chart(AttributeKind::P, &defectives, Some(&sizes)).unwrap();

        // p-bar = 55/1000 = 0.055
        assert!((chart.center - 0.055).abs() < 1e-10, "p_bar={}", chart.center);
        assert_eq!(chart.points.len(), 10);
        for pt in &chart.points {
            assert!((pt.line.center - 0.055).abs() < 1e-10);
        }
        assert!(chart.is_in_control());
    }

    #[test]
    fn test_p_chart_limits() {
        // p-bar = 0.10, n = 100 -> sigma = 0.03, UCL = 0.19, LCL = 0.01
        let chart = attribute_chart(AttributeKind::P, &[10.0], Some(&[100.0])).unwrap();
        let line = chart.points[0].line;
        assert!((line.center - 0.1).abs() < 1e-10);
        assert!((line.upper_limit.unwrap() - 0.19).abs() < 1e-10);
        assert!((line.lower_limit.unwrap() - 0.01).abs() < 1e-10);
    }

    #[test]
    fn test_p_chart_variable_sample_sizes() {
        let chart =
            attribute_chart(AttributeKind::P, &[5.0, 10.0, 3.0], Some(&[100.0, 200.0, 50.0])).unwrap();
        assert!((chart.center - 18.0 / 350.0).abs() < 1e-12);
        let pts = &chart.points;
        // Larger sample = tighter limits
        let width = |p: &AttributePoint| p.line.upper_limit.unwrap() - p.line.center;
        assert!(width(&pts[1]) < width(&pts[0]));
        assert!(width(&pts[0]) < width(&pts[2]));
    }

    #[test]
    fn test_p_chart_limits_clamped_to_unit_interval() {
        // p-bar = 0.9 with n = 2: raw UCL > 1, raw LCL < 0
        let chart = attribute_chart(AttributeKind::P, &[9.0, 0.0], Some(&[5.0, 5.0])).unwrap();
        for p in &chart.points {
            assert!(p.line.upper_limit.unwrap() <= 1.0);
            assert!(p.line.lower_limit.unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_p_chart_out_of_control() {
        let mut counts = vec![5.0; 20];
        let mut sizes = vec![100.0; 20];
        counts.push(40.0);
        sizes.push(100.0);
        let chart = attribute_chart(AttributeKind::P, &counts, Some(&sizes)).unwrap();
        assert!(!chart.is_in_control());
        assert_eq!(chart.out_of_control_rows(), vec![20]);
    }

    #[test]
    fn test_drops_invalid_rows() {
        let counts = [5.0, -1.0, f64::NAN, 4.0, 3.0];
        let sizes = [100.0, 100.0, 100.0, 0.0, 100.0];
        let chart = attribute_chart(AttributeKind::P, &counts, Some(&sizes)).unwrap();
        assert_eq!(chart.dropped_rows, 3);
        let rows: Vec<usize> = chart.points.iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![0, 4]);
        assert!((chart.center - 8.0 / 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_rows_invalid() {
        let err = attribute_chart(AttributeKind::U, &[1.0, 2.0], Some(&[0.0, -3.0])).unwrap_err();
        assert!(matches!(err, QualityError::NoValidRowsAfterCleaning { .. }));
    }

    #[test]
    fn test_sizes_required_and_aligned() {
        assert!(matches!(
            attribute_chart(AttributeKind::Np, &[1.0], None),
            Err(QualityError::InvalidArgument { .. })
        ));
        assert!(matches!(
            attribute_chart(AttributeKind::P, &[1.0, 2.0], Some(&[10.0])),
            Err(QualityError::LengthMismatch { .. })
        ));
        assert!(matches!(
            attribute_chart(AttributeKind::C, &[], None),
            Err(QualityError::InsufficientData { .. })
        ));
    }

    // --- NP Chart ---

    #[test]
    fn test_np_chart_limits() {
        // p-bar = 0.1 with n = 100 -> CL = 10, sigma = 3, UCL = 19, LCL = 1
        let chart = attribute_chart(AttributeKind::Np, &[8.0, 12.0], Some(&[100.0, 100.0])).unwrap();
        let line = chart.points[0].line;
        assert!((line.center - 10.0).abs() < 1e-10);
        assert!((line.upper_limit.unwrap() - 19.0).abs() < 1e-10);
        assert!((line.lower_limit.unwrap() - 1.0).abs() < 1e-10);
        assert!((chart.points[1].value - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_np_chart_per_point_center() {
        let chart = attribute_chart(AttributeKind::Np, &[2.0, 6.0], Some(&[50.0, 150.0])).unwrap();
        // p-bar = 8/200 = 0.04
        assert!((chart.points[0].line.center - 2.0).abs() < 1e-12);
        assert!((chart.points[1].line.center - 6.0).abs() < 1e-12);
        assert!(chart.points.iter().all(|p| p.line.lower_limit.unwrap() >= 0.0));
    }

    // --- C Chart ---

    #[test]
    fn test_c_chart_limits() {
        // c-bar = 9 -> UCL = 18, LCL = 0
        let chart = attribute_chart(AttributeKind::C, &[6.0, 9.0, 12.0], None).unwrap();
        assert!((chart.center - 9.0).abs() < f64::EPSILON);
        let line = chart.points[0].line;
        assert!((line.upper_limit.unwrap() - 18.0).abs() < 1e-12);
        assert!(line.lower_limit.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_c_chart_ignores_sizes() {
        let chart = attribute_chart(AttributeKind::C, &[4.0, 16.0], Some(&[0.0, 0.0])).unwrap();
        assert_eq!(chart.dropped_rows, 0);
        assert!((chart.center - 10.0).abs() < f64::EPSILON);
    }

    // --- U Chart ---

    #[test]
    fn test_u_chart_limits() {
        // u-bar = 30 / 15 = 2; n = 5 -> sigma = sqrt(0.4)
        let chart = attribute_chart(AttributeKind::U, &[10.0, 20.0], Some(&[5.0, 10.0])).unwrap();
        assert!((chart.center - 2.0).abs() < 1e-12);
        let p0 = chart.points[0];
        assert!((p0.value - 2.0).abs() < 1e-12);
        let sigma = (2.0_f64 / 5.0).sqrt();
        assert!((p0.line.upper_limit.unwrap() - (2.0 + 3.0 * sigma)).abs() < 1e-12);
        assert!((p0.line.lower_limit.unwrap() - (2.0 - 3.0 * sigma).max(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_defects_collapses_limits() {
        let chart = attribute_chart(AttributeKind::C, &[0.0, 0.0, 0.0], None).unwrap();
        assert_eq!(chart.points[0].line, ChartLine::new(0.0, 0.0, 0.0));
        assert!(chart.is_in_control());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn p_chart_limits_within_unit_interval(
            rows in proptest::collection::vec((0u32..50, 1u32..200), 1..=30)
        ) {
            let counts: Vec<f64> = rows.iter().map(|r| f64::from(r.0.min(r.1))).collect();
            let sizes: Vec<f64> = rows.iter().map(|r| f64::from(r.1)).collect();
            let chart = attribute_chart(AttributeKind::P, &counts, Some(&sizes)).unwrap();
            for p in &chart.points {
                let (l, u) = (p.line.lower_limit.unwrap(), p.line.upper_limit.unwrap());
                prop_assert!((0.0..=1.0).contains(&l) && (0.0..=1.0).contains(&u));
                prop_assert!(l <= p.line.center && p.line.center <= u);
            }
        }

        #[test]
        fn lower_limits_never_negative(
            counts in proptest::collection::vec(0.0_f64..100.0, 1..=30),
        ) {
            let sizes: Vec<f64> = counts.iter().map(|c| c + 1.0).collect();
            for kind in [AttributeKind::Np, AttributeKind::C, AttributeKind::U] {
                let chart = attribute_chart(kind, &counts, Some(&sizes)).unwrap();
                prop_assert!(chart.points.iter().all(|p| p.line.lower_limit.unwrap() >= 0.0));
            }
        }
    }
}
