//! Two-way crossed ANOVA with Type II sums of squares.
//!
//! Model: `y ~ part + operator + part:operator`, fixed effects, every
//! part x operator cell observed at least once and at least one cell
//! replicated. The table is unbalanced-safe: main effects are tested
//! against the additive model, which is fitted by least squares.
//!
//! # Algorithm
//!
//! With RSS(m) the residual sum of squares of sub-model m:
//!
//! - SS_part = RSS(operator) - RSS(part + operator)
//! - SS_operator = RSS(part) - RSS(part + operator)
//! - SS_interaction = RSS(part + operator) - RSS(full)
//! - SS_residual = RSS(full), the pooled within-cell sum of squares
//!
//! RSS(part) and RSS(operator) come from one-way group means, RSS(full)
//! from cell means, and RSS(part + operator) from dummy-coded least
//! squares solved by Cholesky.
//!
//! # References
//!
//! - Montgomery, D.C. (2017). *Design and Analysis of Experiments*, 9th ed., Chapter 5.
//! - Langsrud, O. (2003). "ANOVA for unbalanced data: Use Type II instead of
//!   Type III sums of squares", *Statistics and Computing* 13, pp. 163-167.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::debug;
use u_numflow::matrix::Matrix;
use u_numflow::special;

use crate::error::{QualityError, Result};

/// Source of variation in the ANOVA table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnovaSource {
    Part,
    Operator,
    Interaction,
    Residual,
}

/// One row of the ANOVA table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaRow {
    pub source: AnovaSource,
    /// Degrees of freedom.
    pub df: usize,
    /// Sum of squares.
    pub ss: f64,
    /// Mean square, `ss / df`.
    pub ms: f64,
    /// `ms / ms_residual`; absent on the residual row.
    pub f_statistic: Option<f64>,
    /// Upper-tail F probability; absent on the residual row.
    pub p_value: Option<f64>,
}

/// Two-way crossed ANOVA table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoWayAnova {
    /// Observations used.
    pub n: usize,
    pub part_count: usize,
    pub operator_count: usize,
    /// Smallest replicate count over all cells.
    pub min_replicates: usize,
    pub part: AnovaRow,
    pub operator: AnovaRow,
    pub interaction: AnovaRow,
    pub residual: AnovaRow,
}

impl TwoWayAnova {
    /// Rows in table order: part, operator, interaction, residual.
    pub fn rows(&self) -> [&AnovaRow; 4] {
        [&self.part, &self.operator, &self.interaction, &self.residual]
    }
}

/// Observations indexed by part and operator level.
///
/// Levels are numbered in first-appearance order.
#[derive(Debug, Clone)]
pub(crate) struct CrossedLayout {
    pub(crate) part: Vec<usize>,
    pub(crate) operator: Vec<usize>,
    pub(crate) y: Vec<f64>,
    pub(crate) part_count: usize,
    pub(crate) operator_count: usize,
    /// Row count per cell, indexed `part * operator_count + operator`.
    pub(crate) cell_counts: Vec<usize>,
}

impl CrossedLayout {
    pub(crate) fn new<P, O>(rows: &[(P, O, f64)]) -> Self
    where
        P: Eq + Hash + Clone,
        O: Eq + Hash + Clone,
    {
        let mut part_ids: HashMap<P, usize> = HashMap::new();
        let mut operator_ids: HashMap<O, usize> = HashMap::new();
        let mut part = Vec::with_capacity(rows.len());
        let mut operator = Vec::with_capacity(rows.len());
        let mut y = Vec::with_capacity(rows.len());
        for (p, o, v) in rows {
            let next = part_ids.len();
            part.push(*part_ids.entry(p.clone()).or_insert(next));
            let next = operator_ids.len();
            operator.push(*operator_ids.entry(o.clone()).or_insert(next));
            y.push(*v);
        }
        let part_count = part_ids.len();
        let operator_count = operator_ids.len();
        let mut cell_counts = vec![0; part_count * operator_count];
        for (&p, &o) in part.iter().zip(&operator) {
            cell_counts[p * operator_count + o] += 1;
        }
        Self {
            part,
            operator,
            y,
            part_count,
            operator_count,
            cell_counts,
        }
    }

    /// Smallest row count over the cells that are present.
    pub(crate) fn min_present_replicates(&self) -> usize {
        self.cell_counts.iter().copied().filter(|&c| c > 0).min().unwrap_or(0)
    }

    fn missing_cells(&self) -> usize {
        self.cell_counts.iter().filter(|&&c| c == 0).count()
    }

    fn group_rss(&self, key: &[usize], groups: usize) -> f64 {
        let mut sum = vec![0.0; groups];
        let mut count = vec![0usize; groups];
        for (&g, &v) in key.iter().zip(&self.y) {
            sum[g] += v;
            count[g] += 1;
        }
        let means: Vec<f64> = sum
            .iter()
            .zip(&count)
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        key.iter().zip(&self.y).map(|(&g, &v)| (v - means[g]).powi(2)).sum()
    }

    fn cell_keys(&self) -> Vec<usize> {
        self.part
            .iter()
            .zip(&self.operator)
            .map(|(&p, &o)| p * self.operator_count + o)
            .collect()
    }

    /// RSS of the additive model `y ~ 1 + part + operator`.
    fn additive_rss(&self) -> Result<f64> {
        let n = self.y.len();
        let ncols = self.part_count + self.operator_count - 1;

        // Design matrix X (n x ncols, row-major): intercept, then
        // treatment-coded dummies with level 0 as reference.
        let mut x_data = vec![0.0; n * ncols];
        for i in 0..n {
            let row = &mut x_data[i * ncols..(i + 1) * ncols];
            row[0] = 1.0;
            if self.part[i] > 0 {
                row[self.part[i]] = 1.0;
            }
            if self.operator[i] > 0 {
                row[self.part_count - 1 + self.operator[i]] = 1.0;
            }
        }
        let singular = |what: &str| QualityError::model_fit(format!("additive model: {what}"));
        let x_mat = Matrix::new(n, ncols, x_data).map_err(|_| singular("invalid design matrix"))?;

        let xt = x_mat.transpose();
        let xtx = xt.mul_mat(&x_mat).map_err(|_| singular("X'X failed"))?;
        let xty = xt.mul_vec(&self.y).map_err(|_| singular("X'y failed"))?;
        let coefficients = xtx
            .cholesky_solve(&xty)
            .map_err(|_| singular("normal equations are singular"))?;
        let fitted = x_mat.mul_vec(&coefficients).map_err(|_| singular("fitted values failed"))?;

        Ok(self.y.iter().zip(&fitted).map(|(&yi, &fi)| (yi - fi).powi(2)).sum())
    }

    /// Fit the two-way model.
    pub(crate) fn fit(&self) -> Result<TwoWayAnova> {
        let (p, o, n) = (self.part_count, self.operator_count, self.y.len());
        if p < 2 || o < 2 {
            return Err(QualityError::model_fit(format!(
                "need at least 2 parts and 2 operators, got {p} and {o}"
            )));
        }
        let missing = self.missing_cells();
        if missing > 0 {
            return Err(QualityError::model_fit(format!(
                "{missing} of {} part x operator cells have no measurements",
                p * o
            )));
        }
        let df_residual = n.checked_sub(p * o).filter(|&d| d > 0).ok_or_else(|| {
            QualityError::model_fit("no replicated cells, residual degrees of freedom are zero")
        })?;
        debug!(n, parts = p, operators = o, "fitting two-way ANOVA");

        let rss_full = self.group_rss(&self.cell_keys(), p * o);
        let rss_part = self.group_rss(&self.part, p);
        let rss_operator = self.group_rss(&self.operator, o);
        let rss_additive = self.additive_rss()?;

        // Differences of nested fits; clamp rounding below zero
        let ss_part = (rss_operator - rss_additive).max(0.0);
        let ss_operator = (rss_part - rss_additive).max(0.0);
        let ss_interaction = (rss_additive - rss_full).max(0.0);
        let ss_residual = rss_full;

        let ms_residual = ss_residual / df_residual as f64;
        let row = |source, df: usize, ss: f64| {
            let ms = ss / df as f64;
            let f_statistic = if ms_residual > 1e-300 {
                ms / ms_residual
            } else {
                f64::INFINITY
            };
            let p_value = if f_statistic.is_infinite() {
                0.0
            } else {
                1.0 - special::f_distribution_cdf(f_statistic, df as f64, df_residual as f64)
            };
            AnovaRow {
                source,
                df,
                ss,
                ms,
                f_statistic: Some(f_statistic),
                p_value: Some(p_value),
            }
        };

        let anova = TwoWayAnova {
            n,
            part_count: p,
            operator_count: o,
            min_replicates: self.min_present_replicates(),
            part: row(AnovaSource::Part, p - 1, ss_part),
            operator: row(AnovaSource::Operator, o - 1, ss_operator),
            interaction: row(AnovaSource::Interaction, (p - 1) * (o - 1), ss_interaction),
            residual: AnovaRow {
                source: AnovaSource::Residual,
                df: df_residual,
                ss: ss_residual,
                ms: ms_residual,
                f_statistic: None,
                p_value: None,
            },
        };
        debug!(
            ms_part = anova.part.ms,
            ms_operator = anova.operator.ms,
            ms_interaction = anova.interaction.ms,
            ms_residual,
            "two-way ANOVA fitted"
        );
        Ok(anova)
    }
}

/// Two-way crossed ANOVA of `(part, operator, measurement)` rows.
///
/// Rows with a non-finite measurement are ignored.
///
/// # Errors
///
/// [`QualityError::ModelFitFailure`] if there are fewer than two parts or
/// operators, any cell is empty, no cell is replicated, or the normal
/// equations are singular.
///
/// # Examples
///
/// ```
/// use u_quality::msa::two_way_anova;
///
/// let rows = [
///     ("A", "X", 10.0), ("A", "X", 12.0), ("A", "Y", 11.0), ("A", "Y", 13.0),
///     ("B", "X", 20.0), ("B", "X", 22.0), ("B", "Y", 21.0), ("B", "Y", 23.0),
/// ];
/// let t = two_way_anova(&rows).unwrap();
/// assert!((t.part.ss - 200.0).abs() < 1e-9);
/// assert_eq!(t.residual.df, 4);
/// ```
pub fn two_way_anova<P, O>(rows: &[(P, O, f64)]) -> Result<TwoWayAnova>
where
    P: Eq + Hash + Clone,
    O: Eq + Hash + Clone,
{
    let finite: Vec<(P, O, f64)> = rows
        .iter()
        .filter(|r| r.2.is_finite())
        .cloned()
        .collect();
    CrossedLayout::new(&finite).fit()
}
