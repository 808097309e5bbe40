//! Crossed Gage R&R by the ANOVA method.
//!
//! Decomposes measurement variance into repeatability (equipment),
//! reproducibility (appraiser), and part-to-part components from the mean
//! squares of a two-way crossed ANOVA.
//!
//! # Variance components
//!
//! With r the smallest replicate count, p parts and o operators:
//!
//! ```text
//! var_repeatability = MS_residual
//! var_interaction   = max((MS_interaction - MS_residual) / r, 0)
//! var_operator      = max((MS_operator - MS_interaction) / (p r), 0)
//! var_part          = max((MS_part - MS_interaction) / (o r), 0)
//! ```
//!
//! # References
//!
//! - AIAG (2010). *Measurement Systems Analysis Reference Manual*, 4th ed.
//! - Montgomery, D.C. & Runger, G.C. (1993). "Gauge Capability and Designed
//!   Experiments. Part II", *Quality Engineering* 6(2), pp. 289-305.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::anova::{CrossedLayout, TwoWayAnova};
use crate::error::{QualityError, Result};
use crate::options::GageRrOptions;

/// Where the part x operator interaction variance is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionTerm {
    /// Interaction is added to reproducibility.
    #[default]
    FoldedIntoReproducibility,
    /// Interaction is its own component, still counted in GRR.
    Separate,
}

/// Result of a Gage R&R study.
///
/// Variance components are non-negative and
/// `var_total = var_repeatability + var_reproducibility + var_part`
/// (plus `var_interaction` under [`InteractionTerm::Separate`]).
/// Percentages are `100 * component / var_total` and are NaN when
/// `var_total` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GageRrResult {
    /// Measurements used.
    pub n: usize,
    pub part_count: usize,
    pub operator_count: usize,
    /// Smallest replicate count over all part x operator cells.
    pub min_repeats: usize,
    pub interaction: InteractionTerm,
    pub var_repeatability: f64,
    pub var_reproducibility: f64,
    /// Interaction component; included in `var_reproducibility` when folded.
    pub var_interaction: f64,
    pub var_part: f64,
    /// Repeatability plus reproducibility (plus interaction when separate).
    pub var_grr: f64,
    pub var_total: f64,
    pub pct_grr: f64,
    pub pct_repeatability: f64,
    pub pct_reproducibility: f64,
    /// Present only under [`InteractionTerm::Separate`].
    pub pct_interaction: Option<f64>,
    pub pct_part: f64,
    /// The underlying ANOVA table.
    pub anova: TwoWayAnova,
}

impl GageRrResult {
    /// Verdict with the default thresholds (10% / 30%).
    pub fn verdict(&self) -> GrrVerdict {
        self.verdict_with(&GageRrOptions::default())
    }

    pub fn verdict_with(&self, opts: &GageRrOptions) -> GrrVerdict {
        GrrVerdict::from_pct(self.pct_grr, opts)
    }
}

/// Measurement system acceptance by %GRR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrrVerdict {
    Acceptable,
    Marginal,
    Unacceptable,
    Indeterminate,
}

impl GrrVerdict {
    pub fn from_pct(pct_grr: f64, opts: &GageRrOptions) -> Self {
        if !pct_grr.is_finite() {
            Self::Indeterminate
        } else if pct_grr <= opts.acceptable_pct {
            Self::Acceptable
        } else if pct_grr <= opts.marginal_pct {
            Self::Marginal
        } else {
            Self::Unacceptable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Acceptable => "acceptable",
            Self::Marginal => "marginal",
            Self::Unacceptable => "unacceptable",
            Self::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for GrrVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Crossed Gage R&R study.
///
/// Rows are `(part, operator, measurement)`; rows with a missing or
/// non-finite measurement are dropped.
///
/// # Errors
///
/// - [`QualityError::InsufficientData`] if fewer than `opts.min_rows`
///   measurements remain, or a present cell has fewer than
///   `opts.min_repeats` repeats.
/// - [`QualityError::ModelFitFailure`] if the ANOVA cannot be fitted
///   (fewer than two parts or operators, empty cells, singular system).
///
/// # Examples
///
/// ```
/// use u_quality::msa::{gage_rr, GrrVerdict};
/// use u_quality::options::GageRrOptions;
///
/// let rows = [
///     ("A", "X", Some(10.0)), ("A", "X", Some(12.0)), ("A", "Y", Some(11.0)), ("A", "Y", Some(13.0)),
///     ("B", "X", Some(20.0)), ("B", "X", Some(22.0)), ("B", "Y", Some(21.0)), ("B", "Y", Some(23.0)),
/// ];
/// let grr = gage_rr(&rows, &GageRrOptions::default()).unwrap();
/// assert!((grr.var_part - 50.0).abs() < 1e-9);
/// assert_eq!(grr.verdict(), GrrVerdict::Acceptable);
/// ```
pub fn gage_rr<P, O>(rows: &[(P, O, Option<f64>)], opts: &GageRrOptions) -> Result<GageRrResult>
where
    P: Eq + Hash + Clone,
    O: Eq + Hash + Clone,
{
    let clean: Vec<(P, O, f64)> = rows
        .iter()
        .filter_map(|(p, o, v)| v.filter(|x| x.is_finite()).map(|x| (p.clone(), o.clone(), x)))
        .collect();
    if clean.len() < rows.len() {
        warn!(dropped = rows.len() - clean.len(), "dropped rows without a numeric measurement");
    }
    if clean.len() < opts.min_rows {
        return Err(QualityError::insufficient("gage R&R measurements", opts.min_rows, clean.len()));
    }

    let layout = CrossedLayout::new(&clean);
    let min_repeats = layout.min_present_replicates();
    if min_repeats < opts.min_repeats {
        return Err(QualityError::insufficient(
            "gage R&R repeats per part x operator cell",
            opts.min_repeats,
            min_repeats,
        ));
    }
    debug!(
        n = clean.len(),
        parts = layout.part_count,
        operators = layout.operator_count,
        min_repeats,
        "computing gage R&R"
    );

    let anova = layout.fit()?;
    Ok(components(anova, min_repeats, opts.interaction))
}

fn components(anova: TwoWayAnova, min_repeats: usize, interaction: InteractionTerm) -> GageRrResult {
    let r = min_repeats as f64;
    let p = anova.part_count as f64;
    let o = anova.operator_count as f64;
    let ms_part = anova.part.ms;
    let ms_operator = anova.operator.ms;
    let ms_interaction = anova.interaction.ms;
    let ms_residual = anova.residual.ms;

    let var_repeatability = ms_residual;
    let var_interaction = ((ms_interaction - ms_residual) / r).max(0.0);
    let var_operator = ((ms_operator - ms_interaction) / (p * r)).max(0.0);
    let var_part = ((ms_part - ms_interaction) / (o * r)).max(0.0);

    let var_reproducibility = match interaction {
        InteractionTerm::FoldedIntoReproducibility => var_operator + var_interaction,
        InteractionTerm::Separate => var_operator,
    };
    let separate = match interaction {
        InteractionTerm::FoldedIntoReproducibility => 0.0,
        InteractionTerm::Separate => var_interaction,
    };
    let var_grr = var_repeatability + var_reproducibility + separate;
    let var_total = var_grr + var_part;

    let pct = |v: f64| {
        if var_total > 0.0 {
            100.0 * v / var_total
        } else {
            f64::NAN
        }
    };
    if var_total <= 0.0 {
        warn!("total variance is zero; gage R&R percentages are indeterminate");
    }

    GageRrResult {
        n: anova.n,
        part_count: anova.part_count,
        operator_count: anova.operator_count,
        min_repeats,
        interaction,
        var_repeatability,
        var_reproducibility,
        var_interaction,
        var_part,
        var_grr,
        var_total,
        pct_grr: pct(var_grr),
        pct_repeatability: pct(var_repeatability),
        pct_reproducibility: pct(var_reproducibility),
        pct_interaction: match interaction {
            InteractionTerm::FoldedIntoReproducibility => None,
            InteractionTerm::Separate => Some(pct(var_interaction)),
        },
        pct_part: pct(var_part),
        anova,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    type Row = (u32, &'static str, Option<f64>);

    fn study(cells: Vec<(u32, &'static str, Vec<f64>)>) -> Vec<Row> {
        cells
            .into_iter()
            .flat_map(|(p, o, vs)| vs.into_iter().map(move |v| (p, o, Some(v))))
            .collect()
    }

    fn balanced() -> Vec<Row> {
        study(vec![
            (1, "X", vec![10.0, 12.0]),
            (1, "Y", vec![11.0, 13.0]),
            (2, "X", vec![20.0, 22.0]),
            (2, "Y", vec![21.0, 23.0]),
        ])
    }

    fn interaction_only() -> Vec<Row> {
        study(vec![
            (1, "X", vec![10.0, 12.0]),
            (1, "Y", vec![20.0, 22.0]),
            (2, "X", vec![20.0, 22.0]),
            (2, "Y", vec![10.0, 12.0]),
        ])
    }

    #[test]
    fn balanced_components_match_hand_calculation() {
        let g = gage_rr(&balanced(), &GageRrOptions::default()).unwrap();
        assert_eq!((g.n, g.part_count, g.operator_count, g.min_repeats), (8, 2, 2, 2));
        assert_abs_diff_eq!(g.var_repeatability, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_interaction, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_reproducibility, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_part, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_total, 52.5, epsilon = 1e-9);
        assert_abs_diff_eq!(g.pct_grr, 100.0 * 2.5 / 52.5, epsilon = 1e-9);
        assert_eq!(g.pct_interaction, None);
        assert_eq!(g.verdict(), GrrVerdict::Acceptable);
    }

    #[test]
    fn folded_interaction_lands_in_reproducibility() {
        let g = gage_rr(&interaction_only(), &GageRrOptions::default()).unwrap();
        // MS_interaction = 200, MS_residual = 2 -> (200 - 2) / 2
        assert_abs_diff_eq!(g.var_interaction, 99.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_reproducibility, 99.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_part, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.pct_grr, 100.0, epsilon = 1e-9);
        assert_eq!(g.verdict(), GrrVerdict::Unacceptable);
    }

    #[test]
    fn separate_interaction_is_its_own_component() {
        let opts = GageRrOptions::default().with_interaction(InteractionTerm::Separate);
        let g = gage_rr(&interaction_only(), &opts).unwrap();
        assert_abs_diff_eq!(g.var_reproducibility, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_interaction, 99.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.var_total, 101.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.pct_interaction.unwrap(), 100.0 * 99.0 / 101.0, epsilon = 1e-9);

        let folded = gage_rr(&interaction_only(), &GageRrOptions::default()).unwrap();
        assert_abs_diff_eq!(g.var_grr, folded.var_grr, epsilon = 1e-12);
        assert_abs_diff_eq!(g.pct_grr, folded.pct_grr, epsilon = 1e-12);
    }

    #[test]
    fn drops_missing_measurements() {
        let mut rows = balanced();
        rows.push((1, "X", None));
        rows.push((2, "Y", Some(f64::NAN)));
        let g = gage_rr(&rows, &GageRrOptions::default()).unwrap();
        assert_eq!(g.n, 8);
    }

    #[test]
    fn too_few_rows() {
        let rows = study(vec![(1, "X", vec![1.0, 2.0]), (2, "X", vec![3.0, 4.0])]);
        let err = gage_rr(&rows, &GageRrOptions::default()).unwrap_err();
        assert!(matches!(err, QualityError::InsufficientData { required: 6, actual: 4, .. }));
    }

    #[test]
    fn single_repeat_cell_rejected() {
        let rows = study(vec![
            (1, "X", vec![10.0, 12.0]),
            (1, "Y", vec![11.0]),
            (2, "X", vec![20.0, 22.0]),
            (2, "Y", vec![21.0, 23.0]),
        ]);
        let err = gage_rr(&rows, &GageRrOptions::default()).unwrap_err();
        assert!(matches!(err, QualityError::InsufficientData { required: 2, actual: 1, .. }));
    }

    #[test]
    fn missing_cell_is_model_fit_failure() {
        let rows = study(vec![
            (1, "X", vec![10.0, 12.0]),
            (1, "Y", vec![11.0, 13.0]),
            (2, "X", vec![20.0, 22.0]),
            (3, "Y", vec![21.0, 23.0]),
        ]);
        let err = gage_rr(&rows, &GageRrOptions::default()).unwrap_err();
        assert!(matches!(err, QualityError::ModelFitFailure { .. }));
    }

    #[test]
    fn zero_variance_is_indeterminate() {
        let rows = study(vec![
            (1, "X", vec![5.0, 5.0]),
            (1, "Y", vec![5.0, 5.0]),
            (2, "X", vec![5.0, 5.0]),
            (2, "Y", vec![5.0, 5.0]),
        ]);
        let g = gage_rr(&rows, &GageRrOptions::default()).unwrap();
        assert_eq!(g.var_total, 0.0);
        assert!(g.pct_grr.is_nan());
        assert_eq!(g.verdict(), GrrVerdict::Indeterminate);
    }

    #[test]
    fn verdict_thresholds() {
        let opts = GageRrOptions::default();
        assert_eq!(GrrVerdict::from_pct(10.0, &opts), GrrVerdict::Acceptable);
        assert_eq!(GrrVerdict::from_pct(30.0, &opts), GrrVerdict::Marginal);
        assert_eq!(GrrVerdict::from_pct(30.1, &opts), GrrVerdict::Unacceptable);
        assert_eq!(GrrVerdict::Marginal.to_string(), "marginal");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn crossed_rows() -> impl Strategy<Value = Vec<(usize, usize, Option<f64>)>> {
        (2usize..=5, 2usize..=4, 2usize..=3).prop_flat_map(|(p, o, r)| {
            proptest::collection::vec(-10.0_f64..10.0, p * o * r).prop_map(move |vals| {
                vals.into_iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let cell = i / r;
                        (cell / o, cell % o, Some(v + (cell / o) as f64))
                    })
                    .collect()
            })
        })
    }

    proptest! {
        #[test]
        fn components_sum_to_total(rows in crossed_rows()) {
            let g = gage_rr(&rows, &GageRrOptions::default()).unwrap();
            prop_assert!(g.var_repeatability >= 0.0);
            prop_assert!(g.var_reproducibility >= 0.0);
            prop_assert!(g.var_part >= 0.0);
            let sum = g.var_repeatability + g.var_reproducibility + g.var_part;
            prop_assert!((sum - g.var_total).abs() <= 1e-9 * g.var_total.max(1.0));
            if g.var_total > 0.0 {
                let pct = g.pct_repeatability + g.pct_reproducibility + g.pct_part;
                prop_assert!((pct - 100.0).abs() < 1e-9);
            }
        }

        #[test]
        fn separate_percentages_sum_to_100(rows in crossed_rows()) {
            let opts = GageRrOptions::default().with_interaction(InteractionTerm::Separate);
            let g = gage_rr(&rows, &opts).unwrap();
            if g.var_total > 0.0 {
                let pct = g.pct_repeatability
                    + g.pct_reproducibility
                    + g.pct_interaction.unwrap_or(0.0)
                    + g.pct_part;
                prop_assert!((pct - 100.0).abs() < 1e-9);
            }
        }

        #[test]
        fn gage_rr_is_idempotent(rows in crossed_rows()) {
            let a = gage_rr(&rows, &GageRrOptions::default()).unwrap();
            let b = gage_rr(&rows, &GageRrOptions::default()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
