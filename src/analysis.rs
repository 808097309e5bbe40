//! Table adapters.
//!
//! Each adapter reads named columns from a [`Table`], coerces them, drops
//! rows that are missing a required value, enforces minimum counts with
//! errors that name the column, and hands plain vectors to the engine.
//! No adapter keeps state between calls.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{self, CapabilityResult, SpecLimits};
use crate::error::{QualityError, Result};
use crate::msa::{gage_rr, GageRrResult};
use crate::options::{CapabilityOptions, GageRrOptions};
use crate::pareto::{pareto, Pareto};
use crate::spc::{
    attribute_chart, individuals_moving_range, xbar_r, AttributeChart, AttributeKind,
    IndividualsMovingRange, NelsonRules, RunRule, Violation, XBarR,
};
use crate::table::Table;

/// An I-MR chart of one column with its run-rule violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualsStudy {
    pub column: String,
    pub chart: IndividualsMovingRange,
    /// Violations on the individuals series; empty when sigma is undefined.
    pub violations: Vec<Violation>,
}

/// Non-missing values of a numeric column, in row order.
fn present_values(table: &Table, column: &str) -> Result<Vec<f64>> {
    let values: Vec<f64> = table.numeric(column)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(if table.row_count() == 0 {
            QualityError::insufficient(format!("column '{column}'"), 1, 0)
        } else {
            QualityError::NoValidRowsAfterCleaning {
                context: format!("column '{column}'"),
            }
        });
    }
    let dropped = table.row_count() - values.len();
    if dropped > 0 {
        warn!(column, dropped, "dropped non-numeric cells");
    }
    Ok(values)
}

/// Numeric column with missing cells as NaN, keeping row positions.
fn numeric_or_nan(table: &Table, column: &str) -> Result<Vec<f64>> {
    Ok(table
        .numeric(column)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// I-MR chart of `column`, scanned with `rules`.
///
/// # Examples
///
/// ```
/// use u_quality::analysis::individuals_for_column;
/// use u_quality::spc::NelsonRules;
/// use u_quality::table::{Column, Table};
///
/// let table = Table::new(vec![Column::from_values("y", [10.0, 10.2, 9.9, 10.1, 14.0])]).unwrap();
/// let study = individuals_for_column(&table, "y", &NelsonRules::default()).unwrap();
/// assert_eq!(study.chart.points.len(), 5);
/// ```
pub fn individuals_for_column(
    table: &Table,
    column: &str,
    rules: &NelsonRules,
) -> Result<IndividualsStudy> {
    let values = present_values(table, column)?;
    let chart = individuals_moving_range(&values)?;
    let violations = rules.check(&values, chart.x_line.center, chart.sigma);
    debug!(column, violations = violations.len(), "individuals study done");
    Ok(IndividualsStudy {
        column: column.to_string(),
        chart,
        violations,
    })
}

/// X-bar-R chart of `value_column` grouped by `subgroup_column`.
///
/// Rows missing either value are dropped.
pub fn xbar_r_for_columns(
    table: &Table,
    value_column: &str,
    subgroup_column: &str,
) -> Result<XBarR<String>> {
    let values = table.numeric(value_column)?;
    let keys = table.categories(subgroup_column)?;
    let (samples, groups): (Vec<f64>, Vec<String>) = values
        .into_iter()
        .zip(keys)
        .filter_map(|(v, k)| Some((v?, k?)))
        .unzip();
    if samples.is_empty() && table.row_count() > 0 {
        return Err(QualityError::NoValidRowsAfterCleaning {
            context: format!("columns '{value_column}' and '{subgroup_column}'"),
        });
    }
    xbar_r(&samples, &groups)
}

/// Attributes chart from a count column and, for P/NP/U, a size column.
///
/// Missing cells are passed through as invalid rows, so
/// [`AttributePoint::row`](crate::spc::AttributePoint::row) matches the
/// table row.
pub fn attribute_chart_for_columns(
    table: &Table,
    kind: AttributeKind,
    count_column: &str,
    size_column: Option<&str>,
) -> Result<AttributeChart> {
    let counts = numeric_or_nan(table, count_column)?;
    let sizes = size_column.map(|c| numeric_or_nan(table, c)).transpose()?;
    attribute_chart(kind, &counts, sizes.as_deref()).map_err(|e| match e {
        QualityError::NoValidRowsAfterCleaning { .. } => QualityError::NoValidRowsAfterCleaning {
            context: match size_column {
                Some(s) => format!("columns '{count_column}' and '{s}'"),
                None => format!("column '{count_column}'"),
            },
        },
        other => other,
    })
}

/// Capability study of one column.
///
/// # Errors
///
/// [`QualityError::InsufficientData`] with fewer than `opts.min_points`
/// numeric values.
pub fn capability_study(
    table: &Table,
    column: &str,
    spec: &SpecLimits,
    opts: &CapabilityOptions,
) -> Result<CapabilityResult> {
    let values: Vec<f64> = table.numeric(column)?.into_iter().flatten().collect();
    if values.len() < opts.min_points {
        return Err(QualityError::insufficient(
            format!("capability of column '{column}'"),
            opts.min_points,
            values.len(),
        ));
    }
    Ok(capability::compute(&values, spec))
}

/// Crossed Gage R&R from part, operator, and measurement columns.
///
/// Rows missing a part or operator label are dropped.
pub fn gage_rr_for_columns(
    table: &Table,
    part_column: &str,
    operator_column: &str,
    measurement_column: &str,
    opts: &GageRrOptions,
) -> Result<GageRrResult> {
    let parts = table.categories(part_column)?;
    let operators = table.categories(operator_column)?;
    let measurements = table.numeric(measurement_column)?;
    let rows: Vec<(String, String, Option<f64>)> = parts
        .into_iter()
        .zip(operators)
        .zip(measurements)
        .filter_map(|((p, o), m)| Some((p?, o?, m)))
        .collect();
    gage_rr(&rows, opts)
}

/// Pareto table of one category column.
pub fn pareto_for_column(table: &Table, column: &str, top_n: usize) -> Result<Pareto> {
    pareto(&table.categories(column)?, top_n)
}
