//! Numeric coercion and column classification.
//!
//! Raw table cells are heterogeneous. Engines only ever see `f64` slices,
//! so every cell passes through [`coerce_cell`] first: finite numbers pass
//! through, text is trimmed and parsed, booleans map to 1/0, and anything
//! else becomes missing.
//!
//! The `is_*` classifiers mirror the column pickers a front end offers for
//! each analysis (measurement, count, sample size, category, subgroup).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::options::CoercionOptions;

/// Label used for missing categories.
pub const BLANK_CATEGORY: &str = "(blank)";

/// A single heterogeneous table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Number(v as f64)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Empty, Into::into)
    }
}

/// Coerce one cell to a finite number, or `None` if it is missing.
pub fn coerce_cell(cell: &Cell) -> Option<f64> {
    let v = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        Cell::Bool(b) => f64::from(u8::from(*b)),
        Cell::Empty => return None,
    };
    v.is_finite().then_some(v)
}

/// Coerce a column, preserving row alignment.
pub fn coerce_numeric(cells: &[Cell]) -> Vec<Option<f64>> {
    cells.iter().map(coerce_cell).collect()
}

/// Category key of a cell, or `None` if the cell is empty.
///
/// Numbers use their shortest display form, so `Number(3.0)` and
/// `Text("3")` land in the same category.
pub fn category_of(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) if s.trim().is_empty() => None,
        Cell::Text(s) => Some(s.trim().to_string()),
        Cell::Number(v) if v.is_nan() => None,
        Cell::Number(v) => Some(v.to_string()),
        Cell::Bool(b) => Some(b.to_string()),
    }
}

/// Keep only finite values, in order.
pub fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Columns that coerce to numbers often enough to be measurements.
pub fn is_numeric_like(cells: &[Cell], opts: &CoercionOptions) -> bool {
    if cells.is_empty() {
        return false;
    }
    let valid = cells.iter().filter_map(coerce_cell).count();
    valid >= opts.min_valid_count && valid as f64 / cells.len() as f64 >= opts.min_valid_fraction
}

/// Columns whose valid values are all integers (counts of defects/defectives).
pub fn is_count_like(cells: &[Cell], opts: &CoercionOptions) -> bool {
    let values: Vec<f64> = cells.iter().filter_map(coerce_cell).collect();
    values.len() >= opts.min_valid_count && values.iter().all(|v| (v - v.round()).abs() <= 1e-9)
}

/// Columns whose valid values are mostly positive (sample sizes, areas, units).
pub fn is_positive_like(cells: &[Cell], opts: &CoercionOptions) -> bool {
    let values: Vec<f64> = cells.iter().filter_map(coerce_cell).collect();
    if values.len() < opts.min_valid_count {
        return false;
    }
    let positive = values.iter().filter(|&&v| v > 0.0).count();
    positive as f64 / values.len() as f64 >= opts.positive_fraction
}

/// Text or boolean columns with bounded cardinality.
pub fn is_category_like(cells: &[Cell], opts: &CoercionOptions) -> bool {
    let mut distinct: HashSet<String> = HashSet::new();
    let mut any_categorical = false;
    for cell in cells {
        match cell {
            Cell::Text(_) | Cell::Bool(_) => any_categorical = true,
            Cell::Number(_) | Cell::Empty => {}
        }
        if let Some(key) = category_of(cell) {
            distinct.insert(key);
            if distinct.len() > opts.max_categories {
                return false;
            }
        }
    }
    any_categorical && !distinct.is_empty()
}

/// Columns that partition rows into at least two groups of one common
/// size in 2..=10, the structure an X-bar-R chart accepts.
pub fn is_xbar_r_subgroup_candidate(cells: &[Cell]) -> bool {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in cells.iter().filter_map(category_of) {
        *counts.entry(key).or_default() += 1;
    }
    if counts.len() < 2 {
        return false;
    }
    let mut sizes = counts.values();
    let first = sizes.next().copied().unwrap_or(0);
    (2..=10).contains(&first) && sizes.all(|&s| s == first)
}
