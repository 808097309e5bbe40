//! Immutable tabular input.
//!
//! A [`Table`] is the single value passed into the [`analysis`](crate::analysis)
//! adapters. It is never mutated after construction; adapters read columns
//! by name and hand coerced vectors to the engines.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::coerce::{category_of, coerce_numeric, Cell};
use crate::error::{QualityError, Result};

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Build a column from anything convertible to [`Cell`].
    pub fn from_values<T: Into<Cell>>(name: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        Self::new(name, values.into_iter().map(Into::into).collect())
    }
}

/// Ordered rows with named, equal-length columns.
///
/// # Examples
///
/// ```
/// use u_quality::table::{Column, Table};
///
/// let table = Table::new(vec![
///     Column::from_values("width", [10.1, 10.3, 9.8]),
///     Column::from_values("shift", ["A", "B", "A"]),
/// ])
/// .unwrap();
/// assert_eq!(table.row_count(), 3);
/// assert_eq!(table.numeric("width").unwrap()[1], Some(10.3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Create a table, rejecting ragged columns and duplicate names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map_or(0, |c| c.cells.len());
        let mut seen = HashSet::new();
        for col in &columns {
            if col.cells.len() != rows {
                return Err(QualityError::LengthMismatch {
                    context: format!("column '{}'", col.name),
                    expected: rows,
                    actual: col.cells.len(),
                });
            }
            if !seen.insert(col.name.as_str()) {
                return Err(QualityError::invalid_argument(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| QualityError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Column coerced to numbers, row-aligned.
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(coerce_numeric(&self.column(name)?.cells))
    }

    /// Column as category keys, row-aligned.
    pub fn categories(&self, name: &str) -> Result<Vec<Option<String>>> {
        Ok(self.column(name)?.cells.iter().map(category_of).collect())
    }

    /// Names of the columns satisfying a classifier.
    pub fn select_columns(&self, pred: impl Fn(&[Cell]) -> bool) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| pred(&c.cells))
            .map(|c| c.name.as_str())
            .collect()
    }
}
