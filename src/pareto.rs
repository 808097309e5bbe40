//! Pareto analysis of categorical defects.
//!
//! Counts each category, orders by frequency, and reports cumulative
//! counts and percentages over the displayed (top-N) categories.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coerce::BLANK_CATEGORY;
use crate::error::{QualityError, Result};

/// One bar of a Pareto chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoEntry {
    pub category: String,
    pub count: usize,
    pub cum_count: usize,
    /// Cumulative percentage of the displayed total.
    pub cum_pct: f64,
}

/// Result of [`pareto`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pareto {
    /// Categories by descending count, at most `top_n`.
    pub entries: Vec<ParetoEntry>,
    /// Observations across all categories, shown or not.
    pub total_count: usize,
    /// Distinct categories before truncation.
    pub category_count: usize,
}

impl Pareto {
    /// Sum of the displayed counts.
    pub fn displayed_count(&self) -> usize {
        self.entries.last().map_or(0, |e| e.cum_count)
    }

    /// Cumulative percentage of the first `k` entries (clamped to the
    /// number shown). `None` when `k == 0`.
    pub fn top_share(&self, k: usize) -> Option<f64> {
        let last = k.min(self.entries.len()).checked_sub(1)?;
        Some(self.entries[last].cum_pct)
    }
}

/// Build a Pareto table from category labels.
///
/// Missing labels count as `"(blank)"`. Ties keep first-appearance order.
///
/// # Errors
///
/// - [`QualityError::InsufficientData`] for empty input.
/// - [`QualityError::InvalidArgument`] if `top_n == 0`.
///
/// # Examples
///
/// ```
/// use u_quality::pareto::pareto;
///
/// let defects = [Some("scratch"), Some("dent"), Some("scratch"), None, Some("scratch")];
/// let p = pareto(&defects, 10).unwrap();
/// assert_eq!(p.entries[0].category, "scratch");
/// assert_eq!(p.entries[0].count, 3);
/// assert!((p.top_share(1).unwrap() - 60.0).abs() < 1e-9);
/// ```
pub fn pareto<S: AsRef<str>>(categories: &[Option<S>], top_n: usize) -> Result<Pareto> {
    if top_n == 0 {
        return Err(QualityError::invalid_argument("top_n must be at least 1"));
    }
    if categories.is_empty() {
        return Err(QualityError::insufficient("pareto categories", 1, 0));
    }

    // (first appearance, count)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, c) in categories.iter().enumerate() {
        let key = c.as_ref().map_or(BLANK_CATEGORY, |s| s.as_ref());
        counts.entry(key).or_insert((i, 0)).1 += 1;
    }
    let category_count = counts.len();

    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(k, (first, n))| (k, first, n)).collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
    ranked.truncate(top_n);

    let displayed: usize = ranked.iter().map(|r| r.2).sum();
    let mut cum_count = 0;
    let entries = ranked
        .into_iter()
        .map(|(category, _, count)| {
            cum_count += count;
            ParetoEntry {
                category: category.to_string(),
                count,
                cum_count,
                cum_pct: 100.0 * cum_count as f64 / displayed as f64,
            }
        })
        .collect();

    debug!(total = categories.len(), category_count, top_n, "pareto computed");
    Ok(Pareto {
        entries,
        total_count: categories.len(),
        category_count,
    })
}
