//! Measurement Systems Analysis (MSA).
//!
//! # Gage R&R
//!
//! - [`gage_rr`] — crossed study by the ANOVA method
//! - [`InteractionTerm`] — fold the part x operator interaction into
//!   reproducibility (default) or report it separately
//!
//! # ANOVA
//!
//! - [`two_way_anova`] — Type II two-way crossed ANOVA table
//!
//! # References
//!
//! - AIAG (2010). *Measurement Systems Analysis Reference Manual*, 4th ed.

mod anova;
mod gage_rr;

pub use anova::{two_way_anova, AnovaRow, AnovaSource, TwoWayAnova};
pub use gage_rr::{gage_rr, GageRrResult, GrrVerdict, InteractionTerm};
