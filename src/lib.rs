//! # u-quality
//!
//! Statistical process control (SPC) and measurement systems analysis (MSA)
//! engines for quality engineering.
//!
//! Every engine is a pure function of its inputs: it returns a complete,
//! self-contained result record or a [`QualityError`]. Results that are
//! merely undefined for the data (control limits with zero variation,
//! capability indices without a spec limit) are `Option` fields, not errors.
//!
//! ## Modules
//!
//! - [`spc`] — Control charts (I-MR, X̄-R, P, NP, C, U) and Nelson run rules R1-R4
//! - [`capability`] — Process capability indices (Cp, Cpk, Pp, Ppk, Cpm) and PPM
//! - [`msa`] — Crossed Gage R&R by two-way ANOVA
//! - [`pareto`] — Pareto analysis of categorical defects
//! - [`coerce`] — Cell-to-number coercion and column classifiers
//! - [`table`] — Immutable named-column input table
//! - [`analysis`] — Adapters from table columns to the engines
//! - [`options`] — Thresholds and requirements, loadable from JSON
//!
//! ## Design Philosophy
//!
//! - **Explicit failures**: insufficient or invalid data is rejected, never guessed
//! - **Numerical stability**: Leverages `u-numflow` for statistics and linear algebra
//! - **Research-backed**: All algorithms reference the SPC/MSA literature
//!
//! ## Logging
//!
//! Engines emit `tracing` events (`debug` on entry and exit, `warn` when
//! rows are dropped or dispersion is degenerate). The crate never installs
//! a subscriber.

pub mod analysis;
pub mod capability;
pub mod coerce;
pub mod error;
pub mod msa;
pub mod options;
pub mod pareto;
pub mod spc;
pub mod table;

pub use error::{QualityError, Result};
