//! Process capability analysis.
//!
//! Computes standard capability indices for assessing how well a process
//! meets specification limits, plus observed and expected defect rates.
//!
//! # Indices
//!
//! - **Cp**, **Cpk** — Short-term capability (sigma from the moving range)
//! - **Pp**, **Ppk** — Long-term performance (sample standard deviation)
//! - **Cpm** — Taguchi capability (target deviation)
//!
//! # Defect rates
//!
//! - Observed PPM from points outside the limits
//! - Expected PPM from a normal model with the overall sigma
//!
//! # References
//!
//! - Montgomery (2019), *Introduction to Statistical Quality Control*, 8th ed.

mod indices;

pub use indices::{compute, CapabilityDecision, CapabilityResult, SpecLimits};
