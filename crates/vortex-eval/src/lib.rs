//! # Vortex-Eval
//!
//! Evaluation layer for the Vortex motor-imagery decoder.
//!
//! Composes the CSP filter bank with an opaque classifier capability into a
//! classification pipeline, and drives that pipeline across subjects,
//! run-types and stratified cross-validation folds. Fold accuracies
//! aggregate into per-run-type means and one final scalar score; skipped
//! combinations stay visible in the report instead of silently biasing it.

pub mod classifier;
pub mod folds;
pub mod harness;
pub mod pipeline;
pub mod report;

pub use classifier::*;
pub use folds::*;
pub use harness::*;
pub use pipeline::*;
pub use report::*;
