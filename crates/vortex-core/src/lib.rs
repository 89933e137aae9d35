//! # Vortex-Core
//!
//! Core types and error handling for the Vortex motor-imagery decoder.
//!
//! This crate defines the data model shared by the spatial-filtering and
//! evaluation crates: labeled trials, trial sets, subject and run-type
//! identifiers, and the common error taxonomy.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
