//! Domain types, error taxonomy and numeric helpers.
//!
//! This module provides the schema-independent model both parsing pipelines
//! produce and the MoySklad reconciliation consumes. All monetary values use
//! [`rust_decimal::Decimal`] — never floating point.

mod config;
mod error;
mod numeric;
mod types;

pub use config::*;
pub use error::*;
pub use numeric::*;
pub use types::*;
