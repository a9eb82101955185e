//! # provodka
//!
//! Ingestion of Russian electronic accounting documents with MoySklad
//! synchronization: УПД archives (FNS document-exchange containers) and
//! customer invoices (CommerceML), parsed into a common domain model and
//! pushed into MoySklad as counterparties, products and documents.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//!
//! ## Quick Start
//!
//! ```ignore
//! use provodka::core::{Config, DocumentKind};
//! use provodka::processor::Processor;
//!
//! let processor = Processor::new(Config::from_env()?)?;
//! let result = processor
//!     .process(&zip_bytes, "upd.zip", DocumentKind::Upd)
//!     .await;
//! if result.success {
//!     println!("created {}", result.document_url.unwrap());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Domain model, archive handling, both parsers |
//! | `sync` (default) | MoySklad client and the document processors |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod archive;

#[cfg(feature = "core")]
pub mod xml;

#[cfg(feature = "core")]
pub mod upd;

#[cfg(feature = "core")]
pub mod commerceml;

#[cfg(feature = "core")]
pub mod moysklad;

#[cfg(feature = "sync")]
pub mod processor;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
