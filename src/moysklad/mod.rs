//! MoySklad (remap 1.2) integration.
//!
//! Entity search and creation for counterparties, products, warehouses and
//! projects, plus the document-creation sequences for both pipelines. The
//! warehouse/project routing heuristic lives in [`groups`]: items are
//! classified профиль/трубы by keywords, the majority group picks the
//! destination, and ties go to профиль.
//!
//! # Example
//!
//! ```ignore
//! use provodka::core::Config;
//! use provodka::moysklad::MoySkladClient;
//!
//! let client = MoySkladClient::new(&Config::new(token))?;
//! assert!(client.check_connection().await);
//! let outcome = client.create_customer_documents(&header).await?;
//! println!("created {}", outcome.document_url);
//! ```

pub mod entities;
pub mod groups;

#[cfg(feature = "sync")]
mod client;

pub use entities::{Meta, MetaRef, RemoteEntityRef};
pub use groups::{ProductGroup, classify_by_keywords, dominant_group, routing_for};

#[cfg(feature = "sync")]
pub use client::{
    MoySkladClient, SyncOutcome, customer_order_url, demand_url, facture_out_url,
    invoice_out_url,
};
