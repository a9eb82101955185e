//! Document processors — the crate's input boundary.
//!
//! A processor runs one upload through
//! `Received → Validated → Extracted → Parsed → Reconciled → Committed`,
//! with cleanup of the temp file and extraction directory guaranteed on the
//! way out of `Extracted` regardless of where the call ends up. No error
//! escapes [`Processor::process`]; the bot layer only ever sees a
//! [`ProcessingResult`].

pub mod common;

mod customer_invoice;
mod upd;

pub use customer_invoice::CustomerInvoiceProcessor;
pub use upd::UpdProcessor;

use crate::core::{Config, DocumentKind, ProcessingResult, ProvodkaError};

/// Dispatching facade over the two document processors.
pub struct Processor {
    upd: UpdProcessor,
    customer_invoice: CustomerInvoiceProcessor,
}

impl Processor {
    pub fn new(config: Config) -> Result<Self, ProvodkaError> {
        Ok(Self {
            upd: UpdProcessor::new(config.clone())?,
            customer_invoice: CustomerInvoiceProcessor::new(config)?,
        })
    }

    /// Process one uploaded archive of the given kind.
    pub async fn process(
        &self,
        file_bytes: &[u8],
        filename: &str,
        kind: DocumentKind,
    ) -> ProcessingResult {
        match kind {
            DocumentKind::Upd => self.upd.process(file_bytes, filename).await,
            DocumentKind::CustomerInvoice => {
                self.customer_invoice.process(file_bytes, filename).await
            }
        }
    }

    /// Reachability/auth probe against MoySklad. Never errors.
    pub async fn check_remote_connection(&self) -> bool {
        self.upd.check_remote_connection().await
    }
}
