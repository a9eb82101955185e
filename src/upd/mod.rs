//! Universal transfer document (УПД) parsing.
//!
//! A УПД archive is an FNS document-exchange container: `meta.xml` points at
//! an external card (`card.xml`) and the main invoice body, both usually
//! encoded as windows-1251. The body follows the УПД 5.03 layout with field
//! placement varying between attributes and child elements across schema
//! versions.

mod parser;

pub use parser::parse;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::DocumentHeader;

/// Contents of `meta.xml`: the document-flow id and where the other files
/// live inside the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaInfo {
    pub doc_flow_id: String,
    pub main_document_path: String,
    pub card_path: String,
}

/// Contents of the external card: exchange identifiers and sender requisites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardInfo {
    pub external_identifier: String,
    pub title: String,
    pub date: Option<NaiveDateTime>,
    pub sender_inn: Option<String>,
    pub sender_kpp: Option<String>,
    pub sender_name: Option<String>,
}

/// A fully parsed УПД archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdDocument {
    pub meta: MetaInfo,
    pub card: CardInfo,
    pub header: DocumentHeader,
}

impl UpdDocument {
    /// Stable identifier of the document within the exchange.
    pub fn document_id(&self) -> &str {
        &self.card.external_identifier
    }
}
