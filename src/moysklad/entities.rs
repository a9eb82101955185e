//! JSON shapes of the MoySklad remap 1.2 API — only the fields the
//! reconciliation actually reads or writes.

use serde::{Deserialize, Serialize};

/// MoySklad object reference metadata. Echoed back verbatim when linking
/// entities into document payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub href: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(rename = "mediaType", default = "json_media_type")]
    pub media_type: String,
}

fn json_media_type() -> String {
    "application/json".to_string()
}

/// `{"meta": {...}}` wrapper used for every entity link in a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRef {
    pub meta: Meta,
}

/// A list response: MoySklad wraps collections in `{"rows": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Rows<T> {
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
}

/// A searchable dictionary entity row. Counterparties, own organizations,
/// products, stores and projects all share this shape for our purposes.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRow {
    pub meta: Meta,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub inn: Option<String>,
    #[serde(default)]
    pub kpp: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
}

/// A resolved mapping from a parsed entity to its MoySklad identifier.
/// Request-scoped: looked up or created per processing call, never cached
/// across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEntityRef {
    pub id: String,
    pub name: String,
    pub meta: Meta,
}

impl From<EntityRow> for RemoteEntityRef {
    fn from(row: EntityRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            meta: row.meta,
        }
    }
}

impl RemoteEntityRef {
    pub fn link(&self) -> MetaRef {
        MetaRef {
            meta: self.meta.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents read back from MoySklad
// ---------------------------------------------------------------------------

/// An entity linked from a document; only its meta (and sometimes name) is
/// delivered unless the request expanded it.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedEntity {
    pub meta: Meta,
    #[serde(default)]
    pub name: Option<String>,
}

/// An existing счет покупателю (invoiceout) looked up by number.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceOutRow {
    pub meta: Meta,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub store: Option<LinkedEntity>,
    #[serde(default)]
    pub project: Option<LinkedEntity>,
    #[serde(default)]
    pub positions: Option<PositionsBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionsBlock {
    #[serde(default = "Vec::new")]
    pub rows: Vec<PositionRow>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionRow {
    /// Price in kopecks.
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub assortment: Option<AssortmentRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssortmentRow {
    pub meta: Meta,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
}

/// Response to a document creation POST.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedDocument {
    pub meta: Meta,
    pub id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Payloads written to MoySklad
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CounterpartyPayload {
    pub name: String,
    pub inn: String,
    /// "legal" or "individual".
    #[serde(rename = "companyType")]
    pub company_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
}

/// One document line. Prices are kopecks, per the API.
#[derive(Debug, Clone, Serialize)]
pub struct PositionPayload {
    pub quantity: f64,
    pub price: i64,
    pub assortment: MetaRef,
    pub vat: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemandPayload {
    pub name: String,
    pub moment: String,
    pub organization: MetaRef,
    pub agent: MetaRef,
    pub store: MetaRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<MetaRef>,
    #[serde(rename = "vatEnabled")]
    pub vat_enabled: bool,
    #[serde(rename = "vatIncluded")]
    pub vat_included: bool,
    #[serde(rename = "invoicesOut", skip_serializing_if = "Option::is_none")]
    pub invoices_out: Option<Vec<MetaRef>>,
    pub positions: Vec<PositionPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactureOutPayload {
    pub name: String,
    pub moment: String,
    pub organization: MetaRef,
    pub agent: MetaRef,
    #[serde(rename = "vatEnabled")]
    pub vat_enabled: bool,
    #[serde(rename = "vatIncluded")]
    pub vat_included: bool,
    pub demands: Vec<MetaRef>,
    pub positions: Vec<PositionPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerOrderPayload {
    pub name: String,
    pub moment: String,
    pub organization: MetaRef,
    pub agent: MetaRef,
    pub store: MetaRef,
    pub project: MetaRef,
    #[serde(rename = "vatEnabled")]
    pub vat_enabled: bool,
    #[serde(rename = "vatIncluded")]
    pub vat_included: bool,
    pub positions: Vec<PositionPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceOutPayload {
    pub name: String,
    pub moment: String,
    pub organization: MetaRef,
    pub agent: MetaRef,
    pub store: MetaRef,
    pub project: MetaRef,
    #[serde(rename = "customerOrder", skip_serializing_if = "Option::is_none")]
    pub customer_order: Option<MetaRef>,
    pub positions: Vec<PositionPayload>,
}
