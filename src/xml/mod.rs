//! Shared XML machinery for both document schemas.
//!
//! An owned element tree with ordered fallback-path lookup replaces the
//! namespace guessing the source formats would otherwise force on every
//! caller, and the organization parser implements the legal-entity /
//! sole-proprietor branch used by every УПД participant element.

mod dom;
mod org;

pub use dom::{XmlNode, parse_xml_bytes, safe_text};
pub use org::parse_organization;
