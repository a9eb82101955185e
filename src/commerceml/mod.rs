//! Customer invoice (счет покупателю) parsing — CommerceML 2 schema.
//!
//! The archive carries a 1С-exported XML whose file name contains "schet"
//! (or "счет"). Line items live in the document's tabular part and reference
//! the product catalog by the `Для1С_Идентификатор` requisite; older exports
//! omit the tabular part and keep amounts directly on the catalog entries.

mod parser;

pub use parser::parse;
