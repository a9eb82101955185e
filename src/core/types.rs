use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, ProvodkaError};

/// Which side of the document an organization occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrgRole {
    /// Продавец / поставщик.
    Seller,
    /// Покупатель.
    Buyer,
    /// Грузоотправитель.
    Consignor,
    /// Грузополучатель.
    Consignee,
}

impl OrgRole {
    /// Russian role label as it appears in CommerceML documents.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Seller => "Продавец",
            Self::Buyer => "Покупатель",
            Self::Consignor => "Грузоотправитель",
            Self::Consignee => "Грузополучатель",
        }
    }
}

/// Legal form of a party. УПД documents carry either a legal entity
/// (`СвЮЛУч`) or a sole proprietor (`СвИП`) block — a two-way branch,
/// not an open hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalForm {
    /// Юридическое лицо — 10-digit INN, KPP required.
    LegalEntity,
    /// Индивидуальный предприниматель — 12-digit INN, no KPP.
    SoleProprietor,
}

impl LegalForm {
    /// Infer the legal form from the INN length (10 → legal entity,
    /// 12 → sole proprietor).
    pub fn from_inn(inn: &str) -> Option<Self> {
        match inn.len() {
            10 => Some(Self::LegalEntity),
            12 => Some(Self::SoleProprietor),
            _ => None,
        }
    }
}

/// Postal address of an organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub postal_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
}

/// A party to the document: seller, buyer, consignor or consignee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub role: OrgRole,
    pub legal_form: LegalForm,
    pub name: String,
    /// Taxpayer identification number: 10 digits for legal entities,
    /// 12 for sole proprietors.
    pub inn: String,
    /// Tax registration reason code. Present iff the party is a legal entity.
    pub kpp: Option<String>,
    pub address: Option<Address>,
}

impl Organization {
    /// Check the INN/KPP invariants: INN length matches the legal form,
    /// digits only, and KPP is present exactly for legal entities.
    pub fn validate(&self) -> Result<(), ProvodkaError> {
        if !self.inn.chars().all(|c| c.is_ascii_digit()) {
            return Err(ProvodkaError::Parsing(format!(
                "{}: INN '{}' contains non-digit characters",
                self.role.label(),
                self.inn
            )));
        }
        let expected = match self.legal_form {
            LegalForm::LegalEntity => 10,
            LegalForm::SoleProprietor => 12,
        };
        if self.inn.len() != expected {
            return Err(ProvodkaError::Parsing(format!(
                "{}: INN '{}' has {} digits, expected {}",
                self.role.label(),
                self.inn,
                self.inn.len(),
                expected
            )));
        }
        match (self.legal_form, &self.kpp) {
            (LegalForm::LegalEntity, None) => Err(ProvodkaError::Parsing(format!(
                "{}: legal entity with INN {} is missing a KPP",
                self.role.label(),
                self.inn
            ))),
            (LegalForm::SoleProprietor, Some(_)) => Err(ProvodkaError::Parsing(format!(
                "{}: sole proprietor with INN {} must not carry a KPP",
                self.role.label(),
                self.inn
            ))),
            _ => Ok(()),
        }
    }
}

/// One line of the document's tabular part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub line_number: u32,
    pub name: String,
    /// Артикул (`КодТов` / `Артикул`).
    pub article: Option<String>,
    pub quantity: Decimal,
    /// Net price per unit.
    pub price: Decimal,
    pub unit: Option<String>,
    /// Net line amount (`СтТовБезНДС` / `Сумма`).
    pub amount: Decimal,
    /// VAT rate as it appears in the source, e.g. "20%".
    pub vat_rate: Option<String>,
    pub vat_amount: Decimal,
    /// Line total including VAT (`СтТовУчНал` / `Всего`).
    pub total: Decimal,
}

impl InvoiceItem {
    /// Check the line invariants: positive quantity and
    /// `amount ≈ quantity × price` within the rounding tolerance.
    pub fn validate(&self) -> Result<(), ProvodkaError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ProvodkaError::Parsing(format!(
                "line {} '{}': quantity {} is not positive",
                self.line_number, self.name, self.quantity
            )));
        }
        let computed = self.quantity * self.price;
        if !within_tolerance(computed, self.amount) {
            return Err(ProvodkaError::Parsing(format!(
                "line {} '{}': amount {} does not match quantity × price = {}",
                self.line_number, self.name, self.amount, computed
            )));
        }
        Ok(())
    }
}

/// Parsed document header: the schema-independent result of both parsing
/// pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub number: String,
    pub date: NaiveDate,
    pub seller: Organization,
    pub buyer: Organization,
    pub items: Vec<InvoiceItem>,
    /// ISO 4217 numeric code, "643" (RUB) unless the document says otherwise.
    pub currency_code: String,
    pub total_without_vat: Decimal,
    pub total_vat: Decimal,
    /// Grand total including VAT.
    pub total: Decimal,
    /// Счет number extracted from the transfer requisites (`РеквНомерДок`),
    /// used to link a УПД to an existing customer invoice in MoySklad.
    pub requisite_number: Option<String>,
}

impl DocumentHeader {
    /// Check that the grand total equals the sum of line totals within the
    /// rounding tolerance, and that every line holds its own invariants.
    pub fn validate(&self) -> Result<(), ProvodkaError> {
        for item in &self.items {
            item.validate()?;
        }
        let sum: Decimal = self.items.iter().map(|i| i.total).sum();
        if !within_tolerance(sum, self.total) {
            return Err(ProvodkaError::Parsing(format!(
                "document {}: grand total {} does not match sum of lines {}",
                self.number, self.total, sum
            )));
        }
        Ok(())
    }
}

/// Upload type hint supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Universal transfer document (FNS meta.xml + card.xml pair).
    Upd,
    /// Счет покупателю in CommerceML.
    CustomerInvoice,
}

/// Per-call reconciliation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Line items taken from the parsed document.
    pub items_processed: usize,
    /// Items resolved to an existing MoySklad product.
    pub items_matched: usize,
    /// Items for which a product had to be created.
    pub items_created: usize,
}

/// Outcome of one `process_document` call. Never an Err at the boundary:
/// every crate error is folded into a failed result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    /// Identifier of the primary created MoySklad document.
    pub document_id: Option<String>,
    /// Web-UI link to the created document.
    pub document_url: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    pub stats: ProcessingStats,
}

impl ProcessingResult {
    pub fn failure(error: &ProvodkaError) -> Self {
        Self {
            success: false,
            document_id: None,
            document_url: None,
            error_kind: Some(error.kind()),
            message: error.to_string(),
            stats: ProcessingStats::default(),
        }
    }

    pub fn success(
        document_id: String,
        document_url: Option<String>,
        message: String,
        stats: ProcessingStats,
    ) -> Self {
        Self {
            success: true,
            document_id: Some(document_id),
            document_url,
            error_kind: None,
            message,
            stats,
        }
    }
}

/// Rounding tolerance for amount comparisons: one kopeck.
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= dec!(0.01)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(role: OrgRole, inn: &str, kpp: Option<&str>) -> Organization {
        let legal_form = LegalForm::from_inn(inn).unwrap();
        Organization {
            role,
            legal_form,
            name: "Тест".into(),
            inn: inn.into(),
            kpp: kpp.map(Into::into),
            address: None,
        }
    }

    #[test]
    fn legal_entity_requires_kpp() {
        assert!(org(OrgRole::Seller, "7700000000", Some("770001001")).validate().is_ok());
        assert!(org(OrgRole::Seller, "7700000000", None).validate().is_err());
    }

    #[test]
    fn sole_proprietor_rejects_kpp() {
        assert!(org(OrgRole::Buyer, "500100200012", None).validate().is_ok());
        assert!(org(OrgRole::Buyer, "500100200012", Some("770001001")).validate().is_err());
    }

    #[test]
    fn inn_length_matches_legal_form() {
        assert!(LegalForm::from_inn("7700000000").is_some());
        assert!(LegalForm::from_inn("500100200012").is_some());
        assert!(LegalForm::from_inn("77000").is_none());
    }

    #[test]
    fn item_invariants() {
        let mut item = InvoiceItem {
            line_number: 1,
            name: "Профиль 60x27".into(),
            article: None,
            quantity: dec!(2),
            price: dec!(100),
            unit: None,
            amount: dec!(200),
            vat_rate: Some("20%".into()),
            vat_amount: dec!(40),
            total: dec!(240),
        };
        assert!(item.validate().is_ok());

        item.quantity = Decimal::ZERO;
        assert!(item.validate().is_err());

        item.quantity = dec!(2);
        item.amount = dec!(150);
        assert!(item.validate().is_err());
    }

    #[test]
    fn tolerance_is_one_kopeck() {
        assert!(within_tolerance(dec!(100.00), dec!(100.01)));
        assert!(!within_tolerance(dec!(100.00), dec!(100.02)));
    }
}
