use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::core::{
    DocumentHeader, InvoiceItem, LegalForm, OrgRole, Organization, ProvodkaError,
    parse_ru_decimal, parse_ru_decimal_opt,
};
use crate::xml::{XmlNode, parse_xml_bytes, safe_text};

/// Parse an extracted customer-invoice archive into a [`DocumentHeader`].
///
/// # Errors
///
/// [`ProvodkaError::Parsing`] when no invoice XML is present, when the
/// document number, date, seller or buyer cannot be located, or when the
/// tabular part yields no line items.
pub fn parse(extract_dir: &Path) -> Result<DocumentHeader, ProvodkaError> {
    info!(dir = %extract_dir.display(), "parsing customer invoice archive");

    let xml_path = find_invoice_xml(extract_dir)?;
    debug!(file = %xml_path.display(), "invoice XML located");

    let bytes = fs::read(&xml_path)?;
    let root = parse_xml_bytes(&bytes)?;

    let doc = root
        .find("Документ")
        .ok_or_else(|| ProvodkaError::Parsing("Документ element not found".into()))?;

    let number = safe_text(doc.child("Номер"))
        .ok_or_else(|| ProvodkaError::Parsing("invoice number (Номер) not found".into()))?
        .to_owned();
    let date_raw = safe_text(doc.child("Дата"))
        .ok_or_else(|| ProvodkaError::Parsing("invoice date (Дата) not found".into()))?;
    let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d").map_err(|_| {
        ProvodkaError::Parsing(format!("invoice date '{date_raw}' is not ГГГГ-ММ-ДД"))
    })?;
    let total_sum = parse_ru_decimal_opt(safe_text(doc.child("Сумма")), "Сумма")?;

    let (seller, buyer) = parse_contractors(doc)?;
    let items = parse_items(doc, &root)?;

    let total_without_vat: Decimal = items.iter().map(|i| i.amount).sum();
    let total_vat: Decimal = items.iter().map(|i| i.vat_amount).sum();
    let total = if total_sum > Decimal::ZERO {
        total_sum
    } else {
        items.iter().map(|i| i.total).sum()
    };

    let header = DocumentHeader {
        number,
        date,
        seller,
        buyer,
        items,
        currency_code: "643".into(),
        total_without_vat,
        total_vat,
        total,
        requisite_number: None,
    };
    header.validate()?;

    info!(number = %header.number, items = header.items.len(), "customer invoice parsed");
    Ok(header)
}

/// Locate the primary invoice XML: any `.xml` besides `meta.xml`/`card.xml`
/// whose lowercased name mentions the счет.
fn find_invoice_xml(extract_dir: &Path) -> Result<PathBuf, ProvodkaError> {
    let mut pending = vec![extract_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_lowercase();
            if name.ends_with(".xml")
                && name != "meta.xml"
                && name != "card.xml"
                && (name.contains("schet") || name.contains("счет"))
            {
                return Ok(path);
            }
        }
    }
    Err(ProvodkaError::Parsing(
        "invoice XML not found in the archive".into(),
    ))
}

// ---------------------------------------------------------------------------
// Contractors
// ---------------------------------------------------------------------------

fn parse_contractors(doc: &XmlNode) -> Result<(Organization, Organization), ProvodkaError> {
    let mut seller = None;
    let mut buyer = None;

    let mut contractors = Vec::new();
    doc.descendants_named("Контрагент", &mut contractors);
    for contractor in contractors {
        let Some(role_text) = safe_text(contractor.child("Роль")) else {
            continue;
        };
        let role = match role_text {
            "Продавец" => OrgRole::Seller,
            "Покупатель" => OrgRole::Buyer,
            _ => continue,
        };
        let org = parse_contractor(contractor, role)?;
        match role {
            OrgRole::Seller => seller = Some(org),
            OrgRole::Buyer => buyer = Some(org),
            _ => unreachable!(),
        }
    }

    let seller = seller
        .ok_or_else(|| ProvodkaError::Parsing("seller (Продавец) not found in the document".into()))?;
    let buyer = buyer
        .ok_or_else(|| ProvodkaError::Parsing("buyer (Покупатель) not found in the document".into()))?;
    Ok((seller, buyer))
}

/// The contractor `Ид` carries "ИНН_КПП" for legal entities and a bare INN
/// for sole proprietors.
fn parse_contractor(contractor: &XmlNode, role: OrgRole) -> Result<Organization, ProvodkaError> {
    let id = safe_text(contractor.child("Ид")).ok_or_else(|| {
        ProvodkaError::Parsing(format!("{}: contractor Ид not found", role.label()))
    })?;

    let (inn, kpp) = match id.split_once('_') {
        Some((inn, kpp)) => (inn.trim(), Some(kpp.trim()).filter(|k| !k.is_empty())),
        None => (id.trim(), None),
    };
    let legal_form = LegalForm::from_inn(inn).ok_or_else(|| {
        ProvodkaError::Parsing(format!(
            "{}: contractor Ид '{id}' does not start with a 10- or 12-digit INN",
            role.label()
        ))
    })?;

    let name = safe_text(contractor.child("Наименование"))
        .or_else(|| safe_text(contractor.child("ПолноеНаименование")))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Контрагент ({})", role.label()));

    let org = Organization {
        role,
        legal_form,
        name,
        inn: inn.to_owned(),
        // Sole proprietors never carry a KPP even when the Ид has a suffix.
        kpp: match legal_form {
            LegalForm::LegalEntity => kpp.map(str::to_owned),
            LegalForm::SoleProprietor => None,
        },
        address: None,
    };
    org.validate()?;
    Ok(org)
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CatalogEntry {
    name: Option<String>,
    article: Option<String>,
}

fn parse_items(doc: &XmlNode, root: &XmlNode) -> Result<Vec<InvoiceItem>, ProvodkaError> {
    let mut products = Vec::new();
    root.descendants_named("Товар", &mut products);
    // Catalog entries describe the product; the row-level Товар elements only
    // hold an id string and have no children, so they drop out here.
    let catalog: Vec<&XmlNode> = products
        .into_iter()
        .filter(|p| !p.children.is_empty())
        .collect();

    let mut items = Vec::new();
    if let Some(table) = doc.find("ТабличнаяЧасть") {
        let index = build_catalog_index(&catalog);
        for (i, row) in table.children_named("СтрокаТабличнойЧасти").enumerate() {
            items.push(parse_table_row(row, &index, (i + 1) as u32)?);
        }
    }

    if items.is_empty() && !catalog.is_empty() {
        warn!("tabular part missing or empty, reading amounts from catalog entries");
        for (i, product) in catalog.iter().enumerate() {
            items.push(parse_catalog_product(product, (i + 1) as u32)?);
        }
    }

    if items.is_empty() {
        return Err(ProvodkaError::Parsing(
            "the invoice contains no line items".into(),
        ));
    }
    Ok(items)
}

fn build_catalog_index(catalog: &[&XmlNode]) -> HashMap<String, CatalogEntry> {
    let mut index = HashMap::new();
    for product in catalog {
        let name = safe_text(product.child("Наименование")).map(str::to_owned);
        let article = safe_text(product.child("Артикул")).map(str::to_owned);

        let mut id = None;
        if let Some(requisites) = product.child("ЗначенияРеквизитов") {
            for req in requisites.children_named("ЗначениеРеквизита") {
                if safe_text(req.child("Наименование")) == Some("Для1С_Идентификатор") {
                    id = safe_text(req.child("Значение")).map(|v| v.replace("##", ""));
                    break;
                }
            }
        }
        let key = id.or_else(|| name.clone());
        if let Some(key) = key {
            index.insert(key, CatalogEntry { name, article });
        }
    }
    index
}

fn parse_table_row(
    row: &XmlNode,
    catalog: &HashMap<String, CatalogEntry>,
    line_number: u32,
) -> Result<InvoiceItem, ProvodkaError> {
    let product_id = safe_text(row.child("Товар")).unwrap_or_default();
    let entry = catalog.get(product_id);

    let name = entry
        .and_then(|e| e.name.clone())
        .unwrap_or_else(|| format!("Товар {line_number}"));
    let article = entry.and_then(|e| e.article.clone());

    let quantity = match safe_text(row.child("Количество")) {
        Some(raw) => parse_ru_decimal(raw, "Количество")?,
        None => Decimal::ONE,
    };
    let price = parse_ru_decimal_opt(safe_text(row.child("Цена")), "Цена")?;
    let amount = match safe_text(row.child("Сумма")) {
        Some(raw) => parse_ru_decimal(raw, "Сумма")?,
        None => quantity * price,
    };
    let vat_rate = safe_text(row.child("СтавкаНДС")).map(str::to_owned);
    let vat_amount = parse_ru_decimal_opt(safe_text(row.child("СуммаНДС")), "СуммаНДС")?;
    let total = match safe_text(row.child("Всего")) {
        Some(raw) => parse_ru_decimal(raw, "Всего")?,
        None => amount + vat_amount,
    };

    debug!(line = line_number, %name, ?article, %quantity, "parsed invoice row");
    Ok(InvoiceItem {
        line_number,
        name,
        article,
        quantity,
        price,
        unit: safe_text(row.child("Единица")).map(str::to_owned),
        amount,
        vat_rate,
        vat_amount,
        total,
    })
}

fn parse_catalog_product(
    product: &XmlNode,
    line_number: u32,
) -> Result<InvoiceItem, ProvodkaError> {
    let name = safe_text(product.child("Наименование"))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Товар {line_number}"));
    let article = safe_text(product.child("Артикул")).map(str::to_owned);

    let quantity = match safe_text(product.child("Количество")) {
        Some(raw) => parse_ru_decimal(raw, "Количество")?,
        None => Decimal::ONE,
    };
    let gross_price =
        parse_ru_decimal_opt(safe_text(product.child("ЦенаЗаЕдиницу")), "ЦенаЗаЕдиницу")?;
    let sum = parse_ru_decimal_opt(safe_text(product.child("Сумма")), "Сумма")?;

    let mut vat_rate = Some("20%".to_owned());
    let mut vat_amount = Decimal::ZERO;
    if let Some(tax) = product.find("Налоги/Налог") {
        if let Some(rate) = safe_text(tax.child("Ставка")) {
            vat_rate = Some(format!("{rate}%"));
        }
        vat_amount = parse_ru_decimal_opt(safe_text(tax.child("Сумма")), "Сумма")?;
    }

    // When the tax block marks VAT as included, Сумма and ЦенаЗаЕдиницу are
    // gross; derive the net amount and unit price from them.
    let amount = if vat_amount > Decimal::ZERO {
        sum - vat_amount
    } else {
        sum
    };
    let price = if quantity > Decimal::ZERO && (quantity * gross_price - amount).abs() > Decimal::new(1, 2)
    {
        (amount / quantity).round_dp(6)
    } else {
        gross_price
    };
    let total = amount + vat_amount;

    debug!(line = line_number, %name, ?article, "parsed catalog product as line");
    Ok(InvoiceItem {
        line_number,
        name,
        article,
        quantity,
        price,
        unit: None,
        amount,
        vat_rate,
        vat_amount,
        total,
    })
}
