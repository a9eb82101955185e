use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::{CardInfo, MetaInfo, UpdDocument};
use crate::core::{
    DocumentHeader, InvoiceItem, OrgRole, ProvodkaError, first_digit_run, parse_ru_decimal,
    parse_ru_decimal_opt,
};
use crate::xml::{XmlNode, parse_organization, parse_xml_bytes, safe_text};

/// Parse an extracted УПД archive directory into an [`UpdDocument`].
///
/// # Errors
///
/// [`ProvodkaError::Parsing`] when `meta.xml` is absent, when a file it
/// points at is missing, or when a required field (document number, date,
/// seller INN, at least one line item) cannot be located through any known
/// fallback path.
pub fn parse(extract_dir: &Path) -> Result<UpdDocument, ProvodkaError> {
    info!(dir = %extract_dir.display(), "parsing УПД archive");

    let meta = parse_meta(extract_dir)?;
    let card = parse_card(extract_dir, &meta.card_path)?;
    let header = parse_body(extract_dir, &meta.main_document_path)?;

    info!(
        number = %header.number,
        seller_inn = %header.seller.inn,
        buyer_inn = %header.buyer.inn,
        items = header.items.len(),
        "УПД parsed"
    );

    Ok(UpdDocument { meta, card, header })
}

fn read_tree(path: &Path, what: &str) -> Result<XmlNode, ProvodkaError> {
    if !path.is_file() {
        return Err(ProvodkaError::Parsing(format!(
            "{what} not found in the archive: {}",
            path.display()
        )));
    }
    let bytes = fs::read(path)?;
    parse_xml_bytes(&bytes)
        .map_err(|e| ProvodkaError::Parsing(format!("{what}: {e}")))
}

// ---------------------------------------------------------------------------
// meta.xml
// ---------------------------------------------------------------------------

fn parse_meta(extract_dir: &Path) -> Result<MetaInfo, ProvodkaError> {
    let root = read_tree(&extract_dir.join("meta.xml"), "meta.xml")?;

    let doc_flow = root
        .find("DocFlow")
        .ok_or_else(|| ProvodkaError::Parsing("meta.xml: DocFlow element not found".into()))?;
    let doc_flow_id = doc_flow
        .attr_nonempty("Id")
        .ok_or_else(|| ProvodkaError::Parsing("meta.xml: DocFlow has no Id".into()))?;

    let main_document_path = root
        .find("MainImage")
        .and_then(|e| e.attr_nonempty("Path"))
        .ok_or_else(|| ProvodkaError::Parsing("meta.xml: MainImage path not found".into()))?;
    let card_path = root
        .find("ExternalCard")
        .and_then(|e| e.attr_nonempty("Path"))
        .ok_or_else(|| ProvodkaError::Parsing("meta.xml: ExternalCard path not found".into()))?;

    Ok(MetaInfo {
        doc_flow_id: doc_flow_id.to_owned(),
        main_document_path: main_document_path.to_owned(),
        card_path: card_path.to_owned(),
    })
}

// ---------------------------------------------------------------------------
// card.xml
// ---------------------------------------------------------------------------

fn parse_card(extract_dir: &Path, card_path: &str) -> Result<CardInfo, ProvodkaError> {
    let root = read_tree(&extract_dir.join(card_path), "card.xml")?;

    let external_identifier = root
        .find("Identifiers")
        .and_then(|e| e.attr_nonempty("ExternalIdentifier"))
        .unwrap_or_default()
        .to_owned();
    let description = root.find("Description");
    let title = description
        .and_then(|e| e.attr_nonempty("Title"))
        .unwrap_or_default()
        .to_owned();
    let date = description
        .and_then(|e| e.attr_nonempty("Date"))
        .and_then(parse_card_date);

    let abonent = root.find("Sender").and_then(|s| s.find("Abonent"));
    let attr_of = |name: &str| {
        abonent
            .and_then(|a| a.attr_nonempty(name))
            .map(str::to_owned)
    };

    Ok(CardInfo {
        external_identifier,
        title,
        date,
        sender_inn: attr_of("Inn"),
        sender_kpp: attr_of("Kpp"),
        sender_name: attr_of("Name"),
    })
}

fn parse_card_date(raw: &str) -> Option<NaiveDateTime> {
    let cleaned = raw.trim_end_matches('Z').replace('T', " ");
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(cleaned.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// Main body (УПД 5.03)
// ---------------------------------------------------------------------------

fn parse_body(extract_dir: &Path, main_path: &str) -> Result<DocumentHeader, ProvodkaError> {
    let root = read_tree(&extract_dir.join(main_path), "УПД body")?;

    if let Some(version) = root.attr("ВерсФорм") {
        if version != "5.03" {
            warn!(%version, "unexpected УПД format version, using generic field fallbacks");
        }
    }

    let fact = root.find("СвСчФакт").ok_or_else(|| {
        ProvodkaError::Parsing("СвСчФакт element not found in the УПД body".into())
    })?;

    // 5.03 keeps number and date in attributes; earlier revisions used child
    // elements.
    let number = fact
        .attr_nonempty("НомерДок")
        .map(str::to_owned)
        .or_else(|| child_text(fact, &["НомерСчФ", "НомерДок"]))
        .ok_or_else(|| ProvodkaError::Parsing("document number not found in СвСчФакт".into()))?;

    let date_raw = fact
        .attr_nonempty("ДатаДок")
        .map(str::to_owned)
        .or_else(|| child_text(fact, &["ДатаСчФ", "ДатаДок"]))
        .ok_or_else(|| ProvodkaError::Parsing("document date not found in СвСчФакт".into()))?;
    let date = parse_doc_date(&date_raw)?;

    let currency_code = fact
        .attr_nonempty("КодОКВ")
        .unwrap_or("643")
        .to_owned();

    let requisite_number = root
        .find_first(&["СвПродПер/СвПер/ОснПер", "ОснПер"])
        .and_then(|e| e.attr_nonempty("РеквНомерДок"))
        .map(|raw| first_digit_run(raw).unwrap_or_else(|| raw.trim().to_owned()));
    if let Some(ref n) = requisite_number {
        debug!(requisite_number = %n, "found счет number in the transfer requisites");
    }

    let seller_elem = root.find("СвПрод").ok_or_else(|| {
        ProvodkaError::Parsing("СвПрод (seller) element not found in the УПД body".into())
    })?;
    let seller = parse_organization(seller_elem, OrgRole::Seller)?;

    // The consignee block is what production documents actually fill; СвПокуп
    // is the fallback for bodies without a transfer part.
    let buyer_elem = root.find_first(&["ГрузПолуч", "СвПокуп"]).ok_or_else(|| {
        ProvodkaError::Parsing("neither ГрузПолуч nor СвПокуп found in the УПД body".into())
    })?;
    let buyer = parse_organization(buyer_elem, OrgRole::Buyer)?;

    let items = parse_items(&root)?;
    let (total_without_vat, total_vat, total) = parse_totals(&root, &items)?;

    let header = DocumentHeader {
        number,
        date,
        seller,
        buyer,
        items,
        currency_code,
        total_without_vat,
        total_vat,
        total,
        requisite_number,
    };
    header.validate()?;
    Ok(header)
}

fn child_text(node: &XmlNode, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| safe_text(node.child(n)))
        .map(str::to_owned)
}

fn parse_doc_date(raw: &str) -> Result<NaiveDate, ProvodkaError> {
    for format in ["%d.%m.%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), format) {
            return Ok(date);
        }
    }
    Err(ProvodkaError::Parsing(format!(
        "document date '{raw}' matches neither ДД.ММ.ГГГГ nor ГГГГ-ММ-ДД"
    )))
}

fn parse_items(root: &XmlNode) -> Result<Vec<InvoiceItem>, ProvodkaError> {
    let table = root.find("ТаблСчФакт").ok_or_else(|| {
        ProvodkaError::Parsing("ТаблСчФакт (tabular part) not found in the УПД body".into())
    })?;

    let mut items = Vec::new();
    for (i, elem) in table.children_named("СведТов").enumerate() {
        let line_number = (i + 1) as u32;
        let name = elem
            .attr_nonempty("НаимТов")
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Товар {line_number}"));

        let quantity = match elem.attr_nonempty("КолТов") {
            Some(raw) => parse_ru_decimal(raw, "КолТов")?,
            None => Decimal::ONE,
        };
        let price = parse_ru_decimal_opt(elem.attr_nonempty("ЦенаТов"), "ЦенаТов")?;
        let amount = match elem.attr_nonempty("СтТовБезНДС") {
            Some(raw) => parse_ru_decimal(raw, "СтТовБезНДС")?,
            None => quantity * price,
        };
        let vat_rate = elem.attr_nonempty("НалСт").map(str::to_owned);
        let vat_amount =
            parse_ru_decimal_opt(safe_text(elem.find("СумНал/СумНал")), "СумНал")?;
        let total = match elem.attr_nonempty("СтТовУчНал") {
            Some(raw) => parse_ru_decimal(raw, "СтТовУчНал")?,
            None => amount + vat_amount,
        };

        let article = elem
            .child("ДопСведТов")
            .and_then(|e| e.attr_nonempty("КодТов"))
            .map(str::to_owned);
        let unit = elem.attr_nonempty("ОКЕИ_Тов").map(str::to_owned);

        debug!(line = line_number, %name, ?article, %quantity, "parsed УПД line");
        items.push(InvoiceItem {
            line_number,
            name,
            article,
            quantity,
            price,
            unit,
            amount,
            vat_rate,
            vat_amount,
            total,
        });
    }

    if items.is_empty() {
        return Err(ProvodkaError::Parsing(
            "УПД tabular part contains no СведТов lines".into(),
        ));
    }
    Ok(items)
}

/// Totals from `ВсегоОпл`, attribute-first with child-element fallback;
/// computed from the lines when the element is absent entirely.
fn parse_totals(
    root: &XmlNode,
    items: &[InvoiceItem],
) -> Result<(Decimal, Decimal, Decimal), ProvodkaError> {
    let Some(totals) = root.find("ВсегоОпл") else {
        let without_vat = items.iter().map(|i| i.amount).sum();
        let vat = items.iter().map(|i| i.vat_amount).sum();
        let with_vat = items.iter().map(|i| i.total).sum();
        return Ok((without_vat, vat, with_vat));
    };

    let field = |attr: &str| -> Option<String> {
        totals
            .attr_nonempty(attr)
            .map(str::to_owned)
            .or_else(|| safe_text(totals.child(attr)).map(str::to_owned))
    };

    let without_vat =
        parse_ru_decimal_opt(field("СтТовБезНДСВсего").as_deref(), "СтТовБезНДСВсего")?;
    let with_vat = match field("СтТовУчНалВсего") {
        Some(raw) => parse_ru_decimal(&raw, "СтТовУчНалВсего")?,
        None => items.iter().map(|i| i.total).sum(),
    };
    let vat = match safe_text(totals.find("СумНал")) {
        Some(raw) => parse_ru_decimal(raw, "СумНал")?,
        None => items.iter().map(|i| i.vat_amount).sum(),
    };

    Ok((without_vat, vat, with_vat))
}
