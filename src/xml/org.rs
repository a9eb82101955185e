use tracing::debug;

use super::dom::XmlNode;
use crate::core::{LegalForm, OrgRole, Organization, ProvodkaError};

/// Parse an organization out of a УПД participant element (`СвПрод`,
/// `ГрузПолуч`, `СвПокуп`).
///
/// The element carries either a legal-entity block (`СвЮЛУч`) or a
/// sole-proprietor block (`СвИП`). Data lives in attributes in format 5.03
/// and in child elements in earlier versions, so each field is read
/// attribute-first with a child-element fallback.
pub fn parse_organization(elem: &XmlNode, role: OrgRole) -> Result<Organization, ProvodkaError> {
    if let Some(legal) = elem.find_first(&["ИдСв/СвЮЛУч", "СвЮЛУч"]) {
        let inn = attr_or_child(legal, "ИННЮЛ");
        if let Some(inn) = inn {
            let name = attr_or_child(legal, "НаимОрг").unwrap_or_else(|| "Не указано".into());
            let kpp = attr_or_child(legal, "КПП");
            debug!(role = role.label(), %name, %inn, "parsed legal entity");
            let org = Organization {
                role,
                legal_form: LegalForm::LegalEntity,
                name,
                inn,
                kpp,
                address: None,
            };
            org.validate()?;
            return Ok(org);
        }
        debug!(role = role.label(), "legal-entity block without INN, trying sole proprietor");
    }

    if let Some(ip) = elem.find_first(&["ИдСв/СвИП", "СвИП"]) {
        if let Some(inn) = ip.attr_nonempty("ИННФЛ").map(str::to_owned) {
            let name = fio_name(ip).unwrap_or_else(|| "Не указано".into());
            debug!(role = role.label(), %name, %inn, "parsed sole proprietor");
            let org = Organization {
                role,
                legal_form: LegalForm::SoleProprietor,
                name,
                inn,
                kpp: None,
                address: None,
            };
            org.validate()?;
            return Ok(org);
        }
    }

    Err(ProvodkaError::Parsing(format!(
        "could not determine the INN of the {} (neither СвЮЛУч nor СвИП carries one)",
        role.label()
    )))
}

fn attr_or_child(node: &XmlNode, name: &str) -> Option<String> {
    node.attr_nonempty(name)
        .or_else(|| node.child(name).and_then(XmlNode::text))
        .map(str::to_owned)
}

/// Assemble "Фамилия Имя Отчество" from the ФИО child element.
fn fio_name(ip: &XmlNode) -> Option<String> {
    let fio = ip.child("ФИО")?;
    let parts: Vec<&str> = ["Фамилия", "Имя", "Отчество"]
        .iter()
        .filter_map(|attr| fio.attr_nonempty(attr))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
