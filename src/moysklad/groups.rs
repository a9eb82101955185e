//! Product-group classification and the warehouse/project routing heuristic.
//!
//! Incoming items fall into one of two groups — профиль or трубы — decided by
//! keyword matching over the item name and article. A document is routed to
//! the warehouse and project of its majority group; ties go to профиль.

use serde::{Deserialize, Serialize};

use crate::core::{Config, GroupRouting, InvoiceItem};

/// The two product groups the business routes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductGroup {
    Profile,
    Tube,
}

const TUBE_KEYWORDS: [&str; 5] = ["труба", "трубы", "трубка", "трубный", "трубопровод"];
const PROFILE_KEYWORDS: [&str; 4] = ["профиль", "профили", "профильный", "профилированный"];

/// Keyword classifier: checks the name first, then the article; items
/// matching neither group count as профиль (consistent with the document
/// tie-break direction).
///
/// The routing logic takes any `Fn(&str, Option<&str>) -> ProductGroup`, so a
/// different classifier (say, one backed by the remote product folder) can be
/// swapped in without touching warehouse selection.
pub fn classify_by_keywords(name: &str, article: Option<&str>) -> ProductGroup {
    let name = name.to_lowercase();
    let article = article.map(str::to_lowercase).unwrap_or_default();

    for haystack in [&name, &article] {
        if TUBE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
            return ProductGroup::Tube;
        }
        if PROFILE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
            return ProductGroup::Profile;
        }
    }
    ProductGroup::Profile
}

/// Majority group of a document's items. Equal counts select
/// [`ProductGroup::Profile`] — preserved production behavior, pending
/// confirmation from the domain owner.
pub fn dominant_group<F>(items: &[InvoiceItem], classify: F) -> ProductGroup
where
    F: Fn(&str, Option<&str>) -> ProductGroup,
{
    let tube_count = items
        .iter()
        .filter(|i| classify(&i.name, i.article.as_deref()) == ProductGroup::Tube)
        .count();
    let profile_count = items.len() - tube_count;

    if tube_count > profile_count {
        ProductGroup::Tube
    } else {
        ProductGroup::Profile
    }
}

/// Warehouse/project names configured for a group.
pub fn routing_for(config: &Config, group: ProductGroup) -> &GroupRouting {
    match group {
        ProductGroup::Profile => &config.profile_routing,
        ProductGroup::Tube => &config.tube_routing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(name: &str, article: Option<&str>) -> InvoiceItem {
        InvoiceItem {
            line_number: 1,
            name: name.into(),
            article: article.map(Into::into),
            quantity: dec!(1),
            price: dec!(100),
            unit: None,
            amount: dec!(100),
            vat_rate: None,
            vat_amount: dec!(20),
            total: dec!(120),
        }
    }

    #[test]
    fn keywords_match_name() {
        assert_eq!(classify_by_keywords("Труба стальная 20х20", None), ProductGroup::Tube);
        assert_eq!(classify_by_keywords("Профиль 60х27", None), ProductGroup::Profile);
        assert_eq!(classify_by_keywords("ТРУБОПРОВОД напорный", None), ProductGroup::Tube);
    }

    #[test]
    fn keywords_fall_back_to_article() {
        assert_eq!(
            classify_by_keywords("Изделие 4", Some("труба-25")),
            ProductGroup::Tube
        );
    }

    #[test]
    fn unmatched_items_count_as_profile() {
        assert_eq!(classify_by_keywords("Саморез 3.5х25", None), ProductGroup::Profile);
    }

    #[test]
    fn majority_wins() {
        let items = vec![
            item("Труба 20х20", None),
            item("Труба 40х40", None),
            item("Профиль 60х27", None),
        ];
        assert_eq!(dominant_group(&items, classify_by_keywords), ProductGroup::Tube);
    }

    #[test]
    fn tie_selects_profile() {
        let items = vec![item("Труба 20х20", None), item("Профиль 60х27", None)];
        assert_eq!(dominant_group(&items, classify_by_keywords), ProductGroup::Profile);
    }

    #[test]
    fn empty_document_routes_to_profile() {
        assert_eq!(dominant_group(&[], classify_by_keywords), ProductGroup::Profile);
    }

    #[test]
    fn routing_lookup() {
        let config = crate::core::Config::new("t");
        assert_eq!(
            routing_for(&config, ProductGroup::Tube).warehouse,
            "Сестрорецк ПП"
        );
        assert_eq!(
            routing_for(&config, ProductGroup::Profile).project,
            "Профили"
        );
    }
}
