use serde::Serialize;
use snowdex_contracts::plain::to_plain_json;
use snowdex_contracts::{AttributeValue, Document, FilterCriterion};

pub const PRODUCTS_ATTRIBUTE: &str = "Products";

/// The fixed set of product identifiers accepted by search. The term ends up
/// as an attribute name in the store filter, so nothing outside this set may
/// reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductTerm {
    SnowBlock,
    SnowBall,
    EnchantedSnowBlock,
}

impl ProductTerm {
    pub const ALL: [ProductTerm; 3] = [
        ProductTerm::SnowBlock,
        ProductTerm::SnowBall,
        ProductTerm::EnchantedSnowBlock,
    ];

    /// Exact, case-sensitive match against the allow-list.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SNOW_BLOCK" => Some(ProductTerm::SnowBlock),
            "SNOW_BALL" => Some(ProductTerm::SnowBall),
            "ENCHANTED_SNOW_BLOCK" => Some(ProductTerm::EnchantedSnowBlock),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductTerm::SnowBlock => "SNOW_BLOCK",
            ProductTerm::SnowBall => "SNOW_BALL",
            ProductTerm::EnchantedSnowBlock => "ENCHANTED_SNOW_BLOCK",
        }
    }

    pub fn filter(self) -> FilterCriterion {
        FilterCriterion::contains_key(PRODUCTS_ATTRIBUTE, self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultEntry {
    pub product: serde_json::Value,
}

pub(super) fn first_query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Pulls `document["Products"][term]` out of every document that has it.
///
/// Documents the store matched but that lack a nested map under `Products`,
/// or lack the key inside it, are skipped without signalling a partial result.
pub fn extract_products(documents: &[Document], term: ProductTerm) -> Vec<SearchResultEntry> {
    documents
        .iter()
        .filter_map(|document| {
            document
                .get(PRODUCTS_ATTRIBUTE)
                .and_then(AttributeValue::as_map)
                .and_then(|products| products.get(term.as_str()))
        })
        .map(|product| SearchResultEntry {
            product: to_plain_json(product),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn doc_with_products(products: Vec<(&str, AttributeValue)>) -> Document {
        Document::from([(
            PRODUCTS_ATTRIBUTE.to_string(),
            AttributeValue::M(
                products
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect::<BTreeMap<_, _>>(),
            ),
        )])
    }

    fn priced(price: &str) -> AttributeValue {
        AttributeValue::M(BTreeMap::from([(
            "price".to_string(),
            AttributeValue::N(price.to_string()),
        )]))
    }

    #[test]
    fn allow_list_is_exact_and_case_sensitive() {
        for term in ProductTerm::ALL {
            assert_eq!(ProductTerm::parse(term.as_str()), Some(term));
        }
        for raw in [
            "",
            "snow_ball",
            "SNOW_BALL ",
            " SNOW_BALL",
            "SNOW",
            "SNOW_BALLS",
            "Products",
            "#productKey",
        ] {
            assert_eq!(ProductTerm::parse(raw), None, "{raw:?} must be rejected");
        }
    }

    #[test]
    fn filter_targets_products_map_key() {
        assert_eq!(
            ProductTerm::EnchantedSnowBlock.filter(),
            FilterCriterion {
                attribute_path: "Products".to_string(),
                key: "ENCHANTED_SNOW_BLOCK".to_string(),
            }
        );
    }

    #[test]
    fn first_query_value_takes_first_occurrence() {
        let pairs = vec![
            ("x".to_string(), "1".to_string()),
            ("q".to_string(), "SNOW_BALL".to_string()),
            ("q".to_string(), "SNOW_BLOCK".to_string()),
        ];
        assert_eq!(first_query_value(&pairs, "q"), Some("SNOW_BALL"));
        assert_eq!(first_query_value(&pairs, "missing"), None);
    }

    #[test]
    fn extraction_reshapes_matching_products() {
        let documents = vec![doc_with_products(vec![
            ("SNOW_BALL", priced("5")),
            ("SNOW_BLOCK", priced("9")),
        ])];

        let entries = extract_products(&documents, ProductTerm::SnowBall);
        assert_eq!(
            entries,
            vec![SearchResultEntry {
                product: serde_json::json!({"price": 5}),
            }]
        );
    }

    #[test]
    fn extraction_skips_documents_without_the_key() {
        let documents = vec![
            doc_with_products(vec![("SNOW_BLOCK", priced("9"))]),
            Document::from([(
                PRODUCTS_ATTRIBUTE.to_string(),
                AttributeValue::S("SNOW_BALL".to_string()),
            )]),
            Document::from([("id".to_string(), AttributeValue::S("x".to_string()))]),
            doc_with_products(vec![("SNOW_BALL", priced("2.5"))]),
        ];

        let entries = extract_products(&documents, ProductTerm::SnowBall);
        assert_eq!(
            entries,
            vec![SearchResultEntry {
                product: serde_json::json!({"price": 2.5}),
            }]
        );
        assert!(extract_products(&documents[..3], ProductTerm::SnowBall).is_empty());
    }
}
