//! Per-product display names and extra test numbers
//!
//! ```json
//! { "A12": { "product_name": "Widget", "XY_XL": "9001", "XY_Waf": "9005" } }
//! ```
//!
//! Package flows have no wafer map, so their reports also read the `XY_*`
//! coordinate tests listed for the product.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use stdfp_common::Result;

const COORDINATE_KEYS: [&str; 12] = [
    "XY_XL", "XY_XH", "XY_YL", "XY_YH", "XY_Waf", "XY_Lot0", "XY_Lot1", "XY_Lot2", "XY_Lot3",
    "XY_Lot4", "XY_Lot5", "XY_Lot6",
];

#[derive(Debug, Clone, Default)]
pub struct Personalization {
    products: HashMap<String, HashMap<String, Value>>,
}

impl Personalization {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let products = serde_json::from_str(text)?;
        Ok(Self { products })
    }

    /// Display name for `code`, the code itself when none is configured
    pub fn product_name(&self, code: &str) -> String {
        self.products
            .get(code)
            .and_then(|p| p.get("product_name"))
            .and_then(value_to_string)
            .unwrap_or_else(|| code.to_string())
    }

    /// Coordinate test numbers configured for `code`
    pub fn coordinate_tests(&self, code: &str) -> Vec<String> {
        let Some(product) = self.products.get(code) else {
            return Vec::new();
        };
        COORDINATE_KEYS
            .iter()
            .filter_map(|key| product.get(*key).and_then(value_to_string))
            .filter(|v| !v.is_empty())
            .collect()
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "A12": { "product_name": "Widget", "XY_XL": "9001", "XY_Waf": 9005, "XY_YH": "" },
        "B34": { "other": 1 }
    }"#;

    #[test]
    fn test_product_name_with_fallback() {
        let p = Personalization::parse(DOC).unwrap();
        assert_eq!(p.product_name("A12"), "Widget");
        assert_eq!(p.product_name("B34"), "B34");
        assert_eq!(p.product_name("C56"), "C56");
    }

    #[test]
    fn test_coordinate_tests_skip_empty_values() {
        let p = Personalization::parse(DOC).unwrap();
        assert_eq!(p.coordinate_tests("A12"), vec!["9001", "9005"]);
        assert!(p.coordinate_tests("C56").is_empty());
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(Personalization::parse("[1, 2]").is_err());
    }
}
