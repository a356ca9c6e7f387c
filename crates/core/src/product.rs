use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute keys the extractor knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductAttribute {
    Brand,
    Model,
    Color,
    Type,
    PartNumber,
}

impl ProductAttribute {
    pub const ALL: [ProductAttribute; 5] = [
        ProductAttribute::Brand,
        ProductAttribute::Model,
        ProductAttribute::Color,
        ProductAttribute::Type,
        ProductAttribute::PartNumber,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductAttribute::Brand => "brand",
            ProductAttribute::Model => "model",
            ProductAttribute::Color => "color",
            ProductAttribute::Type => "type",
            ProductAttribute::PartNumber => "part_number",
        }
    }
}

impl fmt::Display for ProductAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductAttribute {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand" => Ok(ProductAttribute::Brand),
            "model" => Ok(ProductAttribute::Model),
            "color" => Ok(ProductAttribute::Color),
            "type" => Ok(ProductAttribute::Type),
            "part_number" => Ok(ProductAttribute::PartNumber),
            other => Err(format!("Unknown product attribute: '{other}'")),
        }
    }
}

/// At most one value per attribute. A missing key means "not determined";
/// there are no placeholder values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProductInfo(BTreeMap<ProductAttribute, String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Text(String),
    #[allow(dead_code)]
    Other(serde::de::IgnoredAny),
}

// Keys written by newer versions are skipped rather than rejected, whatever
// their value looks like.
impl<'de> Deserialize<'de> for ProductInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, StoredValue>::deserialize(deserializer)?;
        let mut info = ProductInfo::new();
        for (key, value) in raw {
            if let (Ok(attr), StoredValue::Text(text)) = (key.parse::<ProductAttribute>(), value) {
                info.set(attr, text);
            }
        }
        Ok(info)
    }
}

impl ProductInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attr: ProductAttribute) -> Option<&str> {
        self.0.get(&attr).map(String::as_str)
    }

    /// Sets `attr`, replacing any earlier value. Blank values are ignored.
    pub fn set(&mut self, attr: ProductAttribute, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.0.insert(attr, trimmed.to_string());
        }
    }

    pub fn with(mut self, attr: ProductAttribute, value: impl Into<String>) -> Self {
        self.set(attr, value);
        self
    }

    pub fn contains(&self, attr: ProductAttribute) -> bool {
        self.0.contains_key(&attr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductAttribute, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn attribute_roundtrip() {
        for attr in ProductAttribute::ALL {
            assert_eq!(ProductAttribute::from_str(&attr.to_string()).unwrap(), attr);
        }
        assert!(ProductAttribute::from_str("flavour").is_err());
    }

    #[test]
    fn blank_values_are_not_stored() {
        let mut info = ProductInfo::new();
        info.set(ProductAttribute::Color, "   ");
        assert!(info.is_empty());
        assert_eq!(info.get(ProductAttribute::Color), None);
    }

    #[test]
    fn attributes_are_independent() {
        let info = ProductInfo::new().with(ProductAttribute::Color, "Cyan");
        assert!(info.contains(ProductAttribute::Color));
        assert!(!info.contains(ProductAttribute::Brand));
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn serializes_as_flat_snake_case_map() {
        let info = ProductInfo::new()
            .with(ProductAttribute::Brand, "Epson")
            .with(ProductAttribute::PartNumber, "T252XL");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json, serde_json::json!({"brand": "Epson", "part_number": "T252XL"}));

        let back: ProductInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn unknown_keys_are_skipped_on_read() {
        let info: ProductInfo =
            serde_json::from_str(r#"{"brand": "HP", "capacity": "XL"}"#).unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info.get(ProductAttribute::Brand), Some("HP"));
    }

    #[test]
    fn non_string_values_are_skipped_on_read() {
        let info: ProductInfo = serde_json::from_str(
            r#"{"brand": "HP", "dims": {"w": 1}, "pack": [1, 2], "model": 63, "color": null}"#,
        )
        .unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info.get(ProductAttribute::Brand), Some("HP"));
    }
}
