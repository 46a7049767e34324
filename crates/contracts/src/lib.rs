use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub mod plain;

/// A store-native value, serialized in the tagged form used by DynamoDB
/// (`{"S": "..."}`, `{"N": "5"}`, `{"M": {...}}`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers travel as their decimal string, exactly as the store returned them.
    #[serde(rename = "N")]
    N(String),
    /// Binary values travel base64-encoded, as in DynamoDB JSON.
    #[serde(rename = "B", with = "base64_bytes")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS", with = "base64_bytes_list")]
    Bs(Vec<Vec<u8>>),
}

impl AttributeValue {
    pub fn as_map(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            AttributeValue::M(map) => Some(map),
            _ => None,
        }
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_list {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for bytes in values {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|raw| STANDARD.decode(raw).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// One record of the backing table.
pub type Document = BTreeMap<String, AttributeValue>;

/// Server-side condition: the attribute at `attribute_path`, read as a nested
/// map, contains `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriterion {
    pub attribute_path: String,
    pub key: String,
}

impl FilterCriterion {
    pub fn contains_key(attribute_path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            attribute_path: attribute_path.into(),
            key: key.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        document
            .get(&self.attribute_path)
            .and_then(AttributeValue::as_map)
            .is_some_and(|map| map.contains_key(&self.key))
    }
}
