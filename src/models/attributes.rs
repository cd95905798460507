use serde::{Deserialize, Serialize};

use super::TermData;

/// Data as a provider hands it over: already structured, or still encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataField {
    Encoded(String),
    Structured(TermData),
}

impl DataField {
    /// Returns the structured form, decoding it first when needed.
    pub fn into_data(self) -> TermData {
        match self {
            Self::Encoded(encoded) => TermData::decode(&encoded),
            Self::Structured(data) => data,
        }
    }
}

/// Attributes of one search result, keyed by its combined id in a provider batch.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataField>,
    /// Usage count the provider already knows; skips the frequency lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    #[serde(
        default,
        rename = "providerlabel",
        alias = "providerLabel",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl TermAttributes {
    /// Creates attributes carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
