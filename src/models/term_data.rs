//! Structured data attached to a term and its `key:value;key:value` codec.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::escape::{
    TEXT_RESERVED, VALUE_RESERVED, escape, split_once_unescaped, split_unescaped, unescape,
};
use crate::error::TermError;

/// Key holding a latitude/longitude pair.
pub const GEOCODE_KEY: &str = "geocode";
/// Key holding an image reference.
pub const IMAGE_KEY: &str = "image";
/// Legacy key mirroring the secondary id of a dual term.
pub const ALT_ID_KEY: &str = "altId";
/// Legacy key mirroring the secondary provider of a dual term.
pub const ALT_PROVIDER_KEY: &str = "altProvider";

/// A latitude/longitude pair, kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geocode {
    #[serde(deserialize_with = "string_or_number")]
    latitude: String,
    #[serde(deserialize_with = "string_or_number")]
    longitude: String,
}

impl Geocode {
    pub fn new(latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }

    /// Parses `lat x lon`, requiring exactly two numeric components.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::MalformedGeocode`] for any other shape.
    pub fn parse(value: &str) -> Result<Self, TermError> {
        let coords: Vec<&str> = value.split('x').map(str::trim).collect();
        match coords.as_slice() {
            [lat, lon] if lat.parse::<f64>().is_ok() && lon.parse::<f64>().is_ok() => {
                Ok(Self::new(*lat, *lon))
            }
            _ => Err(TermError::MalformedGeocode {
                value: value.to_string(),
            }),
        }
    }

    pub fn latitude(&self) -> &str {
        &self.latitude
    }

    pub fn longitude(&self) -> &str {
        &self.longitude
    }
}

impl fmt::Display for Geocode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.latitude, self.longitude)
    }
}

/// One value in a term's data map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Text(String),
    Number(serde_json::Number),
    Geocode(Geocode),
    /// Encoded joined by commas; decoding never produces it.
    List(Vec<String>),
    /// Any other JSON a provider sends, encoded as its JSON text.
    Other(serde_json::Value),
}

impl DataValue {
    /// Returns the value when it is plain text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Text(text) => escape(text, VALUE_RESERVED),
            Self::Number(number) => number.to_string(),
            Self::Geocode(geocode) => geocode.to_string(),
            Self::List(items) => items
                .iter()
                .map(|item| escape(item, VALUE_RESERVED))
                .collect::<Vec<_>>()
                .join(","),
            Self::Other(value) => escape(&value.to_string(), VALUE_RESERVED),
        }
    }

    /// Returns the text this value decodes back to under a plain key.
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
            Self::Geocode(geocode) => geocode.to_string(),
            Self::List(items) => items.join(","),
            Self::Other(value) => value.to_string(),
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Geocode> for DataValue {
    fn from(value: Geocode) -> Self {
        Self::Geocode(value)
    }
}

/// Ordered key/value attributes of a term.
///
/// Keys keep their insertion order so encoding is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermData(IndexMap<String, DataValue>);

impl TermData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `key:value;key:value`, logging and skipping malformed entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmerge::TermData;
    ///
    /// let data = TermData::decode("geocode:40.7x-74.0;population:8000000");
    /// let geocode = data.geocode().unwrap();
    /// assert_eq!(geocode.latitude(), "40.7");
    /// assert_eq!(geocode.longitude(), "-74.0");
    /// assert_eq!(data.text("population"), Some("8000000"));
    /// ```
    pub fn decode(encoded: &str) -> Self {
        let (data, skipped) = Self::decode_with_errors(encoded);
        for err in skipped {
            warn!(error = %err, "skipping term data entry");
        }
        data
    }

    /// Decodes like [`TermData::decode`] and also returns what was skipped.
    pub fn decode_with_errors(encoded: &str) -> (Self, Vec<TermError>) {
        let mut data = Self::new();
        let mut skipped = Vec::new();

        for entry in split_unescaped(encoded, ';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let Some((key, value)) = split_once_unescaped(entry, ':') else {
                skipped.push(TermError::MalformedDataEntry {
                    entry: entry.to_string(),
                });
                continue;
            };
            let key = unescape(key.trim());
            let value = value.trim();
            if key.is_empty() {
                skipped.push(TermError::MalformedDataEntry {
                    entry: entry.to_string(),
                });
                continue;
            }

            if key == GEOCODE_KEY {
                match Geocode::parse(value) {
                    Ok(geocode) => data.insert(key, geocode),
                    Err(err) => skipped.push(err),
                }
            } else {
                data.insert(key, unescape(value));
            }
        }

        (data, skipped)
    }

    /// Brings structured values into the shape decoding produces.
    ///
    /// Geocode entries become [`Geocode`] values, or are dropped with a
    /// warning when they do not parse. Every other value becomes text.
    pub fn normalized(self) -> Self {
        let mut data = Self::new();
        for (key, value) in self.0 {
            if key == GEOCODE_KEY {
                match normalize_geocode(value) {
                    Ok(geocode) => data.insert(key, geocode),
                    Err(err) => warn!(error = %err, "skipping term data entry"),
                }
                continue;
            }
            data.insert(key, value.into_text());
        }
        data
    }

    /// Encodes the map as `key:value;key:value`.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{}:{}", escape(key, TEXT_RESERVED), value.encode()))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Inserts or replaces a value, keeping the key's original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts a value only when the key is not present yet.
    ///
    /// Returns true when the value was inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: DataValue) -> bool {
        match self.0.entry(key.into()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    /// Returns a text value by key.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DataValue::as_text)
    }

    pub fn geocode(&self) -> Option<&Geocode> {
        match self.get(GEOCODE_KEY) {
            Some(DataValue::Geocode(geocode)) => Some(geocode),
            _ => None,
        }
    }

    /// Returns the image reference, if any.
    pub fn image(&self) -> Option<&str> {
        self.text(IMAGE_KEY).filter(|image| !image.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<DataValue>> FromIterator<(K, V)> for TermData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn normalize_geocode(value: DataValue) -> Result<Geocode, TermError> {
    match value {
        DataValue::Geocode(geocode) => Ok(geocode),
        DataValue::Text(text) => Geocode::parse(&text),
        other => Err(TermError::MalformedGeocode {
            value: other.encode(),
        }),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coordinate {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Coordinate::deserialize(deserializer)? {
        Coordinate::Text(text) => text,
        Coordinate::Number(number) => number.to_string(),
    })
}
