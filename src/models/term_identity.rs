use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::warn;

use super::escape::{escape_text, unescape};
use super::term_data::{ALT_ID_KEY, ALT_PROVIDER_KEY};
use super::{CombinedId, TermAttributes, TermData};
use crate::collaborators::{CategoryGate, Enrichment, FrequencyLookup};
use crate::error::TermError;

/// One concept from an external provider, fully parsed.
///
/// The provider and id are fixed once constructed; the combined id is always
/// derived from them. Usage frequency is filled in lazily and cached for the
/// lifetime of the value.
///
/// Terms travel between the autocomplete widget and the server in the
/// pipe-delimited form
/// `combinedId|name|disambiguator[+altDisambiguator][|data][|description]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TermIdentity {
    combined: CombinedId,
    name: String,
    disambiguator: String,
    alt_disambiguator: Option<String>,
    description: String,
    data: TermData,
    provider_label: Option<String>,
    frequency: Option<u64>,
    order: i64,
}

impl TermIdentity {
    /// Creates a term from its parts; every other field starts empty.
    pub fn new(combined: CombinedId, name: impl Into<String>) -> Self {
        Self {
            combined,
            name: name.into(),
            disambiguator: String::new(),
            alt_disambiguator: None,
            description: String::new(),
            data: TermData::new(),
            provider_label: None,
            frequency: None,
            order: 0,
        }
    }

    /// Parses a pipe-delimited term as produced by [`TermIdentity::to_encoded`].
    ///
    /// # Errors
    ///
    /// Returns [`TermError::MalformedEncoding`] when the text does not have
    /// three to five fields, and [`TermError::MalformedIdentity`] when the
    /// combined id cannot be split. Malformed data entries are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmerge::TermIdentity;
    ///
    /// let term = TermIdentity::from_encoded("freebase:/m/04wv_|Moon|film+movie|year:2009").unwrap();
    /// assert_eq!(term.provider(), "freebase");
    /// assert_eq!(term.name(), "Moon");
    /// assert_eq!(term.disambiguator(), "film");
    /// assert_eq!(term.alt_disambiguator(), Some("movie"));
    /// assert_eq!(term.data().text("year"), Some("2009"));
    /// ```
    pub fn from_encoded(text: &str) -> Result<Self, TermError> {
        let fields: Vec<&str> = text.split('|').collect();
        if !(3..=5).contains(&fields.len()) {
            return Err(TermError::encoding(format!(
                "expected 3 to 5 pipe-separated fields, found {}",
                fields.len()
            )));
        }

        let combined = CombinedId::parse(fields[0])?;
        let mut term = Self::new(combined, unescape(fields[1].trim()));

        let (disambiguator, alt) = split_disambiguators(fields[2]);
        term.disambiguator = unescape(&disambiguator);
        term.alt_disambiguator = alt.map(|alt| unescape(&alt));

        if let Some(data) = fields.get(3).map(|d| d.trim()).filter(|d| !d.is_empty()) {
            term.set_data(TermData::decode(data));
        }
        if let Some(description) = fields.get(4) {
            term.description = unescape(description.trim());
        }

        Ok(term)
    }

    /// Builds a term from a provider search result keyed by its combined id.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::MalformedIdentity`] when `combined_id` cannot be split.
    pub fn from_id_and_attributes(
        combined_id: &str,
        attrs: TermAttributes,
    ) -> Result<Self, TermError> {
        let combined = CombinedId::parse(combined_id)?;
        let mut term = Self::new(combined, attrs.name);

        if let Some(field) = attrs.disambiguator.as_deref() {
            let (disambiguator, alt) = split_disambiguators(field);
            term.disambiguator = disambiguator;
            term.alt_disambiguator = alt;
        }
        if let Some(data) = attrs.data {
            term.set_data(data.into_data());
        }
        if let Some(description) = attrs.description {
            term.description = description;
        }
        term.provider_label = attrs.provider_label.filter(|label| !label.is_empty());
        term.frequency = attrs.frequency.filter(|frequency| *frequency > 0);
        term.order = attrs.order.unwrap_or_default();

        Ok(term)
    }

    pub fn with_disambiguator(mut self, disambiguator: impl Into<String>) -> Self {
        self.disambiguator = disambiguator.into();
        self
    }

    pub fn with_alt_disambiguator(mut self, alt: impl Into<String>) -> Self {
        let alt = alt.into();
        self.alt_disambiguator = if alt.is_empty() { None } else { Some(alt) };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the data map; `altId`/`altProvider` keys also set the alt identity.
    pub fn with_data(mut self, data: TermData) -> Self {
        self.set_data(data);
        self
    }

    pub fn with_provider_label(mut self, label: impl Into<String>) -> Self {
        self.provider_label = Some(label.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Encodes the term into the pipe-delimited form.
    ///
    /// The data field is written when data or a description exists; the
    /// description comes last when non-empty.
    pub fn to_encoded(&self) -> String {
        let mut fields = vec![
            self.combined.to_string(),
            escape_text(&self.name),
            self.encoded_disambiguators(),
        ];
        if !self.data.is_empty() || !self.description.is_empty() {
            fields.push(self.data.encode());
        }
        if !self.description.is_empty() {
            fields.push(escape_text(&self.description));
        }
        fields.join("|")
    }

    /// Returns `combinedId|name|disambiguators|data`, the key a selection is offered under.
    ///
    /// Only non-empty disambiguators are joined, as in the display payload.
    pub fn selection_key(&self) -> String {
        let disambiguators: Vec<String> =
            self.disambiguators().into_iter().map(escape_text).collect();
        format!(
            "{}|{}|{}|{}",
            self.combined,
            escape_text(&self.name),
            disambiguators.join("+"),
            self.data.encode()
        )
    }

    /// Returns true when provider, id and name are all present.
    pub fn has_identity(&self) -> bool {
        !self.combined.provider().is_empty()
            && !self.combined.id().is_empty()
            && !self.name.is_empty()
    }

    /// Returns true when this term can be used for tagging.
    pub fn is_valid(&self, gate: &dyn CategoryGate) -> bool {
        self.has_identity() && gate.accepts(self)
    }

    /// Returns the ids whose usage counts make up this term's frequency.
    pub fn lookup_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.combined.id()];
        ids.extend(self.combined.alt_id());
        ids
    }

    /// Returns the usage frequency, asking `lookup` only on the first call.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures; nothing is cached in that case.
    pub fn frequency(&mut self, lookup: &dyn FrequencyLookup) -> anyhow::Result<u64> {
        if let Some(frequency) = self.frequency {
            return Ok(frequency);
        }
        let frequency = lookup.frequency(&self.lookup_ids())?;
        self.frequency = Some(frequency);
        Ok(frequency)
    }

    /// Returns the frequency if it has been resolved already.
    pub fn cached_frequency(&self) -> Option<u64> {
        self.frequency
    }

    pub(crate) fn cache_frequency(&mut self, frequency: u64) {
        self.frequency = Some(frequency);
    }

    /// Merges provider enrichment without overwriting anything already set.
    pub fn merge_enrichment(&mut self, enrichment: Enrichment) {
        if let Some(description) = enrichment.description {
            if self.description.is_empty() && !description.is_empty() {
                self.description = description;
            }
        }
        if let Some(data) = enrichment.data {
            for (key, value) in data.normalized().iter() {
                self.data.insert_if_absent(key, value.clone());
            }
            self.apply_alt_keys();
        }
    }

    pub fn combined_id(&self) -> &CombinedId {
        &self.combined
    }

    pub fn provider(&self) -> &str {
        self.combined.provider()
    }

    pub fn id(&self) -> &str {
        self.combined.id()
    }

    pub fn alt_provider(&self) -> Option<&str> {
        self.combined.alt_provider()
    }

    pub fn alt_id(&self) -> Option<&str> {
        self.combined.alt_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn disambiguator(&self) -> &str {
        &self.disambiguator
    }

    pub fn alt_disambiguator(&self) -> Option<&str> {
        self.alt_disambiguator.as_deref()
    }

    /// Returns the non-empty disambiguators, primary first.
    pub fn disambiguators(&self) -> Vec<&str> {
        let mut all = Vec::with_capacity(2);
        if !self.disambiguator.is_empty() {
            all.push(self.disambiguator.as_str());
        }
        all.extend(self.alt_disambiguator());
        all
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn data(&self) -> &TermData {
        &self.data
    }

    /// Returns the label to show for the provider: the explicit one, else `provider[+altProvider]`.
    pub fn provider_label(&self) -> String {
        self.provider_label
            .clone()
            .unwrap_or_else(|| self.combined.provider_segment())
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    fn encoded_disambiguators(&self) -> String {
        let mut field = escape_text(&self.disambiguator);
        if let Some(alt) = &self.alt_disambiguator {
            field.push('+');
            field.push_str(&escape_text(alt));
        }
        field
    }

    fn set_data(&mut self, data: TermData) {
        self.data = data.normalized();
        self.apply_alt_keys();
    }

    // Older encodings carry the alt identity inside the data segment as well.
    fn apply_alt_keys(&mut self) {
        if let Some(alt_id) = self.data.text(ALT_ID_KEY) {
            self.combined.set_alt_id(alt_id.to_string());
        }
        if let Some(alt_provider) = self.data.text(ALT_PROVIDER_KEY) {
            self.combined.set_alt_provider(alt_provider.to_string());
        }
    }
}

impl Serialize for TermIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TermIdentity", 13)?;
        state.serialize_field("combined_id", &self.combined.to_string())?;
        state.serialize_field("provider", self.provider())?;
        state.serialize_field("id", self.id())?;
        state.serialize_field("alt_provider", &self.alt_provider())?;
        state.serialize_field("alt_id", &self.alt_id())?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("disambiguator", &self.disambiguator)?;
        state.serialize_field("alt_disambiguator", &self.alt_disambiguator)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field("provider_label", &self.provider_label())?;
        state.serialize_field("frequency", &self.frequency)?;
        state.serialize_field("order", &self.order)?;
        state.end()
    }
}

/// Splits `primary[+alt]`, trimming both parts.
///
/// Anything after a second `+` is ignored with a warning.
fn split_disambiguators(field: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = field.split('+').map(str::trim).collect();
    if parts.len() > 2 {
        let err = TermError::encoding(format!(
            "disambiguator {field:?} has {} parts, keeping the first two",
            parts.len()
        ));
        warn!(error = %err, "ignoring extra disambiguator parts");
    }

    let primary = parts.first().copied().unwrap_or_default().to_string();
    let alt = parts
        .get(1)
        .filter(|alt| !alt.is_empty())
        .map(|alt| alt.to_string());
    (primary, alt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AcceptAll;
    use crate::models::{DataField, Geocode};
    use std::cell::Cell;

    struct RejectAll;

    impl CategoryGate for RejectAll {
        fn accepts(&self, _term: &TermIdentity) -> bool {
            false
        }
    }

    fn moon() -> TermIdentity {
        let mut data = TermData::new();
        data.insert("geocode", Geocode::new("0.0", "0.0"));
        data.insert("image", "/m/0abc");

        TermIdentity::new(CombinedId::new("freebase", "/m/04wv_"), "Moon")
            .with_disambiguator("film")
            .with_alt_disambiguator("movie")
            .with_description("A 2009 science fiction film.")
            .with_data(data)
    }

    #[test]
    fn encode_then_parse_reproduces_fields() {
        let term = moon();
        let parsed = TermIdentity::from_encoded(&term.to_encoded()).unwrap();
        assert_eq!(parsed, term);
    }

    #[test]
    fn dual_term_round_trips() {
        let term = TermIdentity::new(
            CombinedId::new("freebase", "/m/123").with_alt("wikidata", "Q456"),
            "Moon",
        )
        .with_disambiguator("film")
        .with_alt_disambiguator("movie");

        let encoded = term.to_encoded();
        assert_eq!(encoded, "freebase+wikidata:/m/123+Q456|Moon|film+movie");
        assert_eq!(TermIdentity::from_encoded(&encoded).unwrap(), term);
    }

    #[test]
    fn quoted_name_survives() {
        let term = TermIdentity::new(CombinedId::new("freebase", "/m/1"), r#"The "Moon""#);
        let encoded = term.to_encoded();

        assert!(encoded.contains("&quot;"));
        assert_eq!(
            TermIdentity::from_encoded(&encoded).unwrap().name(),
            r#"The "Moon""#
        );
    }

    #[test]
    fn pipes_and_plus_in_text_survive() {
        let term = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "Rock | Roll")
            .with_disambiguator("C++ language")
            .with_description("one; two: three");

        let parsed = TermIdentity::from_encoded(&term.to_encoded()).unwrap();
        assert_eq!(parsed, term);
    }

    #[test]
    fn legacy_quote_entities_are_decoded() {
        let term =
            TermIdentity::from_encoded("freebase:/m/1|The &quot;Moon&quot;|film &quot;2009&quot;")
                .unwrap();
        assert_eq!(term.name(), r#"The "Moon""#);
        assert_eq!(term.disambiguator(), r#"film "2009""#);
    }

    #[test]
    fn field_count_outside_three_to_five_fails() {
        for text in ["freebase:/m/1|Moon", "a:1|b|c|d|e|f", "", "freebase:/m/1"] {
            let err = TermIdentity::from_encoded(text).unwrap_err();
            assert!(
                matches!(err, TermError::MalformedEncoding { .. }),
                "{text:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn missing_colon_fails_parse() {
        let err = TermIdentity::from_encoded("freebase|Moon|film").unwrap_err();
        assert!(matches!(err, TermError::MalformedIdentity { .. }));
    }

    #[test]
    fn single_disambiguator_has_no_alt() {
        let term = TermIdentity::from_encoded("freebase:/m/1|Moon|film").unwrap();
        assert_eq!(term.disambiguator(), "film");
        assert_eq!(term.alt_disambiguator(), None);
    }

    #[test]
    fn extra_disambiguator_parts_are_ignored() {
        let term = TermIdentity::from_encoded("freebase:/m/1|Moon|film+movie+cinema").unwrap();
        assert_eq!(term.disambiguator(), "film");
        assert_eq!(term.alt_disambiguator(), Some("movie"));
    }

    #[test]
    fn empty_data_field_with_description() {
        let term = TermIdentity::from_encoded("freebase:/m/1|Moon|film||Earth's satellite").unwrap();
        assert!(term.data().is_empty());
        assert_eq!(term.description(), "Earth's satellite");
        assert_eq!(term.to_encoded(), "freebase:/m/1|Moon|film||Earth's satellite");
    }

    #[test]
    fn data_alt_keys_populate_alt_identity() {
        let term =
            TermIdentity::from_encoded("freebase:/m/1|Moon|film|altId:Q405;altProvider:wikidata")
                .unwrap();

        assert_eq!(term.alt_id(), Some("Q405"));
        assert_eq!(term.alt_provider(), Some("wikidata"));
        assert_eq!(term.data().text("altId"), Some("Q405"));
        assert_eq!(term.combined_id().to_string(), "freebase+wikidata:/m/1+Q405");
    }

    #[test]
    fn attributes_build_a_term() {
        let attrs = TermAttributes {
            name: "Helsinki".to_string(),
            disambiguator: Some("city+capital".to_string()),
            description: Some("Capital of Finland".to_string()),
            data: Some(DataField::Encoded("geocode:60.17x24.94".to_string())),
            frequency: Some(7),
            provider_label: Some("Freebase".to_string()),
            order: Some(2),
        };

        let term = TermIdentity::from_id_and_attributes("freebase:/m/034tl", attrs).unwrap();

        assert_eq!(term.id(), "/m/034tl");
        assert_eq!(term.disambiguator(), "city");
        assert_eq!(term.alt_disambiguator(), Some("capital"));
        assert_eq!(term.data().geocode(), Some(&Geocode::new("60.17", "24.94")));
        assert_eq!(term.cached_frequency(), Some(7));
        assert_eq!(term.provider_label(), "Freebase");
        assert_eq!(term.order(), 2);
    }

    #[test]
    fn attributes_with_bad_id_fail() {
        let err = TermIdentity::from_id_and_attributes("no-colon", TermAttributes::named("x"))
            .unwrap_err();
        assert!(matches!(err, TermError::MalformedIdentity { .. }));
    }

    #[test]
    fn validity_requires_identity_and_gate() {
        let term = moon();
        assert!(term.is_valid(&AcceptAll));
        assert!(!term.is_valid(&RejectAll));

        let no_id = TermIdentity::new(CombinedId::new("freebase", ""), "Moon")
            .with_description("still has everything else");
        assert!(!no_id.is_valid(&AcceptAll));

        let no_name = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "");
        assert!(!no_name.is_valid(&AcceptAll));
    }

    #[test]
    fn frequency_is_memoized_and_sums_alt_ids() {
        let calls = Cell::new(0);
        let lookup = |ids: &[&str]| -> u64 {
            calls.set(calls.get() + 1);
            ids.iter().map(|id| if *id == "Q456" { 3 } else { 4 }).sum()
        };

        let mut term = TermIdentity::new(
            CombinedId::new("freebase", "/m/123").with_alt("wikidata", "Q456"),
            "Moon",
        );

        assert_eq!(term.frequency(&lookup).unwrap(), 7);
        assert_eq!(term.frequency(&lookup).unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn enrichment_does_not_overwrite() {
        let mut term = moon();
        let mut data = TermData::new();
        data.insert("image", "/m/other");
        data.insert("runtime", "97");

        term.merge_enrichment(Enrichment {
            description: Some("Replacement".to_string()),
            data: Some(data),
        });

        assert_eq!(term.description(), "A 2009 science fiction film.");
        assert_eq!(term.data().image(), Some("/m/0abc"));
        assert_eq!(term.data().text("runtime"), Some("97"));
    }

    #[test]
    fn enrichment_fills_empty_description() {
        let mut term = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "Moon");
        term.merge_enrichment(Enrichment {
            description: Some("Earth's satellite".to_string()),
            data: None,
        });
        assert_eq!(term.description(), "Earth's satellite");
    }

    #[test]
    fn structured_attributes_round_trip() {
        let attrs: TermAttributes = serde_json::from_str(
            r#"{"name": "New York", "data": {"population": 8000000, "geocode": "40.7x-74.0", "visible": true}}"#,
        )
        .unwrap();
        let term = TermIdentity::from_id_and_attributes("freebase:/m/02_286", attrs).unwrap();

        assert_eq!(term.data().text("population"), Some("8000000"));
        assert_eq!(term.data().geocode(), Some(&Geocode::new("40.7", "-74.0")));

        let parsed = TermIdentity::from_encoded(&term.to_encoded()).unwrap();
        assert_eq!(parsed, term);
    }

    #[test]
    fn selection_key_skips_empty_primary_disambiguator() {
        let term = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "Moon")
            .with_alt_disambiguator("movie");

        assert_eq!(term.selection_key(), "freebase:/m/1|Moon|movie|");
        assert_eq!(term.to_encoded(), "freebase:/m/1|Moon|+movie");
        assert_eq!(TermIdentity::from_encoded(&term.to_encoded()).unwrap(), term);
    }

    #[test]
    fn enrichment_data_is_normalized() {
        let mut term = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "Moon");
        let data: TermData = serde_json::from_str(r#"{"runtime": 97}"#).unwrap();
        term.merge_enrichment(Enrichment {
            description: None,
            data: Some(data),
        });
        assert_eq!(term.data().text("runtime"), Some("97"));
    }

    #[test]
    fn provider_label_defaults_to_providers() {
        let dual = TermIdentity::new(
            CombinedId::new("freebase", "/m/1").with_alt("wikidata", "Q1"),
            "Moon",
        );
        assert_eq!(dual.provider_label(), "freebase+wikidata");
    }

    #[test]
    fn serializes_combined_id() {
        let json = serde_json::to_value(moon()).unwrap();
        assert_eq!(json["combined_id"], "freebase:/m/04wv_");
        assert_eq!(json["alt_disambiguator"], "movie");
        assert_eq!(json["data"]["geocode"]["latitude"], "0.0");
    }
}
