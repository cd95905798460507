/// Integration tests for the term micro-format through the public API.
///
/// Covers parsing, encoding, escaping and the data codec:
/// - `TermIdentity::from_encoded` / `to_encoded` round trips
/// - dual-term combined ids and `+` disambiguators
/// - geocode decoding and skipping of malformed entries
use tagmerge::{
    AcceptAll, CategoryGate, CombinedId, Geocode, TermData, TermError, TermIdentity,
};

fn sample_term() -> TermIdentity {
    let mut data = TermData::new();
    data.insert("year", "2009");
    data.insert("geocode", Geocode::new("40.7", "-74.0"));

    TermIdentity::new(
        CombinedId::new("freebase", "/m/04wv_").with_alt("wikidata", "Q1"),
        "Moon",
    )
    .with_disambiguator("film")
    .with_alt_disambiguator("movie")
    .with_description("A science fiction film")
    .with_data(data)
}

#[test]
fn encoded_term_round_trips() {
    let term = sample_term();
    let parsed = TermIdentity::from_encoded(&term.to_encoded()).unwrap();

    assert_eq!(parsed, term);
    assert_eq!(parsed.to_encoded(), term.to_encoded());
}

#[test]
fn minimal_term_round_trips() {
    let term = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "Sun");
    let encoded = term.to_encoded();

    assert_eq!(encoded, "freebase:/m/1|Sun|");
    assert_eq!(TermIdentity::from_encoded(&encoded).unwrap(), term);
}

#[test]
fn quotes_and_delimiters_survive_encoding() {
    let term = TermIdentity::new(CombinedId::new("freebase", "/m/2"), r#"The "Moon" | Sun"#)
        .with_disambiguator("a+b")
        .with_description("ratio 1:2; roughly");

    let encoded = term.to_encoded();
    assert!(!encoded.contains('"'));
    assert_eq!(encoded.matches('|').count(), 4);

    let parsed = TermIdentity::from_encoded(&encoded).unwrap();
    assert_eq!(parsed.name(), r#"The "Moon" | Sun"#);
    assert_eq!(parsed.disambiguator(), "a+b");
    assert_eq!(parsed.alt_disambiguator(), None);
    assert_eq!(parsed.description(), "ratio 1:2; roughly");
}

#[test]
fn dual_combined_id_is_split() {
    let combined = CombinedId::parse("freebase+wikidata:/m/123+Q456").unwrap();

    assert_eq!(combined.provider(), "freebase");
    assert_eq!(combined.id(), "/m/123");
    assert_eq!(combined.alt_provider(), Some("wikidata"));
    assert_eq!(combined.alt_id(), Some("Q456"));
    assert_eq!(combined.to_string(), "freebase+wikidata:/m/123+Q456");
}

#[test]
fn combined_id_without_colon_is_malformed_identity() {
    let err = TermIdentity::from_encoded("freebase/m/1|Moon|").unwrap_err();
    assert!(matches!(err, TermError::MalformedIdentity { .. }));
}

#[test]
fn pipe_field_count_is_checked() {
    for encoded in ["freebase:/m/1|Moon", "freebase:/m/1|Moon|a|b|c|d"] {
        let err = TermIdentity::from_encoded(encoded).unwrap_err();
        assert!(matches!(err, TermError::MalformedEncoding { .. }), "{encoded}");
    }
}

#[test]
fn disambiguator_splits_on_plus() {
    let dual = TermIdentity::from_encoded("freebase:/m/1|Moon|film+movie").unwrap();
    assert_eq!(dual.disambiguator(), "film");
    assert_eq!(dual.alt_disambiguator(), Some("movie"));

    let single = TermIdentity::from_encoded("freebase:/m/1|Moon|film").unwrap();
    assert_eq!(single.disambiguator(), "film");
    assert_eq!(single.alt_disambiguator(), None);
}

#[test]
fn extra_disambiguator_parts_are_ignored() {
    let term = TermIdentity::from_encoded("freebase:/m/1|Moon|film+movie+extra").unwrap();
    assert_eq!(term.disambiguators(), vec!["film", "movie"]);
}

#[test]
fn data_codec_decodes_geocode_and_text() {
    let data = TermData::decode("geocode:40.7x-74.0;population:8000000");

    let geocode = data.geocode().unwrap();
    assert_eq!(geocode.latitude(), "40.7");
    assert_eq!(geocode.longitude(), "-74.0");
    assert_eq!(data.text("population"), Some("8000000"));

    assert_eq!(TermData::decode(&data.encode()), data);
}

#[test]
fn malformed_geocode_is_skipped() {
    let (data, skipped) = TermData::decode_with_errors("geocode:40.7;population:8000000");

    assert!(data.geocode().is_none());
    assert!(!data.contains_key("geocode"));
    assert_eq!(data.text("population"), Some("8000000"));
    assert!(matches!(skipped.as_slice(), [TermError::MalformedGeocode { .. }]));
}

#[test]
fn data_values_keep_colons_after_the_first() {
    let term =
        TermIdentity::from_encoded("freebase:/m/1|Moon||url:http://example.com/moon;bogus")
            .unwrap();

    assert_eq!(term.data().text("url"), Some("http://example.com/moon"));
    assert_eq!(term.data().len(), 1);
}

#[test]
fn legacy_alt_keys_populate_identity() {
    let term =
        TermIdentity::from_encoded("freebase:/m/1|Moon||altProvider:wikidata;altId:Q405").unwrap();

    assert_eq!(term.alt_provider(), Some("wikidata"));
    assert_eq!(term.alt_id(), Some("Q405"));
    assert_eq!(term.combined_id().to_string(), "freebase+wikidata:/m/1+Q405");
    assert_eq!(term.lookup_ids(), vec!["/m/1", "Q405"]);
}

struct RejectAll;

impl CategoryGate for RejectAll {
    fn accepts(&self, _term: &TermIdentity) -> bool {
        false
    }
}

#[test]
fn validity_needs_identity_and_gate() {
    let term = sample_term();
    assert!(term.is_valid(&AcceptAll));
    assert!(!term.is_valid(&RejectAll));

    let no_id = TermIdentity::new(CombinedId::new("freebase", ""), "Moon");
    assert!(!no_id.is_valid(&AcceptAll));

    let no_name = TermIdentity::new(CombinedId::new("freebase", "/m/1"), "");
    assert!(!no_name.is_valid(&AcceptAll));
}

#[test]
fn frequency_is_looked_up_once() {
    use std::cell::Cell;

    let calls = Cell::new(0);
    let lookup = |ids: &[&str]| -> u64 {
        calls.set(calls.get() + 1);
        ids.len() as u64 * 10
    };

    let mut term = sample_term();
    assert_eq!(term.frequency(&lookup).unwrap(), 20);
    assert_eq!(term.frequency(&lookup).unwrap(), 20);
    assert_eq!(calls.get(), 1);
}
