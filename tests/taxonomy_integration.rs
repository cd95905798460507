/// Integration tests for the SQLite taxonomy adapter.
///
/// These tests verify the full tagging loop:
/// - saving encoded selections as stored terms
/// - linking terms to content items
/// - later searches ranking by the resulting usage counts
use anyhow::Result;
use tagmerge::{
    Config, Database, NoEnrichment, ProviderBatch, ResultAggregator, TaxonomyService,
    TermIdentity,
};
use tempfile::tempdir;

fn tag(service: &TaxonomyService, content_id: i64, encoded: &str) -> Result<()> {
    let mut term = TermIdentity::from_encoded(encoded)?;
    let saved = service
        .save_new_term(&mut term, &NoEnrichment)?
        .expect("term should be taggable");
    service.link_term(content_id, saved.tid().expect("saved term has an id"), "tags")?;
    Ok(())
}

#[test]
fn tagging_raises_rank_in_later_searches() -> Result<()> {
    let service = TaxonomyService::new(Database::in_memory()?, "concept_tags");
    service.ensure_vocabulary()?;

    tag(&service, 1, "freebase:/m/sun|Sun|star")?;
    tag(&service, 2, "freebase:/m/sun|Sun|star")?;
    tag(&service, 2, "wikidata:Q405|Moon|satellite")?;

    let batch: ProviderBatch = serde_json::from_str(
        r#"{
            "freebase+wikidata:/m/moon+Q405": {"name": "Moon", "disambiguator": "satellite"},
            "freebase:/m/mars": {"name": "Mars", "disambiguator": "planet"},
            "freebase:/m/sun": {"name": "Sun", "disambiguator": "star"}
        }"#,
    )?;
    let mut search = ResultAggregator::new(["freebase", "wikidata"]);
    search.add_results(batch);

    let ranked = search.finalize(&service);
    let names: Vec<(&str, u64)> = ranked
        .values()
        .map(|p| (p.name.as_str(), p.frequency))
        .collect();
    assert_eq!(names, vec![("Sun", 2), ("Moon", 1), ("Mars", 0)]);
    Ok(())
}

#[test]
fn stored_term_rebuilds_selection() -> Result<()> {
    let service = TaxonomyService::new(Database::in_memory()?, "concept_tags");
    service.ensure_vocabulary()?;

    let mut term = TermIdentity::from_encoded("freebase:/m/1|Moon|film|year:2009|A film")?;
    service.save_new_term(&mut term, &NoEnrichment)?;

    let stored = service.find_term("/m/1")?.expect("term was saved");
    let rebuilt = TermIdentity::from_stored(&stored);
    assert_eq!(rebuilt.selection_key(), term.selection_key());
    assert_eq!(rebuilt.to_encoded(), term.to_encoded());
    Ok(())
}

#[test]
fn file_database_persists_usage() -> Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("nested").join("taxonomy.db");
    let config = Config::from_lookup(|key| match key {
        "TAGMERGE_DB" => Some(db_path.display().to_string()),
        "TAGMERGE_VOCABULARY" => Some("places".to_string()),
        _ => None,
    })?;
    assert_eq!(config.database_path, db_path);

    tagmerge::config::ensure_database_directory(&config.database_path)?;
    {
        let service = TaxonomyService::from_config(Database::open(&config.database_path)?, &config);
        service.ensure_vocabulary()?;
        tag(&service, 9, "freebase:/m/034tl|Helsinki|city")?;
    }

    let service = TaxonomyService::from_config(Database::open(&config.database_path)?, &config);
    assert_eq!(service.vocabulary(), "places");
    assert!(service.vocabulary_id()?.is_some());
    assert_eq!(service.usage_count(&["/m/034tl"])?, 1);
    Ok(())
}
