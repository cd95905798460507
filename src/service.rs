use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::collaborators::{CategoryGate, Enricher, FrequencyLookup};
use crate::config::{Config, DEFAULT_LANGUAGE};
use crate::models::{TermData, TermId, TermIdentity, TermRecord};
use crate::Database;

const TERM_COLUMNS: &str =
    "tid, vocabulary_id, name, description, provider, ext_id, disambiguator, data";

/// Outcome of [`TaxonomyService::save_new_term`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTerm {
    pub record: TermRecord,
    /// True when this call created the row.
    pub is_new: bool,
}

impl SavedTerm {
    /// Returns the id of the stored term.
    pub fn tid(&self) -> Option<TermId> {
        self.record.tid
    }
}

/// Taxonomy store backing usage counts, vocabulary checks and term persistence.
///
/// Owns a [`Database`] and works inside one vocabulary.
///
/// # Examples
///
/// ```
/// use tagmerge::{Database, FrequencyLookup, TaxonomyService};
///
/// # fn main() -> anyhow::Result<()> {
/// let service = TaxonomyService::new(Database::in_memory()?, "concept_tags");
/// service.ensure_vocabulary()?;
/// assert_eq!(service.frequency(&["/m/unused"])?, 0);
/// # Ok(())
/// # }
/// ```
pub struct TaxonomyService {
    db: Database,
    vocabulary: String,
    language: String,
}

impl TaxonomyService {
    /// Creates a service for `vocabulary`, requesting enrichment in English.
    pub fn new(db: Database, vocabulary: impl Into<String>) -> Self {
        Self {
            db,
            vocabulary: vocabulary.into(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Creates a service using the vocabulary and language from `config`.
    pub fn from_config(db: Database, config: &Config) -> Self {
        Self {
            db,
            vocabulary: config.vocabulary.clone(),
            language: config.result_language.clone(),
        }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }

    /// Returns the id of the configured vocabulary, creating it if needed.
    pub fn ensure_vocabulary(&self) -> Result<i64> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT OR IGNORE INTO vocabularies (machine_name) VALUES (?1)",
            [&self.vocabulary],
        )?;
        let id = conn.query_row(
            "SELECT id FROM vocabularies WHERE machine_name = ?1",
            [&self.vocabulary],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Returns the id of the configured vocabulary, if it exists.
    pub fn vocabulary_id(&self) -> Result<Option<i64>> {
        let id = self
            .db
            .connection()
            .query_row(
                "SELECT id FROM vocabularies WHERE machine_name = ?1",
                [&self.vocabulary],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Finds the stored term for an external id.
    pub fn find_term(&self, ext_id: &str) -> Result<Option<TermRecord>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TERM_COLUMNS} FROM terms WHERE ext_id = ?1"
        ))?;
        let row = stmt.query_row([ext_id], read_term_row).optional()?;
        row.map(TermRow::into_record).transpose()
    }

    /// Retrieves a stored term by id.
    pub fn get_term(&self, tid: TermId) -> Result<Option<TermRecord>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!("SELECT {TERM_COLUMNS} FROM terms WHERE tid = ?1"))?;
        let row = stmt.query_row([tid.get()], read_term_row).optional()?;
        row.map(TermRow::into_record).transpose()
    }

    /// Builds the stored form of `term`, merging provider enrichment first.
    ///
    /// Returns `None` when the term cannot be tagged. When a row for the same
    /// external id exists and `overwrite` is false, that row comes back
    /// untouched. With `overwrite`, the row is rewritten only if the new
    /// values differ; empty new values never replace stored ones.
    pub fn populate_term(
        &self,
        term: &mut TermIdentity,
        enricher: &dyn Enricher,
        overwrite: bool,
    ) -> Result<Option<TermRecord>> {
        if !term.is_valid(self) {
            debug!(id = term.id(), "term is not taggable");
            return Ok(None);
        }

        let existing = self.find_term(term.id())?;

        match enricher.additional_data(term.provider(), term.id(), &self.language) {
            Ok(Some(enrichment)) => term.merge_enrichment(enrichment),
            Ok(None) => {}
            Err(err) => warn!(id = term.id(), error = %err, "provider enrichment failed"),
        }

        let Some(existing) = existing else {
            let vocabulary_id = self
                .vocabulary_id()?
                .context("vocabulary disappeared while populating term")?;
            return Ok(Some(TermRecord::from_identity(term, None, vocabulary_id)));
        };

        if !overwrite {
            return Ok(Some(existing));
        }

        let mut record = TermRecord::from_identity(term, existing.tid, existing.vocabulary_id);
        record.keep_stored_values(&existing);
        if record != existing {
            self.update_term(&record)?;
        }
        Ok(Some(record))
    }

    /// Stores `term` unless a row with its external id exists already.
    ///
    /// Returns `None` when the term cannot be tagged.
    pub fn save_new_term(
        &self,
        term: &mut TermIdentity,
        enricher: &dyn Enricher,
    ) -> Result<Option<SavedTerm>> {
        let Some(record) = self.populate_term(term, enricher, false)? else {
            return Ok(None);
        };
        if record.tid.is_some() {
            return Ok(Some(SavedTerm {
                record,
                is_new: false,
            }));
        }

        let tid = self.insert_term(&record)?;
        Ok(Some(SavedTerm {
            record: TermRecord {
                tid: Some(tid),
                ..record
            },
            is_new: true,
        }))
    }

    /// Links a content item to a term through `field`.
    ///
    /// Returns false if the link already exists. New links go after the
    /// content item's existing links in that field.
    pub fn link_term(&self, content_id: i64, tid: TermId, field: &str) -> Result<bool> {
        let conn = self.db.connection();
        conn.execute("BEGIN TRANSACTION", [])?;

        let result: Result<bool> = (|| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM term_usage WHERE tid = ?1 AND content_id = ?2 AND field = ?3)",
                (tid.get(), content_id, field),
                |row| row.get(0),
            )?;
            if exists {
                return Ok(false);
            }

            let delta: i64 = conn.query_row(
                "SELECT COALESCE(MAX(delta), -1) + 1 FROM term_usage WHERE content_id = ?1 AND field = ?2",
                (content_id, field),
                |row| row.get(0),
            )?;
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO term_usage (tid, content_id, field, delta, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (tid.get(), content_id, field, delta, now),
            )?;
            Ok(true)
        })();

        match result {
            Ok(linked) => {
                conn.execute("COMMIT", [])?;
                Ok(linked)
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }

    /// Counts the content links of every term whose external id is in `ids`.
    pub fn usage_count(&self, ids: &[&str]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let query = format!(
            "SELECT COUNT(*) FROM term_usage u JOIN terms t ON t.tid = u.tid WHERE t.ext_id IN ({})",
            placeholders.join(", ")
        );
        let count: i64 = self
            .db
            .connection()
            .query_row(&query, rusqlite::params_from_iter(ids.iter()), |row| {
                row.get(0)
            })
            .context("Failed to count term usage")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn insert_term(&self, record: &TermRecord) -> Result<TermId> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO terms (vocabulary_id, name, description, provider, ext_id, disambiguator, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                record.vocabulary_id,
                &record.name,
                &record.description,
                &record.provider,
                &record.ext_id,
                &record.disambiguator,
                encode_data_column(&record.data)?,
            ),
        )?;
        Ok(TermId::new(conn.last_insert_rowid()))
    }

    fn update_term(&self, record: &TermRecord) -> Result<()> {
        let tid = record
            .tid
            .context("cannot update a term that has not been saved")?;
        self.db.connection().execute(
            "UPDATE terms SET name = ?1, description = ?2, provider = ?3, disambiguator = ?4, data = ?5
             WHERE tid = ?6",
            (
                &record.name,
                &record.description,
                &record.provider,
                &record.disambiguator,
                encode_data_column(&record.data)?,
                tid.get(),
            ),
        )?;
        debug!(%tid, ext_id = %record.ext_id, "updated stored term");
        Ok(())
    }
}

impl FrequencyLookup for TaxonomyService {
    fn frequency(&self, ids: &[&str]) -> Result<u64> {
        self.usage_count(ids)
    }
}

impl CategoryGate for TaxonomyService {
    fn accepts(&self, _term: &TermIdentity) -> bool {
        match self.vocabulary_id() {
            Ok(id) => id.is_some(),
            Err(err) => {
                warn!(vocabulary = %self.vocabulary, error = %err, "vocabulary lookup failed");
                false
            }
        }
    }
}

struct TermRow {
    tid: i64,
    vocabulary_id: i64,
    name: String,
    description: String,
    provider: String,
    ext_id: String,
    disambiguator: String,
    data: Option<String>,
}

impl TermRow {
    fn into_record(self) -> Result<TermRecord> {
        let data = match self.data.as_deref() {
            Some(json) if !json.is_empty() => serde_json::from_str(json)
                .with_context(|| format!("Failed to decode data of term {}", self.tid))?,
            _ => TermData::new(),
        };
        Ok(TermRecord {
            tid: Some(TermId::new(self.tid)),
            vocabulary_id: self.vocabulary_id,
            name: self.name,
            description: self.description,
            provider: self.provider,
            ext_id: self.ext_id,
            disambiguator: self.disambiguator,
            data,
        })
    }
}

fn read_term_row(row: &Row<'_>) -> rusqlite::Result<TermRow> {
    Ok(TermRow {
        tid: row.get(0)?,
        vocabulary_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        provider: row.get(4)?,
        ext_id: row.get(5)?,
        disambiguator: row.get(6)?,
        data: row.get(7)?,
    })
}

fn encode_data_column(data: &TermData) -> Result<Option<String>> {
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(data)?))
}
