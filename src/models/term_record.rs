use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CombinedId, TermData, TermIdentity};

/// Longest term name the taxonomy stores, in characters.
pub const MAX_TERM_NAME_CHARS: usize = 255;

/// Unique identifier of a stored taxonomy term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(i64);

impl TermId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying ID value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A term as the taxonomy stores it.
///
/// Only the primary provider and id are kept; the alt identity of a dual
/// term lives on in the selection that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    /// `None` until the record has been saved.
    pub tid: Option<TermId>,
    pub vocabulary_id: i64,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub ext_id: String,
    pub disambiguator: String,
    pub data: TermData,
}

impl TermRecord {
    /// Projects a term into a storable record, truncating over-long names.
    pub fn from_identity(term: &TermIdentity, tid: Option<TermId>, vocabulary_id: i64) -> Self {
        Self {
            tid,
            vocabulary_id,
            name: term.name().chars().take(MAX_TERM_NAME_CHARS).collect(),
            description: term.description().to_string(),
            provider: term.provider().to_string(),
            ext_id: term.id().to_string(),
            disambiguator: term.disambiguator().to_string(),
            data: term.data().clone(),
        }
    }

    /// Fills empty description, disambiguator and data from `stored`.
    pub fn keep_stored_values(&mut self, stored: &TermRecord) {
        if self.description.is_empty() {
            self.description = stored.description.clone();
        }
        if self.disambiguator.is_empty() {
            self.disambiguator = stored.disambiguator.clone();
        }
        if self.data.is_empty() {
            self.data = stored.data.clone();
        }
    }
}

impl TermIdentity {
    /// Rebuilds the identity of a stored term.
    pub fn from_stored(record: &TermRecord) -> Self {
        TermIdentity::new(
            CombinedId::new(record.provider.clone(), record.ext_id.clone()),
            record.name.clone(),
        )
        .with_disambiguator(record.disambiguator.clone())
        .with_description(record.description.clone())
        .with_data(record.data.clone())
    }
}
