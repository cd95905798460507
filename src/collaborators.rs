//! Seams to the systems around the core: usage counts, the taxonomy, and providers.
//!
//! `TaxonomyService` implements the first two against SQLite. Closures work
//! as frequency lookups, which keeps tests short.

use serde::{Deserialize, Serialize};

use crate::models::{TermData, TermIdentity};

/// Source of usage counts.
///
/// Implementations must be side-effect free; the core may call them once
/// per distinct id group per search.
pub trait FrequencyLookup {
    /// Returns how many times the terms with these external ids have been used, summed.
    fn frequency(&self, ids: &[&str]) -> anyhow::Result<u64>;
}

impl<F> FrequencyLookup for F
where
    F: Fn(&[&str]) -> u64,
{
    fn frequency(&self, ids: &[&str]) -> anyhow::Result<u64> {
        Ok(self(ids))
    }
}

/// Lookup reporting zero usage for everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrequency;

impl FrequencyLookup for NoFrequency {
    fn frequency(&self, _ids: &[&str]) -> anyhow::Result<u64> {
        Ok(0)
    }
}

/// Decides whether the target vocabulary accepts a term.
pub trait CategoryGate {
    fn accepts(&self, term: &TermIdentity) -> bool;
}

/// Gate accepting every term.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CategoryGate for AcceptAll {
    fn accepts(&self, _term: &TermIdentity) -> bool {
        true
    }
}

/// Extra details a provider can supply for one of its ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: Option<TermData>,
}

/// Provider hook consulted when a term is about to be stored.
pub trait Enricher {
    /// Returns additional details for `id`, or `None` when the provider has nothing.
    fn additional_data(
        &self,
        provider: &str,
        id: &str,
        language: &str,
    ) -> anyhow::Result<Option<Enrichment>>;
}

/// Enricher for setups without provider adapters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl Enricher for NoEnrichment {
    fn additional_data(
        &self,
        _provider: &str,
        _id: &str,
        _language: &str,
    ) -> anyhow::Result<Option<Enrichment>> {
        Ok(None)
    }
}
