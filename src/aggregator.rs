//! Merging and ranking of search results from several providers.

use std::cmp::Reverse;
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::collaborators::FrequencyLookup;
use crate::models::{DisplayPayload, PayloadOptions, TermAttributes, TermIdentity};

/// One provider's search results: combined id to attributes, in provider order.
pub type ProviderBatch = IndexMap<String, TermAttributes>;

/// A provider batch as it arrives over the wire, before any entry is checked.
pub type RawBatch = IndexMap<String, serde_json::Value>;

/// Ranked, de-duplicated results keyed by selection key.
pub type RankedResults = IndexMap<String, DisplayPayload>;

/// Collects results from several provider searches and ranks them.
///
/// One aggregator serves one search: feed it every provider's batch with
/// [`add_results`](Self::add_results), then consume it with
/// [`finalize`](Self::finalize).
///
/// # Examples
///
/// ```
/// use tagmerge::{ProviderBatch, ResultAggregator, TermAttributes};
///
/// let mut batch = ProviderBatch::new();
/// batch.insert("freebase:/m/1".to_string(), TermAttributes::named("Moon"));
///
/// let mut search = ResultAggregator::new(["freebase"]);
/// search.add_results(batch);
///
/// let ranked = search.finalize(&|_ids: &[&str]| -> u64 { 3 });
/// assert_eq!(ranked["freebase:/m/1|Moon||"].frequency, 3);
/// ```
#[derive(Debug, Default)]
pub struct ResultAggregator {
    providers: IndexSet<String>,
    items: Vec<TermIdentity>,
    options: PayloadOptions,
}

impl ResultAggregator {
    /// Creates an aggregator for a search spanning `providers`.
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: providers.into_iter().map(Into::into).collect(),
            items: Vec::new(),
            options: PayloadOptions::default(),
        }
    }

    /// Sets the options used to build display payloads.
    pub fn with_options(mut self, options: PayloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(String::as_str)
    }

    /// Returns the accumulated results in arrival order.
    pub fn items(&self) -> &[TermIdentity] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds one provider's results, skipping entries whose id cannot be parsed.
    ///
    /// Returns how many entries were accepted.
    pub fn add_results(&mut self, batch: ProviderBatch) -> usize {
        let mut accepted = 0;
        for (combined_id, attrs) in batch {
            match TermIdentity::from_id_and_attributes(&combined_id, attrs) {
                Ok(term) => {
                    self.push(term);
                    accepted += 1;
                }
                Err(err) => warn!(%combined_id, error = %err, "skipping search result"),
            }
        }
        accepted
    }

    /// Adds a batch of raw JSON entries, skipping entries whose attributes
    /// cannot be read.
    ///
    /// Returns how many entries were accepted.
    pub fn add_raw_results(&mut self, batch: RawBatch) -> usize {
        let mut parsed = ProviderBatch::with_capacity(batch.len());
        for (combined_id, value) in batch {
            match serde_json::from_value::<TermAttributes>(value) {
                Ok(attrs) => {
                    parsed.insert(combined_id, attrs);
                }
                Err(err) => warn!(%combined_id, error = %err, "skipping unreadable search result"),
            }
        }
        self.add_results(parsed)
    }

    /// Adds an already built term.
    pub fn push(&mut self, term: TermIdentity) {
        if !self.providers.is_empty() && !self.providers.contains(term.provider()) {
            debug!(
                provider = term.provider(),
                id = term.id(),
                "result from a provider outside this search"
            );
        }
        self.items.push(term);
    }

    /// Ranks the accumulated results and returns them keyed by selection key.
    ///
    /// Results sort by `order` ascending, then frequency descending; ties keep
    /// arrival order. A key seen twice keeps its first position and takes the
    /// later payload. Each distinct id group hits `lookup` at most once, and
    /// failed lookups rank as zero.
    pub fn finalize(self, lookup: &dyn FrequencyLookup) -> RankedResults {
        let mut resolved: HashMap<Vec<String>, u64> = HashMap::new();
        let mut ranked: Vec<(TermIdentity, u64)> = Vec::with_capacity(self.items.len());

        for mut term in self.items {
            let frequency = match term.cached_frequency() {
                Some(frequency) => frequency,
                None => resolve_frequency(&mut term, lookup, &mut resolved),
            };
            ranked.push((term, frequency));
        }

        ranked.sort_by_key(|(term, frequency)| (term.order(), Reverse(*frequency)));

        let mut results = RankedResults::with_capacity(ranked.len());
        for (term, frequency) in ranked {
            results.insert(
                term.selection_key(),
                DisplayPayload::from_term(&term, frequency, &self.options),
            );
        }
        results
    }
}

fn resolve_frequency(
    term: &mut TermIdentity,
    lookup: &dyn FrequencyLookup,
    resolved: &mut HashMap<Vec<String>, u64>,
) -> u64 {
    let ids: Vec<String> = term.lookup_ids().into_iter().map(String::from).collect();
    if let Some(&frequency) = resolved.get(&ids) {
        term.cache_frequency(frequency);
        return frequency;
    }

    match term.frequency(lookup) {
        Ok(frequency) => {
            resolved.insert(ids, frequency);
            frequency
        }
        Err(err) => {
            warn!(id = term.id(), error = %err, "frequency lookup failed, ranking as unused");
            0
        }
    }
}
