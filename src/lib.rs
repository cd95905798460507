pub mod aggregator;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use aggregator::{ProviderBatch, RankedResults, RawBatch, ResultAggregator};
pub use collaborators::{
    AcceptAll, CategoryGate, Enricher, Enrichment, FrequencyLookup, NoEnrichment, NoFrequency,
};
pub use config::Config;
pub use db::Database;
pub use error::TermError;
pub use models::{
    CombinedId, DataField, DataValue, DisplayPayload, Geocode, PayloadOptions, TermAttributes,
    TermData, TermId, TermIdentity, TermRecord,
};
pub use service::{SavedTerm, TaxonomyService};
