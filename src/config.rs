//! Runtime configuration, passed explicitly to whatever needs it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::PayloadOptions;

/// Vocabulary used when `TAGMERGE_VOCABULARY` is not set.
pub const DEFAULT_VOCABULARY: &str = "concept_tags";
/// Language requested from providers when `TAGMERGE_LANGUAGE` is not set.
pub const DEFAULT_LANGUAGE: &str = "en";

pub const VOCABULARY_VAR: &str = "TAGMERGE_VOCABULARY";
pub const LANGUAGE_VAR: &str = "TAGMERGE_LANGUAGE";
pub const DATABASE_VAR: &str = "TAGMERGE_DB";
pub const FREEBASE_KEY_VAR: &str = "TAGMERGE_FREEBASE_KEY";

/// Settings for the taxonomy adapter and result display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Machine name of the vocabulary terms are stored in.
    pub vocabulary: String,
    /// Language passed to provider enrichment.
    pub result_language: String,
    pub database_path: PathBuf,
    pub freebase_api_key: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to let a `.env` file supply values.
    ///
    /// # Errors
    ///
    /// Returns an error if `TAGMERGE_DB` is unset and the data directory
    /// cannot be determined.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_path = match var(DATABASE_VAR) {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        Ok(Self {
            vocabulary: var(VOCABULARY_VAR).unwrap_or_else(|| DEFAULT_VOCABULARY.to_string()),
            result_language: var(LANGUAGE_VAR).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            database_path,
            freebase_api_key: var(FREEBASE_KEY_VAR),
        })
    }

    /// Returns the options for building display payloads.
    pub fn payload_options(&self) -> PayloadOptions {
        PayloadOptions {
            freebase_api_key: self.freebase_api_key.clone(),
        }
    }
}

/// Gets the cross-platform database path.
///
/// Returns the path as `{data_dir}/tagmerge/taxonomy.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn default_database_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("tagmerge").join("taxonomy.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}
