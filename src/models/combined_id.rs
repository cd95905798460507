use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TermError;

/// Provider and id of a concept, optionally bound to a second provider.
///
/// The canonical text form is `provider:id`, or for a dual term
/// `provider+altProvider:id+altId`. Everything before the first `:` is the
/// provider segment, so ids may themselves contain colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinedId {
    provider: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    alt_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    alt_id: Option<String>,
}

impl CombinedId {
    /// Creates a single-provider id.
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            alt_provider: None,
            alt_id: None,
        }
    }

    /// Binds a secondary provider and id, turning this into a dual term.
    pub fn with_alt(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.alt_provider = non_empty(provider.into());
        self.alt_id = non_empty(id.into());
        self
    }

    /// Splits a raw combined id into its provider and id parts.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::MalformedIdentity`] when `raw` has no `:` or when
    /// the primary provider or id is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmerge::CombinedId;
    ///
    /// let id = CombinedId::parse("freebase+wikidata:/m/123+Q456").unwrap();
    /// assert_eq!(id.provider(), "freebase");
    /// assert_eq!(id.id(), "/m/123");
    /// assert_eq!(id.alt_provider(), Some("wikidata"));
    /// assert_eq!(id.alt_id(), Some("Q456"));
    /// ```
    pub fn parse(raw: &str) -> Result<Self, TermError> {
        let malformed = || TermError::MalformedIdentity {
            raw: raw.to_string(),
        };

        let (providers, ids) = raw.trim().split_once(':').ok_or_else(malformed)?;

        let mut providers = providers.split('+').map(str::trim);
        let mut ids = ids.split('+').map(str::trim);

        let provider = providers.next().unwrap_or_default();
        let id = ids.next().unwrap_or_default();
        if provider.is_empty() || id.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            provider: provider.to_string(),
            id: id.to_string(),
            alt_provider: providers.next().map(str::to_string).and_then(non_empty),
            alt_id: ids.next().map(str::to_string).and_then(non_empty),
        })
    }

    /// Returns the primary provider, such as `freebase`.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the id within the primary provider.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn alt_provider(&self) -> Option<&str> {
        self.alt_provider.as_deref()
    }

    pub fn alt_id(&self) -> Option<&str> {
        self.alt_id.as_deref()
    }

    /// Returns true when a secondary provider or id is bound.
    pub fn is_dual(&self) -> bool {
        self.alt_provider.is_some() || self.alt_id.is_some()
    }

    /// Returns `provider` or `provider+altProvider`.
    pub fn provider_segment(&self) -> String {
        match &self.alt_provider {
            Some(alt) => format!("{}+{}", self.provider, alt),
            None => self.provider.clone(),
        }
    }

    pub(crate) fn set_alt_provider(&mut self, provider: String) {
        self.alt_provider = non_empty(provider);
    }

    pub(crate) fn set_alt_id(&mut self, id: String) {
        self.alt_id = non_empty(id);
    }
}

impl fmt::Display for CombinedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_segment(), self.id)?;
        if let Some(alt_id) = &self.alt_id {
            write!(f, "+{alt_id}")?;
        }
        Ok(())
    }
}

impl FromStr for CombinedId {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
