use serde::{Deserialize, Serialize};

use super::TermIdentity;

/// Image service used for `freebase` image ids.
pub const FREEBASE_IMAGE_URL: &str = "https://usercontent.googleapis.com/freebase/v1/image";

const FREEBASE_IMAGE_PARAMS: &str = "?maxwidth=150&maxheight=150&mode=fillcropmid";

/// Settings that shape display payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadOptions {
    /// API key appended to freebase image URLs.
    pub freebase_api_key: Option<String>,
}

/// What the autocomplete list needs to render one result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPayload {
    pub name: String,
    pub provider_label: String,
    pub disambiguators: Vec<String>,
    pub description: String,
    pub frequency: u64,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl DisplayPayload {
    pub fn from_term(term: &TermIdentity, frequency: u64, options: &PayloadOptions) -> Self {
        Self {
            name: term.name().to_string(),
            provider_label: term.provider_label(),
            disambiguators: term.disambiguators().into_iter().map(String::from).collect(),
            description: term.description().to_string(),
            frequency,
            order: term.order(),
            image: image_hint(term, options),
        }
    }
}

/// Resolves `data.image` into something displayable.
///
/// Freebase images are ids on the image service; other providers store URLs.
pub fn image_hint(term: &TermIdentity, options: &PayloadOptions) -> Option<String> {
    let image = term.data().image()?;
    if term.provider() != "freebase" {
        return Some(image.to_string());
    }

    let mut url = format!("{FREEBASE_IMAGE_URL}{image}{FREEBASE_IMAGE_PARAMS}");
    if let Some(key) = options.freebase_api_key.as_deref().filter(|k| !k.is_empty()) {
        url.push_str("&key=");
        url.push_str(key);
    }
    Some(url)
}
