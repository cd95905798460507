mod attributes;
mod combined_id;
mod display;
pub mod escape;
mod term_data;
mod term_identity;
mod term_record;

pub use attributes::{DataField, TermAttributes};
pub use combined_id::CombinedId;
pub use display::{DisplayPayload, FREEBASE_IMAGE_URL, PayloadOptions, image_hint};
pub use term_data::{
    ALT_ID_KEY, ALT_PROVIDER_KEY, DataValue, GEOCODE_KEY, Geocode, IMAGE_KEY, TermData,
};
pub use term_identity::TermIdentity;
pub use term_record::{MAX_TERM_NAME_CHARS, TermId, TermRecord};
