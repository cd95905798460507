use thiserror::Error;

/// Errors raised while decoding the term micro-format.
///
/// Only `MalformedIdentity` and `MalformedEncoding` (for the pipe-field count)
/// invalidate a whole term. The remaining kinds are local: the decoder skips
/// the offending piece, logs it, and keeps the rest of the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermError {
    /// The combined id has no `:` separating provider from id, or one side is empty.
    #[error("malformed identity: {raw:?} is not of the form provider:id")]
    MalformedIdentity { raw: String },

    /// The encoded term (or one of its fields) does not have the expected shape.
    #[error("malformed encoding: {reason}")]
    MalformedEncoding { reason: String },

    /// A single data entry is missing its `key:value` colon.
    #[error("malformed data entry: {entry:?} has no key:value separator")]
    MalformedDataEntry { entry: String },

    /// A geocode value is not two `x`-separated numbers.
    #[error("malformed geocode: {value:?} is not latitude x longitude")]
    MalformedGeocode { value: String },
}

impl TermError {
    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            reason: reason.into(),
        }
    }

    /// Returns true for the kinds a term constructor fails with.
    ///
    /// The other kinds only ever describe a skipped data entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedIdentity { .. } | Self::MalformedEncoding { .. }
        )
    }
}
