/// Errors that can occur while decoding a lease record.
///
/// Decoding never yields a partial result: any structural problem in the
/// stored bytes is reported through one of these variants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The bytes are not a JSON object of the expected shape, or a required
    /// field is missing or has the wrong type.
    #[error("malformed lease record: {reason}")]
    Malformed { reason: String },

    /// The schema version tag is not one this codec understands.
    #[error("unsupported lease record version {version}")]
    UnsupportedVersion { version: u64 },

    /// A bound is not a decimal integer.
    #[error("lease record field `{field}` is not a decimal integer: {value:?}")]
    InvalidBound { field: &'static str, value: String },

    /// A bound is a decimal integer that does not fit in 64 signed bits.
    #[error("lease record field `{field}` overflows a 64-bit producer id: {value}")]
    Overflow { field: &'static str, value: String },

    /// The bounds are negative or reversed.
    #[error("lease record range is invalid: start {start}, end {end}")]
    InvalidRange { start: i64, end: i64 },
}

impl DecodeError {
    /// Returns `true` for numeric overflow, which the allocator handles like
    /// exhaustion of the producer ID space.
    pub const fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow { .. })
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            reason: err.to_string(),
        }
    }
}
