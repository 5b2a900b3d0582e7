use thiserror::Error;

/// Failure modes for decoding a datagram into one of this crate's wire types.
///
/// Every variant here is recoverable at the caller: per the bus's error
/// policy, a `WireError` is always logged and the offending datagram
/// dropped, never propagated past the server boundary that received it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram truncated: needed at least {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("metric id exceeds {max} bytes")]
    MetricIdTooLong { max: usize },

    #[error("string value exceeds {max} bytes")]
    StringTooLong { max: usize },

    #[error("unrecognized primitive tag byte {tag:#04x}")]
    UnknownPrimitiveTag { tag: u8 },

    #[error("unrecognized data-kind tag byte {tag:#04x}")]
    UnknownDataTag { tag: u8 },

    #[error("metric id / string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("trailing {extra} unconsumed bytes after decoding")]
    TrailingBytes { extra: usize },

    #[error("malformed telecommand JSON: {0}")]
    Telecommand(String),
}
