use crate::error::WireError;
use bytes::{Buf, BufMut};
use std::fmt;

/// Maximum length in bytes of a [`MetricId`] on the wire, not counting its length prefix.
pub const MAX_METRIC_ID_LEN: usize = 31;

/// A bounded UTF-8 identifier naming a measurement stream.
///
/// Uniquely names a metric within the process; construction enforces the
/// ≤31 byte bound so a validated `MetricId` can never fail to encode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId(String);

impl MetricId {
    pub fn new(id: impl Into<String>) -> Result<Self, WireError> {
        let id = id.into();
        if id.len() > MAX_METRIC_ID_LEN {
            return Err(WireError::MetricIdTooLong {
                max: MAX_METRIC_ID_LEN,
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size in bytes this id occupies on the wire, including its 1-byte
    /// length prefix.
    pub fn encoded_len(&self) -> u32 {
        1 + self.0.len() as u32
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        debug_assert!(self.0.len() <= MAX_METRIC_ID_LEN);
        buf.put_u8(self.0.len() as u8);
        buf.put_slice(self.0.as_bytes());
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        let len = crate::codec::read_u8(buf)? as usize;
        if len > MAX_METRIC_ID_LEN {
            return Err(WireError::MetricIdTooLong {
                max: MAX_METRIC_ID_LEN,
            });
        }
        let bytes = crate::codec::read_bytes(buf, len)?;
        let s = String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)?;
        Ok(Self(s))
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MetricId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
