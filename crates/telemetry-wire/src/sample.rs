use crate::codec::{read_bounded_string, read_f32, read_u8};
use crate::error::WireError;
use crate::ids::MetricId;
use crate::primitive::PrimitiveValue;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const MAX_FILEPATH_LEN: usize = 256;
pub const MAX_EXTENSION_LEN: usize = 8;
/// Upper bound on an encoded ingest datagram, per the wire format.
pub const MAX_INGEST_FRAME_LEN: usize = 4096;

const DATA_TAG_PRIMITIVE: u8 = 0;
const DATA_TAG_FILE: u8 = 1;

/// `{metric_id, timestamp}` shared by every sample variant.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMetadata {
    pub metric_id: MetricId,
    /// Seconds since epoch. Kept as `f32` for wire compatibility with the
    /// upstream format; this caps resolution at roughly 7 significant
    /// digits, which is insufficient for microsecond precision far from
    /// the epoch — a known, accepted limitation, not an oversight.
    pub timestamp: f32,
}

/// Tagged union of the two kinds of payload a metric can carry.
///
/// Exactly one variant exists at a time by construction — there is no
/// "neither set" state representable in this type, matching the
/// specification's invariant directly instead of re-deriving it at
/// runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    Primitive(PrimitiveValue),
    File { filepath: String, extension: String },
}

impl SampleData {
    pub fn new_file(filepath: impl Into<String>, extension: impl Into<String>) -> Result<Self, WireError> {
        let filepath = filepath.into();
        let extension = extension.into();
        if filepath.len() > MAX_FILEPATH_LEN {
            return Err(WireError::StringTooLong { max: MAX_FILEPATH_LEN });
        }
        if extension.len() > MAX_EXTENSION_LEN {
            return Err(WireError::StringTooLong { max: MAX_EXTENSION_LEN });
        }
        Ok(Self::File { filepath, extension })
    }

    pub fn data_type(&self) -> &'static str {
        match self {
            SampleData::Primitive(_) => "primitive",
            SampleData::File { .. } => "file",
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SampleData::File { .. })
    }

    /// Encodes just the payload (no metadata) — this is what the
    /// `SampleTransmitter` chunks for downlink.
    pub fn encode_data(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            SampleData::Primitive(v) => {
                buf.put_u8(DATA_TAG_PRIMITIVE);
                v.encode(&mut buf);
            }
            SampleData::File { filepath, extension } => {
                buf.put_u8(DATA_TAG_FILE);
                buf.put_u16(filepath.len() as u16);
                buf.put_slice(filepath.as_bytes());
                buf.put_u8(extension.len() as u8);
                buf.put_slice(extension.as_bytes());
            }
        }
        buf.freeze()
    }

    pub(crate) fn decode_data(buf: &mut impl Buf) -> Result<Self, WireError> {
        let tag = read_u8(buf)?;
        match tag {
            DATA_TAG_PRIMITIVE => Ok(SampleData::Primitive(PrimitiveValue::decode(buf)?)),
            DATA_TAG_FILE => {
                let len = crate::codec::read_u16(buf)? as usize;
                if len > MAX_FILEPATH_LEN {
                    return Err(WireError::StringTooLong { max: MAX_FILEPATH_LEN });
                }
                let filepath_bytes = crate::codec::read_bytes(buf, len)?;
                let filepath = String::from_utf8(filepath_bytes).map_err(|_| WireError::InvalidUtf8)?;
                let extension = read_bounded_string(buf, MAX_EXTENSION_LEN)?;
                Ok(SampleData::File { filepath, extension })
            }
            other => Err(WireError::UnknownDataTag { tag: other }),
        }
    }
}

/// A single ingest datagram: one metadata header plus one `SampleData`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSample {
    pub metadata: SampleMetadata,
    pub data: SampleData,
}

impl IngestSample {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.metadata.metric_id.encode(&mut buf);
        buf.put_f32(self.metadata.timestamp);
        buf.put(self.data.encode_data());
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, WireError> {
        if bytes.len() > MAX_INGEST_FRAME_LEN {
            return Err(WireError::Truncated {
                needed: 0,
                available: bytes.len(),
            });
        }
        let metric_id = MetricId::decode(&mut bytes)?;
        let timestamp = read_f32(&mut bytes)?;
        let data = SampleData::decode_data(&mut bytes)?;
        crate::codec::ensure_exhausted(&bytes)?;
        Ok(Self {
            metadata: SampleMetadata { metric_id, timestamp },
            data,
        })
    }
}
