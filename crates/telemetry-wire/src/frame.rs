use crate::codec::{read_f32, read_u16, read_u32};
use crate::error::WireError;
use crate::ids::MetricId;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const DATA_TYPE_PRIMITIVE: u8 = 0;
const DATA_TYPE_FILE: u8 = 1;

/// Size in bytes of every fixed-width field after the metric id: timestamp
/// (4) + data-type tag (1) + sample_id (4) + num_segments (4) + seqnum (4)
/// + chunk length prefix (2).
pub const FIXED_HEADER_LEN: u32 = 19;

/// One downlink datagram: a single numbered segment of one sample's
/// encoded payload. A full sample is reassembled at the ground by
/// concatenating `data` for `seqnum in 0..num_segments`, grouped by
/// `(metric_id, sample_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    pub metric_id: MetricId,
    pub timestamp: f32,
    pub data_type: &'static str,
    pub sample_id: u32,
    pub num_segments: u32,
    pub seqnum: u32,
    pub data: Bytes,
}

impl SampleFrame {
    /// Total encoded size of a frame carrying `chunk_len` bytes of chunk
    /// data for `metric_id`, including every header field.
    pub fn encoded_len(metric_id: &MetricId, chunk_len: u32) -> u32 {
        metric_id.encoded_len() + FIXED_HEADER_LEN + chunk_len
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.metric_id.encode(&mut buf);
        buf.put_f32(self.timestamp);
        buf.put_u8(match self.data_type {
            "file" => DATA_TYPE_FILE,
            _ => DATA_TYPE_PRIMITIVE,
        });
        buf.put_u32(self.sample_id);
        buf.put_u32(self.num_segments);
        buf.put_u32(self.seqnum);
        buf.put_u16(self.data.len() as u16);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, WireError> {
        let metric_id = MetricId::decode(&mut bytes)?;
        let timestamp = read_f32(&mut bytes)?;
        let data_type = match crate::codec::read_u8(&mut bytes)? {
            DATA_TYPE_FILE => "file",
            DATA_TYPE_PRIMITIVE => "primitive",
            other => return Err(WireError::UnknownDataTag { tag: other }),
        };
        let sample_id = read_u32(&mut bytes)?;
        let num_segments = read_u32(&mut bytes)?;
        let seqnum = read_u32(&mut bytes)?;
        let data_len = read_u16(&mut bytes)? as usize;
        let data = Bytes::from(crate::codec::read_bytes(&mut bytes, data_len)?);
        crate::codec::ensure_exhausted(&bytes)?;
        Ok(Self {
            metric_id,
            timestamp,
            data_type,
            sample_id,
            num_segments,
            seqnum,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips() {
        let f = SampleFrame {
            metric_id: MetricId::new("altitude").unwrap(),
            timestamp: 42.0,
            data_type: "primitive",
            sample_id: 7,
            num_segments: 3,
            seqnum: 1,
            data: Bytes::from_static(b"abc"),
        };
        let decoded = SampleFrame::decode(f.encode()).unwrap();
        assert_eq!(f, decoded);
    }
}
