use crate::error::WireError;
use crate::ids::MetricId;
use bytes::{Bytes, BytesMut};

/// Upper bound on an encoded request datagram.
pub const MAX_REQUEST_FRAME_LEN: usize = 128;

/// A request-client → core query for the latest value of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub metric_id: MetricId,
}

impl Request {
    pub fn new(metric_id: MetricId) -> Self {
        Self { metric_id }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.metric_id.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, WireError> {
        if bytes.len() > MAX_REQUEST_FRAME_LEN {
            return Err(WireError::Truncated {
                needed: 0,
                available: bytes.len(),
            });
        }
        let metric_id = MetricId::decode(&mut bytes)?;
        crate::codec::ensure_exhausted(&bytes)?;
        Ok(Self { metric_id })
    }
}
