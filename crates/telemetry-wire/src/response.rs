use crate::codec::read_u8;
use crate::error::WireError;
use crate::ids::MetricId;
use crate::primitive::PrimitiveValue;
use bytes::{Buf, Bytes, BytesMut, BufMut};

/// Core → request-client reply. `primitive` absent means "not available":
/// either the metric has never produced a sample, or its latest sample is
/// a `File` (files are never served over request/response).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub metric_id: MetricId,
    pub primitive: Option<PrimitiveValue>,
}

impl Response {
    pub fn success(metric_id: MetricId, value: PrimitiveValue) -> Self {
        Self {
            metric_id,
            primitive: Some(value),
        }
    }

    pub fn failure(metric_id: MetricId) -> Self {
        Self {
            metric_id,
            primitive: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.primitive.is_none()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.metric_id.encode(&mut buf);
        match &self.primitive {
            Some(v) => {
                buf.put_u8(1);
                v.encode(&mut buf);
            }
            None => buf.put_u8(0),
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, WireError> {
        let metric_id = MetricId::decode(&mut bytes)?;
        let has_primitive = read_u8(&mut bytes)? != 0;
        let primitive = if has_primitive {
            Some(PrimitiveValue::decode(&mut bytes)?)
        } else {
            None
        };
        crate::codec::ensure_exhausted(&bytes)?;
        Ok(Self { metric_id, primitive })
    }
}
