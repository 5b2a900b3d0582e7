use crate::codec::{read_bounded_string, read_f32, read_f64, read_i32, read_i64, read_u8};
use crate::error::WireError;
use bytes::{Buf, BufMut};

/// Maximum length in bytes of a [`PrimitiveValue::Str`] payload.
pub const MAX_STRING_LEN: usize = 64;

const TAG_INT: u8 = 0;
const TAG_LONG: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_BOOL: u8 = 4;
const TAG_STRING: u8 = 5;

/// The small fixed set of scalar types the bus can transmit by value.
///
/// Mirrors the ingest and response `Primitive` oneof of the wire format
/// exactly (int/long/float/double/bool/string), not the subset a single
/// upstream handler happened to implement.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl PrimitiveValue {
    pub fn new_string(s: impl Into<String>) -> Result<Self, WireError> {
        let s = s.into();
        if s.len() > MAX_STRING_LEN {
            return Err(WireError::StringTooLong { max: MAX_STRING_LEN });
        }
        Ok(Self::Str(s))
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        match self {
            PrimitiveValue::Int(v) => {
                buf.put_u8(TAG_INT);
                buf.put_i32(*v);
            }
            PrimitiveValue::Long(v) => {
                buf.put_u8(TAG_LONG);
                buf.put_i64(*v);
            }
            PrimitiveValue::Float(v) => {
                buf.put_u8(TAG_FLOAT);
                buf.put_f32(*v);
            }
            PrimitiveValue::Double(v) => {
                buf.put_u8(TAG_DOUBLE);
                buf.put_f64(*v);
            }
            PrimitiveValue::Bool(v) => {
                buf.put_u8(TAG_BOOL);
                buf.put_u8(*v as u8);
            }
            PrimitiveValue::Str(v) => {
                debug_assert!(v.len() <= MAX_STRING_LEN);
                buf.put_u8(TAG_STRING);
                buf.put_u8(v.len() as u8);
                buf.put_slice(v.as_bytes());
            }
        }
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        let tag = read_u8(buf)?;
        match tag {
            TAG_INT => Ok(PrimitiveValue::Int(read_i32(buf)?)),
            TAG_LONG => Ok(PrimitiveValue::Long(read_i64(buf)?)),
            TAG_FLOAT => Ok(PrimitiveValue::Float(read_f32(buf)?)),
            TAG_DOUBLE => Ok(PrimitiveValue::Double(read_f64(buf)?)),
            TAG_BOOL => Ok(PrimitiveValue::Bool(read_u8(buf)? != 0)),
            TAG_STRING => Ok(PrimitiveValue::Str(read_bounded_string(buf, MAX_STRING_LEN)?)),
            other => Err(WireError::UnknownPrimitiveTag { tag: other }),
        }
    }
}
