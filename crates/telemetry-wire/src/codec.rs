//! Small shared helpers for the length-prefixed, tagged encoding used
//! throughout this crate. Every wire type in this crate builds on these
//! instead of pulling in a full protobuf runtime — the spec only requires
//! "any standard varint/tag-length encoding [...] provided sender and core
//! agree", and a hand-rolled tag+length scheme is the simplest one that
//! satisfies it.

use crate::error::WireError;
use bytes::Buf;

pub(crate) fn read_u8(buf: &mut impl Buf) -> Result<u8, WireError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn read_u16(buf: &mut impl Buf) -> Result<u16, WireError> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn read_u32(buf: &mut impl Buf) -> Result<u32, WireError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32())
}

pub(crate) fn read_i32(buf: &mut impl Buf) -> Result<i32, WireError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_i32())
}

pub(crate) fn read_i64(buf: &mut impl Buf) -> Result<i64, WireError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_i64())
}

pub(crate) fn read_f32(buf: &mut impl Buf) -> Result<f32, WireError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_f32())
}

pub(crate) fn read_f64(buf: &mut impl Buf) -> Result<f64, WireError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_f64())
}

pub(crate) fn read_bytes(buf: &mut impl Buf, len: usize) -> Result<Vec<u8>, WireError> {
    ensure_remaining(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub(crate) fn read_bounded_string(buf: &mut impl Buf, max: usize) -> Result<String, WireError> {
    let len = read_u8(buf)? as usize;
    if len > max {
        return Err(WireError::StringTooLong { max });
    }
    let bytes = read_bytes(buf, len)?;
    String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), WireError> {
    if buf.remaining() < needed {
        Err(WireError::Truncated {
            needed,
            available: buf.remaining(),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn ensure_exhausted(buf: &impl Buf) -> Result<(), WireError> {
    if buf.remaining() > 0 {
        Err(WireError::TrailingBytes {
            extra: buf.remaining(),
        })
    } else {
        Ok(())
    }
}
