use crate::error::WireError;
use serde::Deserialize;

/// `{"ack":{"metric_id":"<id>","sample_id":N,"seqnums":[...]}}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AckPayload {
    pub metric_id: String,
    pub sample_id: u32,
    pub seqnums: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetBpsPayload {
    pub bps: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetMaxPktSizePayload {
    pub max_pkt_size: u32,
}

/// One of the three recognized uplink telecommand shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Telecommand {
    Ack(AckPayload),
    SetBps(SetBpsPayload),
    SetMaxPktSize(SetMaxPktSizePayload),
}

/// Raw shape the JSON is deserialized into before dispatch — mirrors the
/// upstream handler's `contains("ack")` / `contains("set_bps")` checks,
/// just type-checked instead of string-keyed.
#[derive(Debug, Deserialize)]
struct RawTelecommand {
    ack: Option<AckPayload>,
    set_bps: Option<SetBpsPayload>,
    set_max_pkt_size: Option<SetMaxPktSizePayload>,
}

impl Telecommand {
    /// Parses a UTF-8 JSON datagram into a recognized telecommand.
    ///
    /// An unrecognized shape (missing all three keys, or invalid JSON) is
    /// always a `WireError`, never a panic — the telecommand listener logs
    /// and drops it per the bus's error policy, leaving its own state and
    /// the listener's ability to accept future datagrams untouched.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        let raw: RawTelecommand =
            serde_json::from_slice(bytes).map_err(|e| WireError::Telecommand(e.to_string()))?;
        if let Some(ack) = raw.ack {
            return Ok(Telecommand::Ack(ack));
        }
        if let Some(set_bps) = raw.set_bps {
            return Ok(Telecommand::SetBps(set_bps));
        }
        if let Some(set_max_pkt_size) = raw.set_max_pkt_size {
            return Ok(Telecommand::SetMaxPktSize(set_max_pkt_size));
        }
        Err(WireError::Telecommand(
            "none of ack/set_bps/set_max_pkt_size present".to_string(),
        ))
    }
}
