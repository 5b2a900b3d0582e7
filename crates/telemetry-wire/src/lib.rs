//! Sans-io wire codecs for the onboard telemetry bus.
//!
//! Everything in this crate is pure encode/decode — no sockets, no
//! clocks, no shared state. `telemetry-bus` wires these codecs to UDP
//! sockets and to the registry/scheduler that own runtime state.
//!
//! Modules:
//! - [`ids`] — the bounded `MetricId` type.
//! - [`primitive`] — the scalar `PrimitiveValue` union.
//! - [`sample`] — ingest-frame samples (`Primitive` or `File`).
//! - [`request`] / [`response`] — the request/response micro-protocol.
//! - [`frame`] — downlink per-segment `SampleFrame`.
//! - [`telecommand`] — uplink JSON telecommand parsing.

mod codec;
pub mod error;
pub mod frame;
pub mod ids;
pub mod primitive;
pub mod request;
pub mod response;
pub mod sample;
pub mod telecommand;

pub use error::WireError;
pub use frame::SampleFrame;
pub use ids::MetricId;
pub use primitive::PrimitiveValue;
pub use request::Request;
pub use response::Response;
pub use sample::{IngestSample, SampleData, SampleMetadata};
pub use telecommand::{AckPayload, SetBpsPayload, SetMaxPktSizePayload, Telecommand};
