use std::net::SocketAddr;

use telemetry_wire::IngestSample;
use tokio::net::UdpSocket;
use tracing::{info, instrument, warn};

use crate::registry::MetricRegistry;
use crate::server::hex_preview;

/// Local-ingest listener (§4.5): decodes each datagram into a `Sample`
/// and hands it to `registry.add_sample`. Decode failures are logged and
/// dropped; the loop never terminates on malformed input.
#[instrument(name = "ingest", skip_all, fields(addr = %addr))]
pub async fn run(addr: SocketAddr, registry: MetricRegistry) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!("ingest listener bound");
    let mut buf = vec![0u8; telemetry_wire::sample::MAX_INGEST_FRAME_LEN];
    loop {
        let (len, _from) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "ingest recv_from failed");
                continue;
            }
        };
        let datagram = bytes::Bytes::copy_from_slice(&buf[..len]);
        match IngestSample::decode(datagram.clone()) {
            Ok(sample) => {
                registry.add_sample(sample.metadata.metric_id.clone(), sample.metadata, sample.data);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    preview = %hex_preview(&datagram, 16),
                    "dropping malformed ingest datagram"
                );
            }
        }
    }
}
