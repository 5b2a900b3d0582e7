use std::net::SocketAddr;

use telemetry_wire::{Request, Response};
use tokio::net::UdpSocket;
use tracing::{info, instrument, warn};

use crate::registry::MetricRegistry;
use crate::server::hex_preview;

/// Request/response responder (§4.5): decodes `Request{metric_id}`,
/// answers with the registry's latest encoded response, and never blocks
/// on the downlink path.
#[instrument(name = "request", skip_all, fields(addr = %addr))]
pub async fn run(addr: SocketAddr, registry: MetricRegistry) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!("request responder bound");
    let mut buf = vec![0u8; telemetry_wire::request::MAX_REQUEST_FRAME_LEN];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "request recv_from failed");
                continue;
            }
        };
        let datagram = bytes::Bytes::copy_from_slice(&buf[..len]);
        let request = match Request::decode(datagram.clone()) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    error = %e,
                    preview = %hex_preview(&datagram, 16),
                    "dropping malformed request datagram"
                );
                continue;
            }
        };
        let response = registry
            .get_latest_sample_response(&request.metric_id)
            .unwrap_or_else(|| Response::failure(request.metric_id.clone()).encode());
        if let Err(e) = socket.send_to(&response, from).await {
            warn!(error = %e, %from, "failed sending response");
        }
    }
}
