use std::net::SocketAddr;

use telemetry_wire::Telecommand;
use tokio::net::UdpSocket;
use tracing::{info, instrument, warn};

use crate::registry::MetricRegistry;

/// Telecommand listener (§4.5): parses JSON uplink datagrams and applies
/// ACKs / runtime parameter changes. An unrecognized shape is logged and
/// dropped; the listener keeps accepting subsequent well-formed commands.
#[instrument(name = "telecommand", skip_all, fields(addr = %addr))]
pub async fn run(addr: SocketAddr, registry: MetricRegistry) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!("telecommand listener bound");
    let mut buf = vec![0u8; 4096];
    loop {
        let (len, _from) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "telecommand recv_from failed");
                continue;
            }
        };
        match Telecommand::parse(&buf[..len]) {
            Ok(Telecommand::Ack(ack)) => registry.handle_ack(&ack),
            Ok(Telecommand::SetBps(cmd)) => {
                info!(bps = cmd.bps, "applying set_bps telecommand");
                registry.set_bps(cmd.bps);
            }
            Ok(Telecommand::SetMaxPktSize(cmd)) => {
                info!(max_pkt_size = cmd.max_pkt_size, "applying set_max_pkt_size telecommand");
                registry.set_max_packet_size(cmd.max_pkt_size);
            }
            Err(e) => warn!(error = %e, "telecommand not recognized"),
        }
    }
}
