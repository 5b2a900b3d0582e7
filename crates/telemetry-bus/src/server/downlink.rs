use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::registry::MetricRegistry;
use crate::scheduler::TelemetryScheduler;

/// Downlink sender's backoff floor, per the state machine in §4.5.
pub const MIN_WAIT: Duration = Duration::from_millis(1);
/// Downlink sender's backoff ceiling.
pub const MAX_WAIT: Duration = Duration::from_millis(1000);

/// Rate-paced downlink sender (§4.5). Only one outstanding send at a
/// time: `IDLE → SENDING → WAIT_RATE → IDLE` when the scheduler has a
/// packet, `IDLE → BACKOFF → IDLE` with exponential backoff when it does
/// not.
#[instrument(name = "downlink", skip_all, fields(bind = %bind_addr, target = %target_addr))]
pub async fn run(
    bind_addr: SocketAddr,
    target_addr: SocketAddr,
    registry: MetricRegistry,
    mut scheduler: TelemetryScheduler,
) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(bind_addr).await?;
    info!("downlink sender bound");
    let mut backoff = MIN_WAIT;
    loop {
        match scheduler.pop() {
            Some(pkt) => {
                backoff = MIN_WAIT;
                let sent_len = pkt.len();
                if let Err(e) = socket.send_to(&pkt, target_addr).await {
                    warn!(error = %e, "downlink send_to failed");
                }
                sleep(rate_pacing_interval(sent_len, registry.bps())).await;
            }
            None => {
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_WAIT);
            }
        }
    }
}

/// `t = (bytes_sent·8)/bps` seconds, per §4.5. A `bps` of zero would make
/// this infinite; treat it as "send unthrottled" instead of stalling the
/// reactor forever.
fn rate_pacing_interval(sent_len: usize, bps: u32) -> Duration {
    if bps == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64((sent_len as f64 * 8.0) / bps as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_pacing_matches_formula() {
        // 100 bytes @ 8000 bps => 800 bits / 8000 bps = 0.1s
        let interval = rate_pacing_interval(100, 8000);
        assert!((interval.as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn zero_bps_does_not_stall() {
        assert_eq!(rate_pacing_interval(100, 0), Duration::ZERO);
    }
}
