use std::collections::HashMap;

use bytes::Bytes;
use telemetry_wire::MetricId;

use crate::registry::{MetricIterator, MetricRegistry};

/// Round-robin iterator over metrics with a token-bucket fairness rule.
/// Produces the next downlink packet, or `None` if no metric currently
/// has anything to send.
pub struct TelemetryScheduler {
    registry: MetricRegistry,
    iterator: MetricIterator,
    token_count: HashMap<MetricId, u32>,
}

impl TelemetryScheduler {
    pub fn new(registry: MetricRegistry) -> Self {
        let iterator = registry.metric_iterator();
        Self {
            registry,
            iterator,
            token_count: HashMap::new(),
        }
    }

    /// Visits at most `num_metrics` metrics once each. A metric only
    /// consumes its accrued tokens when it actually yields a packet —
    /// falling through to the next metric on an empty transmitter does
    /// not cost it a token, per the fairness invariant in §4.4.
    pub fn pop(&mut self) -> Option<Bytes> {
        let num_metrics = self.registry.num_metrics();
        for _ in 0..num_metrics {
            let metric_id = self.iterator.next_id()?;
            let threshold = self.registry.token_threshold(&metric_id).unwrap_or(1).max(1);
            let count = self.token_count.entry(metric_id.clone()).or_insert(1);
            *count += 1;
            if *count >= threshold {
                if let Some(pkt) = self.registry.get_packet_for(&metric_id) {
                    self.token_count.insert(metric_id, 0);
                    return Some(pkt);
                }
            }
        }
        None
    }
}
