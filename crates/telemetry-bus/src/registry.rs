use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use bytes::Bytes;
use telemetry_wire::{AckPayload, MetricId, Response, SampleData, SampleMetadata};
use tracing::warn;

use crate::transmitter::{AdoptedSample, SampleTransmitter};

/// Default downlink rate cap, bits/sec.
pub const DEFAULT_BPS: u32 = 100_000;
/// Default upper bound on a downlink datagram, bytes.
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 100;
/// Default fairness weight for a newly-seen metric.
pub const DEFAULT_TOKEN_THRESHOLD: u32 = 1;

struct MetricEntry {
    token_threshold: u32,
    latest: Option<AdoptedSample>,
    latest_downlinked: bool,
    transmitter: SampleTransmitter,
}

struct Inner {
    bps: u32,
    max_packet_size: u32,
    metrics: HashMap<MetricId, MetricEntry>,
    /// Insertion order, so a `MetricIterator` survives later inserts
    /// instead of depending on a hash map's unstable iteration order.
    order: Vec<MetricId>,
}

/// The shared mutable registry: `metric_id → MetricInfo`, plus the global
/// downlink rate and packet-size parameters. The only shared mutable state
/// in the process; protected by a single `RefCell` since the whole bus
/// runs on one cooperative, single-threaded reactor (see the runtime
/// choice recorded for §5) — there is never a second thread that could
/// contend for this borrow.
#[derive(Clone)]
pub struct MetricRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl MetricRegistry {
    pub fn new(bps: u32, max_packet_size: u32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                bps,
                max_packet_size,
                metrics: HashMap::new(),
                order: Vec::new(),
            })),
        }
    }

    /// Ingests a new sample. Lazily creates the `MetricInfo` (and its
    /// `SampleTransmitter`) on first sight of a metric id. The
    /// transmitter's sample source holds only a weak back-reference to
    /// this registry plus the metric id, so registry → entry →
    /// transmitter → registry never forms a strong reference cycle.
    pub fn add_sample(&self, metric_id: MetricId, metadata: SampleMetadata, data: SampleData) {
        let mut inner = self.inner.borrow_mut();
        if !inner.metrics.contains_key(&metric_id) {
            let weak: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
            let fetch_id = metric_id.clone();
            let source = move || -> Option<AdoptedSample> {
                let inner_rc = weak.upgrade()?;
                let mut inner = inner_rc.borrow_mut();
                let entry = inner.metrics.get_mut(&fetch_id)?;
                if entry.latest_downlinked {
                    return None;
                }
                let sample = entry.latest.clone()?;
                entry.latest_downlinked = true;
                Some(sample)
            };
            let weak_for_size: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
            let get_max_packet_size = move || -> u32 {
                weak_for_size
                    .upgrade()
                    .map(|inner_rc| inner_rc.borrow().max_packet_size)
                    .unwrap_or(DEFAULT_MAX_PACKET_SIZE)
            };
            let transmitter = SampleTransmitter::new(Box::new(source), Box::new(get_max_packet_size));
            inner.order.push(metric_id.clone());
            inner.metrics.insert(
                metric_id.clone(),
                MetricEntry {
                    token_threshold: DEFAULT_TOKEN_THRESHOLD,
                    latest: None,
                    latest_downlinked: false,
                    transmitter,
                },
            );
        }
        let entry = inner
            .metrics
            .get_mut(&metric_id)
            .expect("just inserted above if missing");
        entry.latest = Some(AdoptedSample { metadata, data });
        entry.latest_downlinked = false;
    }

    /// Encodes the latest value of `metric_id` as a single-datagram
    /// `Response`. `File` samples and unknown metrics both yield a
    /// failure response (absent `primitive`); an entirely unknown metric
    /// returns `None` instead, since there is no `MetricId` to echo back.
    pub fn get_latest_sample_response(&self, metric_id: &MetricId) -> Option<Bytes> {
        let inner = self.inner.borrow();
        let entry = inner.metrics.get(metric_id)?;
        let response = match &entry.latest {
            Some(sample) => match &sample.data {
                SampleData::Primitive(v) => Response::success(metric_id.clone(), v.clone()),
                SampleData::File { .. } => Response::failure(metric_id.clone()),
            },
            None => Response::failure(metric_id.clone()),
        };
        Some(response.encode())
    }

    pub fn handle_ack(&self, ack: &AckPayload) {
        let mut inner = self.inner.borrow_mut();
        let Ok(metric_id) = MetricId::new(ack.metric_id.clone()) else {
            warn!(metric_id = %ack.metric_id, "ack references an invalid metric id");
            return;
        };
        match inner.metrics.get_mut(&metric_id) {
            Some(entry) => entry.transmitter.handle_ack(ack.sample_id, &ack.seqnums),
            None => warn!(metric_id = %ack.metric_id, "ack for unknown metric"),
        }
    }

    pub fn set_bps(&self, bps: u32) {
        self.inner.borrow_mut().bps = bps;
    }

    pub fn bps(&self) -> u32 {
        self.inner.borrow().bps
    }

    pub fn set_max_packet_size(&self, max_packet_size: u32) {
        self.inner.borrow_mut().max_packet_size = max_packet_size;
    }

    pub fn max_packet_size(&self) -> u32 {
        self.inner.borrow().max_packet_size
    }

    pub fn num_metrics(&self) -> usize {
        self.inner.borrow().order.len()
    }

    pub fn metric_exists(&self, metric_id: &MetricId) -> bool {
        self.inner.borrow().metrics.contains_key(metric_id)
    }

    pub fn token_threshold(&self, metric_id: &MetricId) -> Option<u32> {
        self.inner
            .borrow()
            .metrics
            .get(metric_id)
            .map(|e| e.token_threshold)
    }

    /// Pulls the next downlink packet for `metric_id`, if any — used by
    /// the `TelemetryScheduler`, which owns the fairness bookkeeping.
    pub fn get_packet_for(&self, metric_id: &MetricId) -> Option<Bytes> {
        let mut inner = self.inner.borrow_mut();
        inner.metrics.get_mut(metric_id)?.transmitter.get_packet()
    }

    /// Returns a cyclic, insertion-ordered iterator over known metric ids.
    /// Its position is owned by the caller (typically the scheduler) so it
    /// resumes correctly across repeated `pop()` calls.
    pub fn metric_iterator(&self) -> MetricIterator {
        MetricIterator {
            inner: self.inner.clone(),
            pos: 0,
        }
    }
}

/// Cyclic iterator over a registry's metric ids in insertion order.
/// Wraps around at the end; returns `None` only when the registry has no
/// metrics at all.
pub struct MetricIterator {
    inner: Rc<RefCell<Inner>>,
    pos: usize,
}

impl MetricIterator {
    pub fn next_id(&mut self) -> Option<MetricId> {
        let inner = self.inner.borrow();
        if inner.order.is_empty() {
            return None;
        }
        let id = inner.order[self.pos % inner.order.len()].clone();
        self.pos = (self.pos + 1) % inner.order.len();
        Some(id)
    }
}
