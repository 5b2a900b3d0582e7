use std::collections::BTreeSet;

use bytes::Bytes;
use telemetry_wire::{SampleData, SampleFrame, SampleMetadata};
use tracing::debug;

use crate::chunker::Chunker;

/// A sample handed from the registry to a transmitter for downlinking.
#[derive(Debug, Clone, PartialEq)]
pub struct AdoptedSample {
    pub metadata: SampleMetadata,
    pub data: SampleData,
}

/// Supplies the next sample to adopt, once the current one is fully sent.
/// Implemented by the registry so adoption flips `latest_downlinked` as a
/// side effect — see `MetricRegistry::take_for_downlink`.
pub trait SampleSource {
    fn next_sample(&mut self) -> Option<AdoptedSample>;
}

impl<F: FnMut() -> Option<AdoptedSample>> SampleSource for F {
    fn next_sample(&mut self) -> Option<AdoptedSample> {
        (self)()
    }
}

/// Owns the current outbound sample for one metric: chunking and
/// per-segment ACK state, and the logic to rotate to a newer sample once
/// every segment of the current one is acknowledged.
pub struct SampleTransmitter {
    source: Box<dyn SampleSource>,
    get_max_packet_size: Box<dyn Fn() -> u32>,
    sample_id: u32,
    chunker: Option<Chunker>,
    metadata: Option<SampleMetadata>,
    data_type: &'static str,
    unacked: BTreeSet<u32>,
    cursor: Option<u32>,
    warned_undersized: bool,
}

impl SampleTransmitter {
    pub fn new(source: Box<dyn SampleSource>, get_max_packet_size: Box<dyn Fn() -> u32>) -> Self {
        Self {
            source,
            get_max_packet_size,
            sample_id: 0,
            chunker: None,
            metadata: None,
            data_type: "primitive",
            unacked: BTreeSet::new(),
            cursor: None,
            warned_undersized: false,
        }
    }

    pub fn sample_id(&self) -> u32 {
        self.sample_id
    }

    pub fn is_done(&self) -> bool {
        self.unacked.is_empty()
    }

    /// Returns the next encoded `SampleFrame` for the wire, or `None` if
    /// there is nothing new to send.
    pub fn get_packet(&mut self) -> Option<Bytes> {
        if self.chunker.is_none() || self.unacked.is_empty() {
            if !self.adopt_new_sample() {
                return None;
            }
        }
        let chunker = self.chunker.as_ref().expect("adopted above");
        let metadata = self.metadata.as_ref().expect("adopted above");
        let seq = self.cursor.expect("cursor set whenever chunker is present");
        let chunk = chunker
            .chunk(seq)
            .expect("cursor always indexes an in-range chunk");
        self.advance_cursor();
        let frame = SampleFrame {
            metric_id: metadata.metric_id.clone(),
            timestamp: metadata.timestamp,
            data_type: self.data_type,
            sample_id: self.sample_id,
            num_segments: chunker.num_chunks(),
            seqnum: seq,
            data: chunk.data,
        };
        Some(frame.encode())
    }

    /// Applies an ACK referencing `acked_sample_id`. Drops silently if it
    /// does not match the sample currently in flight. Idempotent: acking
    /// an already-removed seqnum is a no-op.
    pub fn handle_ack(&mut self, acked_sample_id: u32, seqnums: &[u32]) {
        if acked_sample_id != self.sample_id {
            return;
        }
        let mut removed_any = false;
        for seq in seqnums {
            if self.unacked.remove(seq) {
                removed_any = true;
            }
        }
        if removed_any {
            self.cursor = self.unacked.iter().next().copied();
        }
    }

    fn adopt_new_sample(&mut self) -> bool {
        let Some(adopted) = self.source.next_sample() else {
            return false;
        };
        let encoded = adopted.data.encode_data();
        let max_packet_size = (self.get_max_packet_size)();
        // The frame header itself (metric id + fixed fields) counts against
        // the packet budget, not just the chunk payload — otherwise a long
        // metric id could push the encoded frame past max_packet_size.
        let header_len = SampleFrame::encoded_len(&adopted.metadata.metric_id, 0);
        let chunk_size = max_packet_size.saturating_sub(header_len);
        if chunk_size == 0 && !self.warned_undersized {
            // Even a single byte of chunk data makes the frame exceed
            // max_packet_size here; there is no smaller chunk size that
            // would fit. Logged at debug, matching the original
            // implementation's handling of this condition.
            debug!(
                max_packet_size = max_packet_size,
                header_len = header_len,
                "frame header alone meets or exceeds max_packet_size; packet will exceed the configured budget"
            );
            self.warned_undersized = true;
        }
        let chunker = Chunker::new(encoded, chunk_size as usize)
            .expect("encoded sample data is never empty: every SampleData encoding starts with a tag byte");
        self.unacked = (0..chunker.num_chunks()).collect();
        self.cursor = self.unacked.iter().next().copied();
        self.data_type = adopted.data.data_type();
        self.metadata = Some(adopted.metadata);
        self.chunker = Some(chunker);
        self.sample_id = self.sample_id.wrapping_add(1);
        true
    }

    fn advance_cursor(&mut self) {
        let Some(cur) = self.cursor else { return };
        self.cursor = self
            .unacked
            .range((cur + 1)..)
            .next()
            .copied()
            .or_else(|| self.unacked.iter().next().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_wire::{MetricId, PrimitiveValue};

    fn metadata() -> SampleMetadata {
        SampleMetadata {
            metric_id: MetricId::new("altitude").unwrap(),
            timestamp: 1000.0,
        }
    }

    fn source_yielding(samples: Vec<Option<AdoptedSample>>) -> Box<dyn SampleSource> {
        let mut iter = samples.into_iter();
        Box::new(move || iter.next().flatten())
    }

    fn fixed(n: u32) -> Box<dyn Fn() -> u32> {
        Box::new(move || n)
    }

    #[test]
    fn no_sample_yields_none() {
        let mut t = SampleTransmitter::new(source_yielding(vec![None]), fixed(100));
        assert_eq!(t.get_packet(), None);
    }

    #[test]
    fn single_small_sample_repeats_until_acked() {
        let sample = AdoptedSample {
            metadata: metadata(),
            data: SampleData::Primitive(PrimitiveValue::Bool(true)),
        };
        let mut t = SampleTransmitter::new(source_yielding(vec![Some(sample)]), fixed(100));
        let pkt1 = t.get_packet().unwrap();
        let pkt2 = t.get_packet().unwrap();
        assert_eq!(pkt1, pkt2, "singleton unacked set retransmits the same segment");
        assert_eq!(t.sample_id(), 1);
    }

    #[test]
    fn chunked_sample_cycles_through_all_segments() {
        let sample = AdoptedSample {
            metadata: metadata(),
            data: SampleData::new_file("x".repeat(100), "bin").unwrap(),
        };
        // "altitude" header_len = 9 (metric id) + 19 (fixed fields) = 28;
        // fixed(40) leaves chunk_size = 12, and the encoded file payload
        // (tag+len+100+ext ~= 107 bytes) needs several of those to fit.
        let mut t = SampleTransmitter::new(source_yielding(vec![Some(sample)]), fixed(40));
        let first = telemetry_wire::SampleFrame::decode(t.get_packet().unwrap()).unwrap();
        assert!(first.num_segments > 1, "100-byte file path at chunk_size=12 must span multiple segments");
    }

    #[test]
    fn ack_for_wrong_sample_id_is_noop() {
        let sample = AdoptedSample {
            metadata: metadata(),
            data: SampleData::Primitive(PrimitiveValue::Int(1)),
        };
        let mut t = SampleTransmitter::new(source_yielding(vec![Some(sample)]), fixed(100));
        t.get_packet();
        t.handle_ack(999, &[0]);
        assert!(!t.is_done(), "ack referencing the wrong sample_id must not mutate unacked");
    }

    #[test]
    fn ack_idempotence() {
        let sample = AdoptedSample {
            metadata: metadata(),
            data: SampleData::Primitive(PrimitiveValue::Int(1)),
        };
        let mut t = SampleTransmitter::new(source_yielding(vec![Some(sample)]), fixed(100));
        t.get_packet();
        t.handle_ack(1, &[0]);
        assert!(t.is_done());
        t.handle_ack(1, &[0]);
        assert!(t.is_done(), "re-applying an already-removed seqnum is a no-op");
    }

    #[test]
    fn draining_unacked_does_not_auto_adopt() {
        let first = AdoptedSample {
            metadata: metadata(),
            data: SampleData::Primitive(PrimitiveValue::Int(1)),
        };
        let second = AdoptedSample {
            metadata: metadata(),
            data: SampleData::Primitive(PrimitiveValue::Int(2)),
        };
        let mut t = SampleTransmitter::new(source_yielding(vec![Some(first), Some(second)]), fixed(100));
        t.get_packet();
        t.handle_ack(1, &[0]);
        assert!(t.is_done());
        // ACK alone must not have pulled the second sample in yet.
        assert_eq!(t.sample_id(), 1);
        t.get_packet();
        assert_eq!(t.sample_id(), 2);
    }

    #[test]
    fn undersized_packet_budget_clamps_instead_of_panicking() {
        let sample = AdoptedSample {
            metadata: metadata(),
            data: SampleData::Primitive(PrimitiveValue::Int(1)),
        };
        let mut t = SampleTransmitter::new(source_yielding(vec![Some(sample)]), fixed(20));
        assert!(t.get_packet().is_some());
    }
}
