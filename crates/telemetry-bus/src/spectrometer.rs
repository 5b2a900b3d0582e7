//! The spectrometer hand-off: a periodic reactor task, not a dedicated
//! thread (the producer is a separate process this core does not
//! control). Polls a POSIX shared-memory region for a `ready` flag, and
//! on seeing it set, copies the record out, clears the flag, and
//! republishes the data through the registry as an ordinary sample.

use std::ffi::CString;
use std::io;
use std::ptr;

use telemetry_wire::{MetricId, SampleData, SampleMetadata};

use crate::registry::MetricRegistry;

/// Number of `f64` samples in the spectrometer's data buffer.
pub const SPECTROMETER_DATA_LEN: usize = 16384;

const ACTIVE_NONE: u8 = 0;
const ACTIVE_STANDARD: u8 = 1;
const ACTIVE_HIGH_RES: u8 = 2;

/// Mirrors the fixed layout of `/bcp_spectrometer_data` described in the
/// wire format (§6.6). `repr(C)` so field offsets match what the
/// collaborator producer process writes; this crate does not control
/// that producer's struct definition, only this contract.
#[repr(C)]
struct SpectrometerRegion {
    ready: u8,
    active_type: u8,
    timestamp: f64,
    data_size: u32,
    baseline: f64,
    data: [f64; SPECTROMETER_DATA_LEN],
}

/// Handle to the mapped shared-memory region. Closed (`munmap`/`close`)
/// on drop.
pub struct SpectrometerHandoff {
    ptr: *mut SpectrometerRegion,
    len: usize,
}

impl SpectrometerHandoff {
    /// Opens (but does not create) the named POSIX shared-memory region.
    /// The producer is responsible for creating and sizing it.
    pub fn open(name: &str) -> io::Result<Self> {
        let cname = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let len = std::mem::size_of::<SpectrometerRegion>();
        // SAFETY: shm_open/mmap are the documented POSIX interface for
        // opening a named shared-memory object; errors are surfaced via
        // errno and converted below rather than panicking.
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0o600) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        // The mapping holds its own reference; the fd is no longer needed.
        unsafe { libc::close(fd) };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            ptr: addr as *mut SpectrometerRegion,
            len,
        })
    }

    /// Polls the `ready` flag; if set, copies the record out, clears the
    /// flag, and returns it as a republishable sample.
    pub fn poll(&self) -> Option<SpectrometerSample> {
        // SAFETY: `self.ptr` points at a live mapping of at least
        // `size_of::<SpectrometerRegion>()` bytes for the lifetime of
        // `self`; `ready` is read/written with volatile access because the
        // producer is a separate process this allocation is shared with.
        unsafe {
            let ready_ptr = ptr::addr_of_mut!((*self.ptr).ready);
            if ptr::read_volatile(ready_ptr) == 0 {
                return None;
            }
            let active_type = ptr::read_volatile(ptr::addr_of!((*self.ptr).active_type));
            let timestamp = ptr::read_volatile(ptr::addr_of!((*self.ptr).timestamp));
            let data_size = ptr::read_volatile(ptr::addr_of!((*self.ptr).data_size)) as usize;
            let baseline = ptr::read_volatile(ptr::addr_of!((*self.ptr).baseline));
            let n = (data_size / std::mem::size_of::<f64>()).min(SPECTROMETER_DATA_LEN);
            let data_ptr = ptr::addr_of!((*self.ptr).data) as *const f64;
            let mut data = Vec::with_capacity(n);
            for i in 0..n {
                data.push(ptr::read_volatile(data_ptr.add(i)));
            }
            ptr::write_volatile(ready_ptr, 0);

            let kind = match active_type {
                ACTIVE_STANDARD => SpectrometerKind::Standard,
                ACTIVE_HIGH_RES => SpectrometerKind::HighRes { baseline },
                ACTIVE_NONE | _ => return None,
            };
            Some(SpectrometerSample {
                kind,
                timestamp,
                data,
            })
        }
    }
}

impl Drop for SpectrometerHandoff {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

pub enum SpectrometerKind {
    Standard,
    HighRes { baseline: f64 },
}

pub struct SpectrometerSample {
    pub kind: SpectrometerKind,
    pub timestamp: f64,
    pub data: Vec<f64>,
}

impl SpectrometerSample {
    fn metric_id(&self) -> &'static str {
        match self.kind {
            SpectrometerKind::Standard => "spec_std",
            SpectrometerKind::HighRes { .. } => "spec_hires",
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 8);
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }
}

/// Republishes one polled spectrometer record through the registry as a
/// `File`-free primitive-style sample: the raw little-endian f64 series is
/// carried as an opaque `File` payload (DSP downstream reassembles it; see
/// §1, spectrometer DSP is out of scope here) addressed to a synthetic
/// metric id.
pub fn republish(registry: &MetricRegistry, sample: SpectrometerSample) {
    let metric_id = MetricId::new(sample.metric_id()).expect("synthetic ids are short constants");
    let metadata = SampleMetadata {
        metric_id: metric_id.clone(),
        timestamp: sample.timestamp as f32,
    };
    let encoded = sample.encode();
    let tmp_path = format!("/tmp/{}.raw", sample.metric_id());
    // The bus has no durable storage of its own (§1 Non-goals); the path
    // is a handle for the downstream DSP collaborator to pick up, not a
    // persistence guarantee made by this process.
    let _ = std::fs::write(&tmp_path, &encoded);
    let data = SampleData::new_file(tmp_path, "raw").expect("path/extension within bounds");
    registry.add_sample(metric_id, metadata, data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_ids_match_kind() {
        let std_sample = SpectrometerSample {
            kind: SpectrometerKind::Standard,
            timestamp: 0.0,
            data: vec![1.0, 2.0],
        };
        assert_eq!(std_sample.metric_id(), "spec_std");
        let hires_sample = SpectrometerSample {
            kind: SpectrometerKind::HighRes { baseline: 0.5 },
            timestamp: 0.0,
            data: vec![1.0],
        };
        assert_eq!(hires_sample.metric_id(), "spec_hires");
    }

    #[test]
    fn encode_is_little_endian_f64() {
        let sample = SpectrometerSample {
            kind: SpectrometerKind::Standard,
            timestamp: 0.0,
            data: vec![1.0],
        };
        let encoded = sample.encode();
        assert_eq!(encoded, 1.0f64.to_le_bytes().to_vec());
    }

    /// End-to-end over a real POSIX shared-memory region: a producer
    /// writes a standard-mode record and sets `ready`, and `poll()` reads
    /// it back and clears the flag (the spectrometer hand-off scenario).
    #[test]
    fn poll_reads_a_real_shared_memory_handoff() {
        let name = "/telemetry_bus_test_spectrometer_handoff";
        let len = std::mem::size_of::<SpectrometerRegion>();
        let cname = CString::new(name).unwrap();
        unsafe {
            let fd = libc::shm_open(cname.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600);
            assert!(fd >= 0, "shm_open failed: {}", io::Error::last_os_error());
            assert_eq!(libc::ftruncate(fd, len as libc::off_t), 0);
            let addr = libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            );
            libc::close(fd);
            assert_ne!(addr, libc::MAP_FAILED);

            let region = addr as *mut SpectrometerRegion;
            (*region).active_type = ACTIVE_STANDARD;
            (*region).timestamp = 12345.0;
            (*region).data_size = 16; // two f64 samples
            (*region).data[0] = 1.0;
            (*region).data[1] = 2.0;
            (*region).ready = 1;
            libc::munmap(addr, len);
        }

        let handoff = SpectrometerHandoff::open(name).expect("open the region just created");
        let sample = handoff.poll().expect("ready flag was set by the producer");
        assert!(matches!(sample.kind, SpectrometerKind::Standard));
        assert_eq!(sample.timestamp, 12345.0);
        assert_eq!(sample.data, vec![1.0, 2.0]);
        assert!(handoff.poll().is_none(), "ready flag must be cleared after the first poll");

        unsafe { libc::shm_unlink(cname.as_ptr()) };
    }
}
