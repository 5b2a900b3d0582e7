use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("cannot chunk empty data")]
    EmptyData,
    #[error("chunk sequence {seq} out of range, have {num_chunks} chunks")]
    OutOfRange { seq: u32, num_chunks: u32 },
}

/// One numbered segment of a chunked payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub seq: u32,
    pub offset: usize,
    pub data: Bytes,
}

/// Splits an owned payload into numbered, fixed-max-size segments.
///
/// The last chunk may be shorter than `chunk_size`; every other chunk is
/// exactly `chunk_size` bytes. `num_chunks = ceil(len / chunk_size)`.
#[derive(Debug, Clone)]
pub struct Chunker {
    data: Bytes,
    chunk_size: usize,
    num_chunks: u32,
}

impl Chunker {
    pub fn new(data: Bytes, max_chunk_size: usize) -> Result<Self, ChunkerError> {
        if data.is_empty() {
            return Err(ChunkerError::EmptyData);
        }
        // A pathologically small packet budget (see SampleTransmitter)
        // can drive max_chunk_size to 0; never let that divide by zero or
        // yield zero chunks for non-empty data.
        let chunk_size = max_chunk_size.max(1);
        let num_chunks = ((data.len() + chunk_size - 1) / chunk_size) as u32;
        Ok(Self {
            data,
            chunk_size,
            num_chunks: num_chunks.max(1),
        })
    }

    pub fn num_chunks(&self) -> u32 {
        self.num_chunks
    }

    pub fn chunk(&self, seq: u32) -> Result<Chunk, ChunkerError> {
        if seq >= self.num_chunks {
            return Err(ChunkerError::OutOfRange {
                seq,
                num_chunks: self.num_chunks,
            });
        }
        let offset = seq as usize * self.chunk_size;
        let end = (offset + self.chunk_size).min(self.data.len());
        Ok(Chunk {
            seq,
            offset,
            data: self.data.slice(offset..end),
        })
    }
}
