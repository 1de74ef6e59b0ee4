use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::source::SourceHandle;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Number of parts needed to send `size` bytes in `chunk_size` pieces.
///
/// An empty file still takes one (empty) part. Returns `None` for a zero
/// chunk size or a count that does not fit in `u32`.
pub fn part_count(size: u64, chunk_size: u64) -> Option<u32> {
    if chunk_size == 0 {
        return None;
    }
    if size == 0 {
        return Some(1);
    }
    u32::try_from(size.div_ceil(chunk_size)).ok()
}

/// One part of a file, ready to be sent.
#[derive(Debug, Clone)]
pub struct Part {
    /// 1-based part number.
    pub number: u32,
    /// Byte offset of the first byte within the file.
    pub offset: u64,
    /// Raw part data.
    pub data: Vec<u8>,
    /// SHA-256 hex checksum of `data`.
    pub checksum: String,
}

impl Part {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads a source in server-assigned parts, in ascending order.
pub struct PartReader {
    source: SourceHandle,
    chunk_size: u64,
    part_count: u32,
    next_number: u32,
    offset: u64,
}

impl PartReader {
    /// Rewinds `source` and prepares to read `part_count` parts.
    pub fn new(source: SourceHandle, chunk_size: u64, part_count: u32) -> Result<Self, TransferError> {
        if chunk_size == 0 || usize::try_from(chunk_size).is_err() {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }
        source.rewind()?;
        Ok(Self {
            source,
            chunk_size,
            part_count,
            next_number: 1,
            offset: 0,
        })
    }

    /// Reads the next part. Returns `None` once every part has been read.
    ///
    /// Each part is `min(chunk_size, remaining)` bytes. A short read is only
    /// accepted at end of stream; getting nothing while bytes are still
    /// expected is a [`TransferError::TruncatedStream`].
    pub fn next_part(&mut self) -> Result<Option<Part>, TransferError> {
        if self.next_number > self.part_count {
            return Ok(None);
        }

        let remaining = self.source.size().saturating_sub(self.offset);
        let expected = remaining.min(self.chunk_size);
        // `expected <= chunk_size`, which was checked to fit in usize.
        let data = self.source.read_up_to(expected as usize)?;
        if data.is_empty() && expected > 0 {
            return Err(TransferError::TruncatedStream {
                part_number: self.next_number,
                offset: self.offset,
                expected,
            });
        }

        let part = Part {
            number: self.next_number,
            offset: self.offset,
            checksum: checksum_bytes(&data),
            data,
        };
        tracing::trace!(
            part = part.number,
            offset = part.offset,
            size = part.len(),
            "read part"
        );
        self.offset += part.len() as u64;
        self.next_number += 1;
        Ok(Some(part))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of the part the next call will return.
    pub fn next_number(&self) -> u32 {
        self.next_number
    }

    /// Total parts this reader will produce.
    pub fn part_count(&self) -> u32 {
        self.part_count
    }

    /// Gives back the underlying source.
    pub fn into_source(self) -> SourceHandle {
        self.source
    }
}
