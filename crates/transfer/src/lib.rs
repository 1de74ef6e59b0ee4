//! Part-wise reading of upload sources with per-file progress bookkeeping.

mod ledger;
mod parts;
mod source;

pub use ledger::{FileProgress, FileStatus, UploadLedger};
pub use parts::{Part, PartReader, checksum_bytes, part_count};
pub use source::SourceHandle;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source is not seekable, readable and sized: {0}")]
    IoCompliance(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("stream ended early at part {part_number} (offset {offset}, expected {expected} bytes)")]
    TruncatedStream {
        part_number: u32,
        offset: u64,
        expected: u64,
    },

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),
}
