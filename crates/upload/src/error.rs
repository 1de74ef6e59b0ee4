//! Upload error types.

use courier_transfer::TransferError;

/// Errors produced while building, uploading or finalizing a collection.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("duplicate file name: {0}")]
    DuplicateFileName(String),

    #[error("duplicate link: {0}")]
    DuplicateLink(String),

    #[error("no items added to the collection")]
    NoItemsAdded,

    #[error("source is not seekable, readable and sized: {0}")]
    IoCompliance(String),

    #[error("size mismatch for {name}: declared {declared} bytes, source has {actual}")]
    FileMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("stream ended early at part {part_number} (offset {offset}, expected {expected} bytes)")]
    TruncatedStream {
        part_number: u32,
        offset: u64,
        expected: u64,
    },

    #[error("invalid multipart layout for {file}: {reason}")]
    InvalidMultipart { file: String, reason: String },

    #[error("no matching item: {0}")]
    UnmatchedItem(String),

    #[error("file {name} is incomplete: {uploaded} of {expected} parts uploaded")]
    IncompleteFile {
        name: String,
        uploaded: u32,
        expected: u32,
    },

    #[error("uploads not completed: {}", .0.join(", "))]
    IncompleteUploads(Vec<String>),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("deadline exceeded for {0}")]
    DeadlineExceeded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("API error: {0}")]
    Api(#[from] courier_client::Error),

    #[error("transfer error: {0}")]
    Transfer(TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Returns `true` for name and link collisions.
    pub fn is_duplicate_item(&self) -> bool {
        matches!(
            self,
            UploadError::DuplicateFileName(_) | UploadError::DuplicateLink(_)
        )
    }

    /// HTTP status of the underlying API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Api(e) => e.status(),
            _ => None,
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::IoCompliance(m) => UploadError::IoCompliance(m),
            TransferError::NotFound(p) => UploadError::FileNotFound(p),
            TransferError::TruncatedStream {
                part_number,
                offset,
                expected,
            } => UploadError::TruncatedStream {
                part_number,
                offset,
                expected,
            },
            TransferError::Io(e) => UploadError::Io(e),
            other => UploadError::Transfer(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_classification() {
        assert!(UploadError::DuplicateFileName("a.txt".into()).is_duplicate_item());
        assert!(UploadError::DuplicateLink("https://x".into()).is_duplicate_item());
        assert!(!UploadError::NoItemsAdded.is_duplicate_item());
    }

    #[test]
    fn transfer_errors_map_to_upload_kinds() {
        let e: UploadError = TransferError::NotFound("/tmp/nope".into()).into();
        assert!(matches!(e, UploadError::FileNotFound(p) if p == "/tmp/nope"));

        let e: UploadError = TransferError::IoCompliance("no seek".into()).into();
        assert!(matches!(e, UploadError::IoCompliance(_)));

        let e: UploadError = TransferError::InvalidChunkSize(0).into();
        assert!(matches!(e, UploadError::Transfer(_)));
    }

    #[test]
    fn api_status_passes_through() {
        let e: UploadError = courier_client::Error::Client {
            status: 404,
            message: "File not found".into(),
        }
        .into();
        assert_eq!(e.status(), Some(404));
        assert!(e.to_string().contains("File not found"));
    }

    #[test]
    fn incomplete_uploads_lists_names() {
        let e = UploadError::IncompleteUploads(vec!["a.txt".into(), "b.txt".into()]);
        assert_eq!(e.to_string(), "uploads not completed: a.txt, b.txt");
    }
}
