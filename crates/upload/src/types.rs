//! Data types for the upload flow.

use std::time::Duration;

use courier_protocol::{CollectionKind, CreateCollectionRequest, ItemRequest, LinkMeta};
use courier_transfer::SourceHandle;

use crate::remote::RemoteCollection;

/// A local file declared for upload.
#[derive(Debug, Clone)]
pub struct FileItem {
    name: String,
    size: u64,
    source: SourceHandle,
}

impl FileItem {
    pub(crate) fn new(name: String, size: u64, source: SourceHandle) -> Self {
        Self { name, size, source }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }
}

/// A web link declared for a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkItem {
    pub url: String,
    pub title: String,
}

impl LinkItem {
    pub(crate) fn to_request(&self) -> ItemRequest {
        ItemRequest::Link {
            url: self.url.clone(),
            meta: LinkMeta {
                title: self.title.clone(),
            },
        }
    }
}

/// Case-insensitive file name comparison, Unicode aware.
pub(crate) fn same_file_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// A sealed, validated collection ready to be created.
#[derive(Debug, Clone)]
pub struct CollectionDraft {
    pub(crate) kind: CollectionKind,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) files: Vec<FileItem>,
    pub(crate) links: Vec<LinkItem>,
}

impl CollectionDraft {
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Transfer message or board name.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn files(&self) -> &[FileItem] {
        &self.files
    }

    pub fn links(&self) -> &[LinkItem] {
        &self.links
    }

    pub fn item_count(&self) -> usize {
        self.files.len() + self.links.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Local file by name, ignoring case.
    pub fn file(&self, name: &str) -> Option<&FileItem> {
        self.files.iter().find(|f| same_file_name(&f.name, name))
    }

    /// Create payload: `message` for transfers, `name` for boards.
    pub fn to_request(&self) -> CreateCollectionRequest {
        let (name, message) = match self.kind {
            CollectionKind::Transfer => (None, Some(self.title.clone())),
            CollectionKind::Board => (Some(self.title.clone()), None),
        };
        let items = self
            .files
            .iter()
            .map(|f| ItemRequest::File {
                name: f.name.clone(),
                size: f.size,
            })
            .chain(self.links.iter().map(LinkItem::to_request))
            .collect();
        CreateCollectionRequest {
            name,
            message,
            description: self.description.clone(),
            items,
        }
    }
}

/// One part accepted by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub number: u32,
    pub size: u64,
    /// Hex SHA-256 of the part body.
    pub checksum: String,
}

/// Outcome of uploading every part of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadReport {
    pub file_id: String,
    pub name: String,
    pub parts: Vec<UploadedPart>,
}

impl FileUploadReport {
    pub fn bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    pub fn part_numbers(&self) -> Vec<u32> {
        self.parts.iter().map(|p| p.number).collect()
    }

    /// Returns `true` if parts `1..=part_count` are all present, in order.
    pub fn covers(&self, part_count: u32) -> bool {
        self.parts.len() == part_count as usize
            && self
                .parts
                .iter()
                .zip(1..=part_count)
                .all(|(p, n)| p.number == n)
    }
}

/// Result of one file in an orchestrated run.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_id: String,
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub report: Option<FileUploadReport>,
}

/// Result of an orchestrated run.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub collection: RemoteCollection,
    pub files: Vec<FileOutcome>,
    pub finalized: bool,
    /// Why finalization failed after every file completed.
    pub finalize_error: Option<String>,
}

impl UploadReport {
    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.success)
    }

    pub fn is_success(&self) -> bool {
        self.finalized && self.files.iter().all(|f| f.success)
    }
}

/// Progress event emitted during an upload run.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The collection exists remotely.
    Created {
        collection_id: String,
        items: usize,
    },
    /// A part was accepted.
    PartUploaded {
        file_id: String,
        part_number: u32,
        part_count: u32,
        bytes: u64,
    },
    /// The server confirmed a file as complete.
    FileCompleted { file_id: String, name: String },
    /// A file failed; its siblings keep going.
    FileFailed {
        file_id: String,
        name: String,
        error: String,
    },
    /// The collection was finalized.
    Finalized {
        collection_id: String,
        share_url: Option<String>,
    },
}

/// Tuning for [`UploadOrchestrator`](crate::UploadOrchestrator).
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Files uploaded at the same time.
    pub max_concurrent_files: usize,
    /// Upper bound for uploading and completing one file.
    pub file_deadline: Option<Duration>,
    /// Capacity of the event channel. Events are dropped when it is full.
    pub event_capacity: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_concurrent_files: 4,
            file_deadline: None,
            event_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn file(name: &str, data: &'static [u8]) -> FileItem {
        let source = SourceHandle::new(Cursor::new(data)).unwrap();
        FileItem::new(name.into(), data.len() as u64, source)
    }

    #[test]
    fn transfer_request_uses_message() {
        let draft = CollectionDraft {
            kind: CollectionKind::Transfer,
            title: "holiday".into(),
            description: Some("pics".into()),
            files: vec![file("a.txt", b"abc")],
            links: vec![LinkItem {
                url: "https://example.com".into(),
                title: "Example".into(),
            }],
        };
        let req = draft.to_request();
        assert_eq!(req.message.as_deref(), Some("holiday"));
        assert!(req.name.is_none());
        assert_eq!(req.description.as_deref(), Some("pics"));
        assert_eq!(req.items.len(), 2);
        assert!(matches!(&req.items[0], ItemRequest::File { name, size: 3 } if name == "a.txt"));
        assert!(matches!(&req.items[1], ItemRequest::Link { .. }));
        assert_eq!(draft.item_count(), 2);
        assert_eq!(draft.total_bytes(), 3);
    }

    #[test]
    fn board_request_uses_name() {
        let draft = CollectionDraft {
            kind: CollectionKind::Board,
            title: "moodboard".into(),
            description: None,
            files: Vec::new(),
            links: vec![LinkItem {
                url: "https://example.com".into(),
                title: "https://example.com".into(),
            }],
        };
        let req = draft.to_request();
        assert_eq!(req.name.as_deref(), Some("moodboard"));
        assert!(req.message.is_none());
    }

    #[test]
    fn report_coverage() {
        let part = |number| UploadedPart {
            number,
            size: 5,
            checksum: String::new(),
        };
        let report = FileUploadReport {
            file_id: "f1".into(),
            name: "a".into(),
            parts: vec![part(1), part(2)],
        };
        assert!(report.covers(2));
        assert!(!report.covers(3));
        assert_eq!(report.bytes(), 10);
        assert_eq!(report.part_numbers(), vec![1, 2]);

        let gap = FileUploadReport {
            parts: vec![part(1), part(3)],
            ..report
        };
        assert!(!gap.covers(2));
    }
}
