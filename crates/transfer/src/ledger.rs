use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// Local upload status of one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    InProgress,
    /// Every part was accepted; completion not yet confirmed.
    Uploaded,
    Completed,
    Failed(String),
    Cancelled,
}

impl FileStatus {
    /// Returns `true` for statuses that need no further work.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            FileStatus::Completed | FileStatus::Failed(_) | FileStatus::Cancelled
        )
    }
}

/// Snapshot of one file's progress.
#[derive(Debug, Clone)]
pub struct FileProgress {
    pub file_id: String,
    pub name: String,
    pub status: FileStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub part_count: u32,
    pub parts_done: Vec<u32>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl FileProgress {
    /// Progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.status == FileStatus::Completed {
                100.0
            } else {
                0.0
            };
        }
        self.transferred_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Thread-safe per-file record of an upload run.
///
/// Shared between concurrent file workers; the completion coordinator reads
/// it to decide whether a collection may be finalized.
#[derive(Debug, Default)]
pub struct UploadLedger {
    inner: RwLock<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    order: Vec<String>,
    files: HashMap<String, FileProgress>,
}

impl UploadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file as pending. Re-registering resets its progress.
    pub fn register(&self, file_id: &str, name: &str, total_bytes: u64, part_count: u32) {
        let mut s = self.write();
        if !s.files.contains_key(file_id) {
            s.order.push(file_id.to_string());
        }
        s.files.insert(
            file_id.to_string(),
            FileProgress {
                file_id: file_id.to_string(),
                name: name.to_string(),
                status: FileStatus::Pending,
                total_bytes,
                transferred_bytes: 0,
                part_count,
                parts_done: Vec::new(),
                started_at: None,
                finished_at: None,
            },
        );
    }

    /// Marks a file as in progress, clearing any earlier attempt.
    pub fn start(&self, file_id: &str) {
        self.update(file_id, |f| {
            f.status = FileStatus::InProgress;
            f.transferred_bytes = 0;
            f.parts_done.clear();
            f.started_at = Some(Instant::now());
            f.finished_at = None;
        });
    }

    /// Records an accepted part.
    pub fn record_part(&self, file_id: &str, part_number: u32, bytes: u64) {
        self.update(file_id, |f| {
            f.transferred_bytes += bytes;
            f.parts_done.push(part_number);
        });
    }

    /// Marks every part of a file as accepted.
    pub fn mark_uploaded(&self, file_id: &str) {
        self.update(file_id, |f| f.status = FileStatus::Uploaded);
    }

    /// Marks a file as completed on the server.
    pub fn complete(&self, file_id: &str) {
        self.update(file_id, |f| {
            f.status = FileStatus::Completed;
            f.finished_at = Some(Instant::now());
        });
    }

    /// Marks a file as failed with an error message.
    pub fn fail(&self, file_id: &str, err: &str) {
        self.update(file_id, |f| {
            f.status = FileStatus::Failed(err.to_string());
            f.finished_at = Some(Instant::now());
        });
    }

    /// Marks a file as cancelled.
    pub fn cancel(&self, file_id: &str) {
        self.update(file_id, |f| {
            f.status = FileStatus::Cancelled;
            f.finished_at = Some(Instant::now());
        });
    }

    /// Returns the status of a file, if registered.
    pub fn status(&self, file_id: &str) -> Option<FileStatus> {
        self.read().files.get(file_id).map(|f| f.status.clone())
    }

    /// Returns a snapshot of one file.
    pub fn progress(&self, file_id: &str) -> Option<FileProgress> {
        self.read().files.get(file_id).cloned()
    }

    /// Returns snapshots of all files in registration order.
    pub fn snapshot(&self) -> Vec<FileProgress> {
        let s = self.read();
        s.order
            .iter()
            .filter_map(|id| s.files.get(id).cloned())
            .collect()
    }

    /// Returns `true` if `file_id` is registered and completed.
    pub fn is_completed(&self, file_id: &str) -> bool {
        self.status(file_id) == Some(FileStatus::Completed)
    }

    /// Names of registered files that are not completed.
    pub fn incomplete(&self) -> Vec<String> {
        let s = self.read();
        s.order
            .iter()
            .filter_map(|id| s.files.get(id))
            .filter(|f| f.status != FileStatus::Completed)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Total bytes of all registered files.
    pub fn total_bytes(&self) -> u64 {
        self.read().files.values().map(|f| f.total_bytes).sum()
    }

    /// Bytes accepted so far across all files.
    pub fn transferred_bytes(&self) -> u64 {
        self.read().files.values().map(|f| f.transferred_bytes).sum()
    }

    fn update(&self, file_id: &str, apply: impl FnOnce(&mut FileProgress)) {
        let mut s = self.write();
        match s.files.get_mut(file_id) {
            Some(f) => apply(f),
            None => tracing::warn!(file_id, "ledger update for unregistered file"),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
