//! Upload orchestrator: create, upload every file, finalize.
//!
//! Files are uploaded concurrently up to a configured bound, each with its
//! own optional deadline. A failed file never stops its siblings, but the
//! collection is only finalized when every file completed.

use std::sync::Arc;

use courier_client::Session;
use courier_transfer::{SourceHandle, UploadLedger};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::coordinator::CompletionCoordinator;
use crate::error::UploadError;
use crate::remote::{RemoteCollection, RemoteFileItem};
use crate::types::{
    CollectionDraft, FileOutcome, FileUploadReport, UploadEvent, UploadOptions, UploadReport,
};
use crate::uploader::ChunkUploader;

/// Drives a draft through creation, upload and finalization.
pub struct UploadOrchestrator {
    session: Arc<Session>,
    options: UploadOptions,
    ledger: Arc<UploadLedger>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(session: Arc<Session>, options: UploadOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(options.event_capacity.max(1));
        Self {
            session,
            options,
            ledger: Arc::new(UploadLedger::new()),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns a token that cancels every file of the run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Per-file progress of the current run.
    pub fn ledger(&self) -> &Arc<UploadLedger> {
        &self.ledger
    }

    /// Creates the collection, uploads and completes every file, then
    /// finalizes.
    ///
    /// Errors before any file work starts (creation, item matching,
    /// cancellation) are returned as `Err`. Per-file failures and a failed
    /// finalize are reported in the returned [`UploadReport`], which then
    /// is not finalized; its collection can be finalized again later.
    pub async fn run(&self, draft: CollectionDraft) -> Result<UploadReport, UploadError> {
        if draft.item_count() == 0 {
            return Err(UploadError::NoItemsAdded);
        }
        self.check_cancelled()?;

        let kind = draft.kind();
        let resp = self.session.create(kind, &draft.to_request()).await?;
        let mut collection = RemoteCollection::from_response(kind, resp)?;
        info!(
            %kind,
            collection = %collection.id(),
            items = collection.items().len(),
            "collection created"
        );
        self.emit(UploadEvent::Created {
            collection_id: collection.id().to_string(),
            items: collection.items().len(),
        });

        let jobs = match_files(&collection, &draft)?;
        for (file, _) in &jobs {
            self.ledger
                .register(&file.id, &file.name, file.size, file.multipart.part_count);
        }

        let files = self.upload_all(&collection, jobs).await;
        let failed = files.iter().filter(|f| !f.success).count();

        let mut finalize_error = None;
        let finalized = if failed == 0 {
            let coordinator = CompletionCoordinator::new(self.session.clone(), self.ledger.clone());
            match coordinator.finalize(&mut collection).await {
                Ok(()) => {
                    self.emit(UploadEvent::Finalized {
                        collection_id: collection.id().to_string(),
                        share_url: collection.share_url().map(str::to_string),
                    });
                    true
                }
                Err(e) => {
                    error!(collection = %collection.id(), error = %e, "finalize failed");
                    finalize_error = Some(e.to_string());
                    false
                }
            }
        } else {
            warn!(
                collection = %collection.id(),
                failed,
                "not finalizing, some files did not complete"
            );
            false
        };

        Ok(UploadReport {
            collection,
            files,
            finalized,
            finalize_error,
        })
    }

    async fn upload_all(
        &self,
        collection: &RemoteCollection,
        jobs: Vec<(RemoteFileItem, SourceHandle)>,
    ) -> Vec<FileOutcome> {
        let shared = Arc::new(collection.clone());
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_files.max(1)));
        let uploader = ChunkUploader::new(self.session.clone())
            .with_ledger(self.ledger.clone())
            .with_cancel(self.cancel.clone())
            .with_events(self.events_tx.clone());
        let coordinator = CompletionCoordinator::new(self.session.clone(), self.ledger.clone());

        let mut slots: Vec<Option<FileOutcome>> = vec![None; jobs.len()];
        let names: Vec<(String, String)> = jobs
            .iter()
            .map(|(f, _)| (f.id.clone(), f.name.clone()))
            .collect();

        let mut set = JoinSet::new();
        for (index, (file, source)) in jobs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let collection = shared.clone();
            let uploader = uploader.clone();
            let coordinator = coordinator.clone();
            let deadline = self.options.file_deadline;

            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(UploadError::Cancelled));
                };
                let work = upload_one(&uploader, &coordinator, &collection, &file, &source);
                let result = match deadline {
                    Some(limit) => match tokio::time::timeout(limit, work).await {
                        Ok(r) => r,
                        Err(_) => Err(UploadError::DeadlineExceeded(file.name.clone())),
                    },
                    None => work.await,
                };
                (index, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (index, result) = match joined {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "upload worker panicked");
                    continue;
                }
            };
            let (file_id, name) = names[index].clone();
            slots[index] = Some(self.outcome(file_id, name, result));
        }

        slots
            .into_iter()
            .zip(names)
            .map(|(slot, (file_id, name))| {
                slot.unwrap_or_else(|| {
                    self.outcome(
                        file_id,
                        name,
                        Err(UploadError::Io(std::io::Error::other("upload worker panicked"))),
                    )
                })
            })
            .collect()
    }

    fn outcome(
        &self,
        file_id: String,
        name: String,
        result: Result<FileUploadReport, UploadError>,
    ) -> FileOutcome {
        match result {
            Ok(report) => {
                self.emit(UploadEvent::FileCompleted {
                    file_id: file_id.clone(),
                    name: name.clone(),
                });
                FileOutcome {
                    file_id,
                    name,
                    success: true,
                    error: None,
                    report: Some(report),
                }
            }
            Err(e) => {
                let err_msg = e.to_string();
                // Workers dropped by a deadline never got to record their failure.
                if !matches!(
                    self.ledger.status(&file_id),
                    Some(s) if s.is_settled()
                ) {
                    self.ledger.fail(&file_id, &err_msg);
                }
                error!(file_id = %file_id, name = %name, error = %err_msg, "file failed");
                self.emit(UploadEvent::FileFailed {
                    file_id: file_id.clone(),
                    name: name.clone(),
                    error: err_msg.clone(),
                });
                FileOutcome {
                    file_id,
                    name,
                    success: false,
                    error: Some(err_msg),
                    report: None,
                }
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.events_tx.try_send(event);
    }
}

async fn upload_one(
    uploader: &ChunkUploader,
    coordinator: &CompletionCoordinator,
    collection: &RemoteCollection,
    file: &RemoteFileItem,
    source: &SourceHandle,
) -> Result<FileUploadReport, UploadError> {
    let report = uploader.upload_file(collection, file, source).await?;
    coordinator.complete_file(collection, file, &report).await?;
    Ok(report)
}

/// Pairs every remote file with the local source of the same name.
fn match_files(
    collection: &RemoteCollection,
    draft: &CollectionDraft,
) -> Result<Vec<(RemoteFileItem, SourceHandle)>, UploadError> {
    let mut jobs = Vec::with_capacity(draft.files().len());
    for remote in collection.files() {
        let local = draft
            .file(&remote.name)
            .ok_or_else(|| UploadError::UnmatchedItem(format!("remote file {}", remote.name)))?;
        jobs.push((remote.clone(), local.source().clone()));
    }
    if let Some(missing) = draft
        .files()
        .iter()
        .find(|f| collection.file_by_name(f.name()).is_none())
    {
        return Err(UploadError::UnmatchedItem(format!(
            "local file {} missing from the created collection",
            missing.name()
        )));
    }
    Ok(jobs)
}
