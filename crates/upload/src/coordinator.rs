//! File completion, finalization and state polling.

use std::sync::Arc;
use std::time::Duration;

use courier_client::Session;
use courier_protocol::{CollectionKind, CollectionState, PartNumbers};
use courier_transfer::UploadLedger;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::remote::{RemoteCollection, RemoteFileItem};
use crate::types::{FileUploadReport, LinkItem};

/// Closes out uploaded files and the collection itself.
#[derive(Clone)]
pub struct CompletionCoordinator {
    session: Arc<Session>,
    ledger: Arc<UploadLedger>,
}

impl CompletionCoordinator {
    pub fn new(session: Arc<Session>, ledger: Arc<UploadLedger>) -> Self {
        Self { session, ledger }
    }

    pub fn ledger(&self) -> &Arc<UploadLedger> {
        &self.ledger
    }

    /// Confirms that every part of `file` was uploaded.
    ///
    /// Transfers send the part count, boards the explicit part list. A
    /// rejected completion marks the file failed and leaves the collection
    /// state untouched.
    pub async fn complete_file(
        &self,
        collection: &RemoteCollection,
        file: &RemoteFileItem,
        report: &FileUploadReport,
    ) -> Result<(), UploadError> {
        let expected = file.multipart.part_count;
        if report.file_id != file.id || !report.covers(expected) {
            return Err(UploadError::IncompleteFile {
                name: file.name.clone(),
                uploaded: report.parts.len() as u32,
                expected,
            });
        }

        let part_numbers = match collection.kind() {
            CollectionKind::Transfer => PartNumbers::Count(expected),
            CollectionKind::Board => PartNumbers::List(report.part_numbers()),
        };
        let result = self
            .session
            .complete_file(collection.kind(), collection.id(), &file.id, part_numbers)
            .await;

        match result {
            Ok(()) => {
                self.ledger.complete(&file.id);
                info!(collection = %collection.id(), file_id = %file.id, "file completed");
                Ok(())
            }
            Err(e) => {
                self.ledger.fail(&file.id, &e.to_string());
                warn!(collection = %collection.id(), file_id = %file.id, error = %e, "file completion rejected");
                Err(e.into())
            }
        }
    }

    /// Finalizes the collection once every file is completed.
    ///
    /// On success the returned state is applied (never below `processing`)
    /// and the share URL recorded. Failures leave the collection as it was.
    pub async fn finalize(&self, collection: &mut RemoteCollection) -> Result<(), UploadError> {
        let pending: Vec<String> = collection
            .files()
            .filter(|f| !self.ledger.is_completed(&f.id))
            .map(|f| f.name.clone())
            .collect();
        if !pending.is_empty() {
            return Err(UploadError::IncompleteUploads(pending));
        }

        let resp = self
            .session
            .finalize(collection.kind(), collection.id())
            .await?;
        collection.apply_response(&resp);
        if collection.state() == CollectionState::Uploading {
            collection.apply_state(CollectionState::Processing);
        }

        info!(
            collection = %collection.id(),
            state = %collection.state(),
            share_url = collection.share_url().unwrap_or(""),
            "collection finalized"
        );
        Ok(())
    }

    /// Re-reads the collection and applies the reported state.
    pub async fn refresh(
        &self,
        collection: &mut RemoteCollection,
    ) -> Result<CollectionState, UploadError> {
        let resp = self
            .session
            .fetch(collection.kind(), collection.id())
            .await?;
        collection.apply_response(&resp);
        debug!(collection = %collection.id(), state = %collection.state(), "refreshed");
        Ok(collection.state())
    }

    /// Polls until the collection is `downloadable` or `error`.
    ///
    /// Gives up after `max_polls` refreshes and returns the last known state.
    pub async fn wait_until_settled(
        &self,
        collection: &mut RemoteCollection,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Result<CollectionState, UploadError> {
        for poll in 0..max_polls {
            if collection.state().is_terminal() {
                break;
            }
            if poll > 0 {
                tokio::time::sleep(poll_interval).await;
            }
            self.refresh(collection).await?;
        }
        Ok(collection.state())
    }

    /// Adds links to an existing board.
    pub async fn add_items(
        &self,
        collection: &mut RemoteCollection,
        links: &[LinkItem],
    ) -> Result<usize, UploadError> {
        if collection.kind() != CollectionKind::Board {
            return Err(UploadError::Unsupported(format!(
                "items can only be added to boards, not to a {}",
                collection.kind()
            )));
        }
        if links.is_empty() {
            return Err(UploadError::NoItemsAdded);
        }
        for (i, link) in links.iter().enumerate() {
            let repeated = links[..i].iter().any(|l| l.url == link.url);
            if repeated || collection.links().any(|r| r.url == link.url) {
                return Err(UploadError::DuplicateLink(link.url.clone()));
            }
        }

        let requests = links.iter().map(LinkItem::to_request).collect();
        let created = self
            .session
            .add_items(collection.kind(), collection.id(), requests)
            .await?;
        let added = collection.append_items(created)?;
        info!(collection = %collection.id(), added, "items added");
        Ok(added)
    }
}
