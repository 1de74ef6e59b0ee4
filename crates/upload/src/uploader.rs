//! Part-by-part upload of one file to signed storage URLs.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_client::{DEFAULT_REQUEST_TIMEOUT, Session};
use courier_protocol::endpoints::TICKET_LIFETIME;
use courier_transfer::{PartReader, SourceHandle, UploadLedger};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::remote::{RemoteCollection, RemoteFileItem};
use crate::types::{FileUploadReport, UploadEvent, UploadedPart};

/// A signed URL for one part.
#[derive(Debug, Clone)]
pub struct ChunkUploadTicket {
    pub url: String,
    pub part_number: u32,
    pub issued_at: Instant,
}

/// Time left on a ticket below which it is no longer used, so that a PUT
/// started just before expiry can still run to its request timeout.
pub const TICKET_SAFETY_MARGIN: Duration = DEFAULT_REQUEST_TIMEOUT;

impl ChunkUploadTicket {
    /// Returns `true` once the ticket is too close to its advertised
    /// lifetime to start a PUT with it.
    pub fn is_expired(&self) -> bool {
        ticket_expired(self.issued_at.elapsed())
    }
}

fn ticket_expired(age: Duration) -> bool {
    age.saturating_add(TICKET_SAFETY_MARGIN) >= TICKET_LIFETIME
}

/// Uploads the parts of a file, sequentially, in part-number order.
///
/// One uploader may serve many files; each `upload_file` call owns its
/// source cursor for the duration of the call. Tickets are requested right
/// before each part is sent, never ahead of time.
#[derive(Clone)]
pub struct ChunkUploader {
    session: Arc<Session>,
    ledger: Arc<UploadLedger>,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<UploadEvent>>,
}

impl ChunkUploader {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            ledger: Arc::new(UploadLedger::new()),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Records progress in a shared ledger instead of a private one.
    pub fn with_ledger(mut self, ledger: Arc<UploadLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Publishes [`UploadEvent::PartUploaded`] on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<UploadEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn ledger(&self) -> &Arc<UploadLedger> {
        &self.ledger
    }

    /// Uploads every part of `file` from `source`.
    ///
    /// Any failed part aborts the file with the classified error; parts
    /// already accepted are not retracted. The ledger ends up `uploaded`,
    /// `failed` or `cancelled`.
    pub async fn upload_file(
        &self,
        collection: &RemoteCollection,
        file: &RemoteFileItem,
        source: &SourceHandle,
    ) -> Result<FileUploadReport, UploadError> {
        if self.ledger.status(&file.id).is_none() {
            self.ledger
                .register(&file.id, &file.name, file.size, file.multipart.part_count);
        }
        self.ledger.start(&file.id);

        match self.upload_parts(collection, file, source).await {
            Ok(report) => {
                self.ledger.mark_uploaded(&file.id);
                info!(
                    file_id = %file.id,
                    name = %file.name,
                    parts = report.parts.len(),
                    bytes = report.bytes(),
                    "file uploaded"
                );
                Ok(report)
            }
            Err(UploadError::Cancelled) => {
                self.ledger.cancel(&file.id);
                warn!(file_id = %file.id, "upload cancelled");
                Err(UploadError::Cancelled)
            }
            Err(e) => {
                self.ledger.fail(&file.id, &e.to_string());
                warn!(file_id = %file.id, error = %e, "upload failed");
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        collection: &RemoteCollection,
        file: &RemoteFileItem,
        source: &SourceHandle,
    ) -> Result<FileUploadReport, UploadError> {
        if source.size() != file.size {
            return Err(UploadError::FileMismatch {
                name: file.name.clone(),
                declared: file.size,
                actual: source.size(),
            });
        }
        self.check_cancelled()?;

        let part_count = file.multipart.part_count;
        let mut reader = tokio::task::spawn_blocking({
            let source = source.clone();
            let chunk_size = file.multipart.chunk_size;
            move || PartReader::new(source, chunk_size, part_count)
        })
        .await
        .map_err(|e| UploadError::Io(std::io::Error::other(format!("task join error: {e}"))))??;

        let mut parts = Vec::with_capacity(part_count as usize);
        while reader.next_number() <= part_count {
            self.check_cancelled()?;
            let part_number = reader.next_number();

            let mut ticket = self.request_ticket(collection, file, part_number).await?;

            let (r, part) = tokio::task::spawn_blocking(move || {
                let part = reader.next_part();
                (reader, part)
            })
            .await
            .map_err(|e| UploadError::Io(std::io::Error::other(format!("task join error: {e}"))))?;
            reader = r;
            let Some(part) = part? else {
                break;
            };

            if ticket.is_expired() {
                debug!(file_id = %file.id, part = part_number, "ticket expired, requesting a new one");
                ticket = self.request_ticket(collection, file, part_number).await?;
            }

            let size = part.len() as u64;
            let checksum = part.checksum;
            self.cancellable(self.session.put_part(&ticket.url, part.data))
                .await?;

            self.ledger.record_part(&file.id, part_number, size);
            debug!(
                file_id = %file.id,
                part = part_number,
                parts = part_count,
                size,
                "part uploaded"
            );
            self.emit(UploadEvent::PartUploaded {
                file_id: file.id.clone(),
                part_number,
                part_count,
                bytes: size,
            });
            parts.push(UploadedPart {
                number: part_number,
                size,
                checksum,
            });
        }

        Ok(FileUploadReport {
            file_id: file.id.clone(),
            name: file.name.clone(),
            parts,
        })
    }

    async fn request_ticket(
        &self,
        collection: &RemoteCollection,
        file: &RemoteFileItem,
        part_number: u32,
    ) -> Result<ChunkUploadTicket, UploadError> {
        let url = self
            .cancellable(self.session.upload_url(
                collection.kind(),
                collection.id(),
                &file.id,
                part_number,
                file.multipart.upload_id.as_deref(),
            ))
            .await?;
        Ok(ChunkUploadTicket {
            url,
            part_number,
            issued_at: Instant::now(),
        })
    }

    /// Runs an API call, aborting it if the upload is cancelled.
    async fn cancellable<T, F>(&self, call: F) -> Result<T, UploadError>
    where
        F: Future<Output = Result<T, courier_client::Error>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            result = call => result.map_err(UploadError::from),
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
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockApi, collection_json, default_route, file_json};
    use courier_client::Method;
    use courier_protocol::{CollectionKind, CollectionResponse};
    use courier_transfer::{FileStatus, checksum_bytes};
    use std::io::{self, Cursor, Read, Seek, SeekFrom};

    const CHUNK: u64 = 6_291_456;

    fn collection(body: &str) -> RemoteCollection {
        let resp: CollectionResponse = serde_json::from_str(body).unwrap();
        RemoteCollection::from_response(CollectionKind::Transfer, resp).unwrap()
    }

    #[tokio::test]
    async fn two_parts_with_increasing_tickets() {
        let size = 6_291_459u64;
        let body = collection_json("t1", "uploading", &[file_json("f1", "big.bin", size, CHUNK)]);
        let create = body.clone();
        let api = MockApi::new(move |req| default_route(req, &create));
        let remote = collection(&body);
        let file = remote.file("f1").unwrap().clone();

        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let source = SourceHandle::new(Cursor::new(data.clone())).unwrap();

        let uploader = ChunkUploader::new(api.session());
        let report = uploader.upload_file(&remote, &file, &source).await.unwrap();

        assert_eq!(report.part_numbers(), vec![1, 2]);
        assert_eq!(report.parts[0].size, CHUNK);
        assert_eq!(report.parts[1].size, 3);
        assert_eq!(report.bytes(), size);
        assert_eq!(report.parts[1].checksum, checksum_bytes(&data[CHUNK as usize..]));

        let tickets: Vec<_> = api
            .matching("/upload-url/")
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(
            tickets,
            vec![
                "http://api.test/v2/transfers/t1/files/f1/upload-url/1".to_string(),
                "http://api.test/v2/transfers/t1/files/f1/upload-url/2".to_string(),
            ]
        );

        let puts = api.matching("https://bucket.test/");
        assert_eq!(puts.len(), 2);
        assert!(puts.iter().all(|r| r.method == Method::PUT));
        assert_eq!(puts[1].body.as_deref(), Some(&data[CHUNK as usize..]));
        assert_eq!(puts[0].header_value("Content-Length"), Some("6291456"));

        // Each ticket is fetched right before its part is sent.
        let order: Vec<_> = api
            .requests()
            .into_iter()
            .filter(|r| !r.url.ends_with("/authorize"))
            .map(|r| r.url.contains("/upload-url/"))
            .collect();
        assert_eq!(order, vec![true, false, true, false]);

        assert_eq!(uploader.ledger().status("f1"), Some(FileStatus::Uploaded));
    }

    #[tokio::test]
    async fn failed_part_aborts_file() {
        let body = collection_json("t1", "uploading", &[file_json("f1", "a.bin", 10, 4)]);
        let create = body.clone();
        let api = MockApi::new(move |req| {
            if req.url == "https://bucket.test/f1/2" {
                return (403, r#"{"message":"Request has expired"}"#.to_string());
            }
            default_route(req, &create)
        });
        let remote = collection(&body);
        let file = remote.file("f1").unwrap().clone();
        let source = SourceHandle::new(Cursor::new(vec![1u8; 10])).unwrap();

        let uploader = ChunkUploader::new(api.session());
        let err = uploader.upload_file(&remote, &file, &source).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Request has expired"));

        assert_eq!(api.matching("https://bucket.test/").len(), 2, "part 3 never sent");
        let progress = uploader.ledger().progress("f1").unwrap();
        assert!(matches!(progress.status, FileStatus::Failed(_)));
        assert_eq!(progress.parts_done, vec![1]);
    }

    #[tokio::test]
    async fn multipart_id_in_ticket_path() {
        let body = r#"{"id":"b1","state":"uploading","items":[
            {"type":"file","id":"f1","name":"a.bin","size":3,
             "multipart":{"part_numbers":1,"chunk_size":5242880,"id":"mp-1"}}]}"#;
        let api = MockApi::new(move |req| default_route(req, ""));
        let resp: CollectionResponse = serde_json::from_str(body).unwrap();
        let remote = RemoteCollection::from_response(CollectionKind::Board, resp).unwrap();
        let file = remote.file("f1").unwrap().clone();
        let source = SourceHandle::new(Cursor::new(b"abc".to_vec())).unwrap();

        ChunkUploader::new(api.session())
            .upload_file(&remote, &file, &source)
            .await
            .unwrap();
        assert_eq!(
            api.matching("/upload-url/")[0].url,
            "http://api.test/v2/boards/b1/files/f1/upload-url/1/mp-1"
        );
    }

    #[tokio::test]
    async fn size_mismatch_rejected_before_network() {
        let body = collection_json("t1", "uploading", &[file_json("f1", "a.bin", 10, 4)]);
        let api = MockApi::new(|req| default_route(req, ""));
        let remote = collection(&body);
        let file = remote.file("f1").unwrap().clone();
        let source = SourceHandle::new(Cursor::new(vec![0u8; 9])).unwrap();

        let err = ChunkUploader::new(api.session())
            .upload_file(&remote, &file, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::FileMismatch { declared: 10, actual: 9, .. }));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_put() {
        let body = collection_json("t1", "uploading", &[file_json("f1", "a.bin", 10, 4)]);
        let api = MockApi::new(|req| default_route(req, ""));
        api.delay_matching("bucket.test", Duration::from_secs(30));
        let remote = collection(&body);
        let file = remote.file("f1").unwrap().clone();
        let source = SourceHandle::new(Cursor::new(vec![0u8; 10])).unwrap();

        let cancel = CancellationToken::new();
        let uploader = ChunkUploader::new(api.session()).with_cancel(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = uploader.upload_file(&remote, &file, &source).await.unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(uploader.ledger().status("f1"), Some(FileStatus::Cancelled));
        assert_eq!(api.matching("https://bucket.test/").len(), 1);
    }

    #[tokio::test]
    async fn part_events_published() {
        let body = collection_json("t1", "uploading", &[file_json("f1", "a.bin", 10, 4)]);
        let api = MockApi::new(|req| default_route(req, ""));
        let remote = collection(&body);
        let file = remote.file("f1").unwrap().clone();
        let source = SourceHandle::new(Cursor::new(vec![0u8; 10])).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let uploader = ChunkUploader::new(api.session()).with_events(tx);
        uploader.upload_file(&remote, &file, &source).await.unwrap();
        drop(uploader);

        let mut sizes = Vec::new();
        while let Some(event) = rx.recv().await {
            if let UploadEvent::PartUploaded { bytes, .. } = event {
                sizes.push(bytes);
            }
        }
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    /// Reports `claimed` bytes on seek-to-end but holds fewer.
    struct EndsEarly {
        data: Cursor<Vec<u8>>,
        claimed: u64,
    }

    impl Read for EndsEarly {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for EndsEarly {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::End(0) => Ok(self.claimed),
                other => self.data.seek(other),
            }
        }
    }

    #[tokio::test]
    async fn truncated_source_fails_only_its_file() {
        let body = collection_json(
            "t1",
            "uploading",
            &[file_json("f1", "short.bin", 8, 4), file_json("f2", "ok.bin", 8, 4)],
        );
        let api = MockApi::new(|req| default_route(req, ""));
        let remote = collection(&body);
        let short = remote.file("f1").unwrap().clone();
        let ok = remote.file("f2").unwrap().clone();

        let truncated = SourceHandle::new(EndsEarly {
            data: Cursor::new(vec![1u8; 4]),
            claimed: 8,
        })
        .unwrap();
        let intact = SourceHandle::new(Cursor::new(vec![2u8; 8])).unwrap();

        let uploader = ChunkUploader::new(api.session());
        let err = uploader
            .upload_file(&remote, &short, &truncated)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::TruncatedStream {
                part_number: 2,
                offset: 4,
                expected: 4
            }
        ));
        let progress = uploader.ledger().progress("f1").unwrap();
        assert!(matches!(progress.status, FileStatus::Failed(_)));
        assert_eq!(progress.parts_done, vec![1]);
        assert!(api.matching("https://bucket.test/f1/2").is_empty());

        let report = uploader.upload_file(&remote, &ok, &intact).await.unwrap();
        assert_eq!(report.part_numbers(), vec![1, 2]);
        assert_eq!(uploader.ledger().status("f2"), Some(FileStatus::Uploaded));
    }

    #[test]
    fn ticket_expires_before_lifetime_runs_out() {
        assert!(!ticket_expired(Duration::ZERO));
        assert!(!ticket_expired(TICKET_LIFETIME - TICKET_SAFETY_MARGIN - Duration::from_secs(1)));
        assert!(ticket_expired(TICKET_LIFETIME - TICKET_SAFETY_MARGIN));
        assert!(ticket_expired(TICKET_LIFETIME - Duration::from_secs(1)));
        assert!(ticket_expired(TICKET_LIFETIME));
    }

    #[test]
    fn fresh_ticket_not_expired() {
        let ticket = ChunkUploadTicket {
            url: "https://bucket.test/p".into(),
            part_number: 1,
            issued_at: Instant::now(),
        };
        assert!(!ticket.is_expired());
    }
}
