//! Typed endpoint calls.

use courier_protocol::endpoints;
use courier_protocol::{
    AddItemsRequest, CollectionKind, CollectionResponse, CompleteFileRequest,
    CreateCollectionRequest, ItemRequest, ItemResponse, PartNumbers, UploadUrlResponse,
};
use reqwest::Method;
use tracing::debug;

use crate::error::Error;
use crate::session::Session;

impl Session {
    /// Creates a transfer or board with its declared items.
    pub async fn create(
        &self,
        kind: CollectionKind,
        request: &CreateCollectionRequest,
    ) -> Result<CollectionResponse, Error> {
        debug!(%kind, items = request.items.len(), "creating collection");
        self.request_json(Method::POST, &endpoints::create(kind), Some(request))
            .await
    }

    /// Re-reads a collection.
    pub async fn fetch(&self, kind: CollectionKind, id: &str) -> Result<CollectionResponse, Error> {
        self.request_json::<_, ()>(Method::GET, &endpoints::collection(kind, id), None)
            .await
    }

    /// Appends items to an existing collection and returns the created items.
    pub async fn add_items(
        &self,
        kind: CollectionKind,
        id: &str,
        items: Vec<ItemRequest>,
    ) -> Result<Vec<ItemResponse>, Error> {
        let body = AddItemsRequest { items };
        self.request_json(Method::POST, &endpoints::items(kind, id), Some(&body))
            .await
    }

    /// Requests a signed URL for one part of a file.
    pub async fn upload_url(
        &self,
        kind: CollectionKind,
        id: &str,
        file_id: &str,
        part_number: u32,
        multipart_id: Option<&str>,
    ) -> Result<String, Error> {
        let path = endpoints::upload_url(kind, id, file_id, part_number, multipart_id);
        let resp: UploadUrlResponse = self.request_json::<_, ()>(Method::GET, &path, None).await?;
        if resp.url.is_empty() {
            return Err(Error::Transport(format!(
                "empty upload URL for part {part_number} of file {file_id}"
            )));
        }
        Ok(resp.url)
    }

    /// Tells the service every part of a file has been uploaded.
    pub async fn complete_file(
        &self,
        kind: CollectionKind,
        id: &str,
        file_id: &str,
        part_numbers: PartNumbers,
    ) -> Result<(), Error> {
        let body = CompleteFileRequest { part_numbers };
        self.request(
            Method::PUT,
            &endpoints::upload_complete(kind, id, file_id),
            Some(&serde_json::to_value(&body)?),
        )
        .await?;
        Ok(())
    }

    /// Closes a collection for further uploads.
    pub async fn finalize(
        &self,
        kind: CollectionKind,
        id: &str,
    ) -> Result<CollectionResponse, Error> {
        self.request_json::<_, ()>(Method::PUT, &endpoints::finalize(kind, id), None)
            .await
    }
}
