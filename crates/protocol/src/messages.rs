use serde::{Deserialize, Serialize};

use crate::types::CollectionState;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Creates a transfer (`message`) or a board (`name`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemRequest>,
}

/// A declared item inside a create or add-items request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_identifier")]
pub enum ItemRequest {
    #[serde(rename = "file")]
    File { name: String, size: u64 },
    #[serde(rename = "web_content")]
    Link { url: String, meta: LinkMeta },
}

/// Display metadata attached to a web link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMeta {
    #[serde(default)]
    pub title: String,
}

/// Appends items to an existing board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddItemsRequest {
    pub items: Vec<ItemRequest>,
}

/// Marks a file's multipart upload as complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteFileRequest {
    pub part_numbers: PartNumbers,
}

/// Either the number of uploaded parts or the explicit list of part numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartNumbers {
    Count(u32),
    List(Vec<u32>),
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response of `POST /authorize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// A persisted collection as echoed by create, fetch and finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub id: String,
    pub state: CollectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemResponse>,
}

/// A remote item, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemResponse {
    File(FileResponse),
    Link(LinkResponse),
}

/// A remote file item with the multipart layout assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub multipart: MultipartInfo,
}

/// Chunk layout of a file: how many parts and how large each one is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartInfo {
    /// Number of parts (the wire name is historical).
    #[serde(rename = "part_numbers")]
    pub part_count: u32,
    pub chunk_size: u64,
    /// Upload id some collections require in the part-URL path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A remote web link item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResponse {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub meta: LinkMeta,
}

/// Response of the part upload-URL endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    pub url: String,
}
