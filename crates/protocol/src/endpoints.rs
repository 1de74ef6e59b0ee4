//! Endpoint paths, relative to the service base URL.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::types::CollectionKind;

/// Advertised lifetime of a signed part-upload URL.
pub const TICKET_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Content type sent with raw part bodies.
pub const PART_CONTENT_TYPE: &str = "binary/octet-stream";

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Characters left untouched in id path segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn seg(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// `POST /authorize`
pub fn authorize() -> String {
    "/authorize".to_string()
}

/// `POST /transfers` or `POST /boards`
pub fn create(kind: CollectionKind) -> String {
    format!("/{}", kind.path_segment())
}

/// `GET /{collection}/{id}`
pub fn collection(kind: CollectionKind, id: &str) -> String {
    format!("/{}/{}", kind.path_segment(), seg(id))
}

/// `POST /{collection}/{id}/items`
pub fn items(kind: CollectionKind, id: &str) -> String {
    format!("{}/items", collection(kind, id))
}

/// `GET /{collection}/{id}/files/{file_id}/upload-url/{part}[/{multipart_id}]`
pub fn upload_url(
    kind: CollectionKind,
    id: &str,
    file_id: &str,
    part_number: u32,
    multipart_id: Option<&str>,
) -> String {
    let base = format!(
        "{}/files/{}/upload-url/{part_number}",
        collection(kind, id),
        seg(file_id)
    );
    match multipart_id {
        Some(m) => format!("{base}/{}", seg(m)),
        None => base,
    }
}

/// `PUT /{collection}/{id}/files/{file_id}/upload-complete`
pub fn upload_complete(kind: CollectionKind, id: &str, file_id: &str) -> String {
    format!(
        "{}/files/{}/upload-complete",
        collection(kind, id),
        seg(file_id)
    )
}

/// `PUT /{collection}/{id}/finalize`
pub fn finalize(kind: CollectionKind, id: &str) -> String {
    format!("{}/finalize", collection(kind, id))
}
