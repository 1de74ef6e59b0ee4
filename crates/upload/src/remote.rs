//! Server-side view of a collection.

use courier_protocol::{CollectionKind, CollectionResponse, CollectionState, ItemResponse};
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::types::same_file_name;

/// Chunk layout the server assigned to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMultipart {
    pub part_count: u32,
    pub chunk_size: u64,
    pub upload_id: Option<String>,
}

/// A file as the server knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileItem {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub multipart: RemoteMultipart,
}

/// A web link as the server knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLinkItem {
    pub id: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteItem {
    File(RemoteFileItem),
    Link(RemoteLinkItem),
}

impl RemoteItem {
    pub fn id(&self) -> &str {
        match self {
            RemoteItem::File(f) => &f.id,
            RemoteItem::Link(l) => &l.id,
        }
    }

    fn from_response(item: ItemResponse) -> Result<Self, UploadError> {
        match item {
            ItemResponse::File(f) => {
                let expected = courier_transfer::part_count(f.size, f.multipart.chunk_size);
                match expected {
                    Some(n) if n == f.multipart.part_count => {}
                    Some(n) => {
                        return Err(UploadError::InvalidMultipart {
                            file: f.name,
                            reason: format!(
                                "{} parts announced, {n} needed for {} bytes in chunks of {}",
                                f.multipart.part_count, f.size, f.multipart.chunk_size
                            ),
                        });
                    }
                    None => {
                        return Err(UploadError::InvalidMultipart {
                            file: f.name,
                            reason: format!("unusable chunk size {}", f.multipart.chunk_size),
                        });
                    }
                }
                Ok(RemoteItem::File(RemoteFileItem {
                    id: f.id,
                    name: f.name,
                    size: f.size,
                    multipart: RemoteMultipart {
                        part_count: f.multipart.part_count,
                        chunk_size: f.multipart.chunk_size,
                        upload_id: f.multipart.id.filter(|id| !id.is_empty()),
                    },
                }))
            }
            ItemResponse::Link(l) => Ok(RemoteItem::Link(RemoteLinkItem {
                id: l.id,
                title: if l.meta.title.is_empty() {
                    l.url.clone()
                } else {
                    l.meta.title
                },
                url: l.url,
            })),
        }
    }
}

/// A persisted transfer or board.
///
/// State and share URL only move when a server response says so; see
/// [`apply_state`](Self::apply_state).
#[derive(Debug, Clone)]
pub struct RemoteCollection {
    kind: CollectionKind,
    id: String,
    state: CollectionState,
    share_url: Option<String>,
    items: Vec<RemoteItem>,
}

impl RemoteCollection {
    /// Builds the collection from a create (or fetch) response.
    ///
    /// Files whose multipart layout does not add up are rejected here, before
    /// any part is uploaded.
    pub fn from_response(
        kind: CollectionKind,
        resp: CollectionResponse,
    ) -> Result<Self, UploadError> {
        let items = resp
            .items
            .into_iter()
            .map(RemoteItem::from_response)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kind,
            id: resp.id,
            state: resp.state,
            share_url: resp.url.filter(|u| !u.is_empty()),
            items,
        })
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Public URL, known once the collection was finalized.
    pub fn share_url(&self) -> Option<&str> {
        self.share_url.as_deref()
    }

    pub fn items(&self) -> &[RemoteItem] {
        &self.items
    }

    pub fn files(&self) -> impl Iterator<Item = &RemoteFileItem> {
        self.items.iter().filter_map(|i| match i {
            RemoteItem::File(f) => Some(f),
            RemoteItem::Link(_) => None,
        })
    }

    pub fn links(&self) -> impl Iterator<Item = &RemoteLinkItem> {
        self.items.iter().filter_map(|i| match i {
            RemoteItem::Link(l) => Some(l),
            RemoteItem::File(_) => None,
        })
    }

    pub fn file(&self, file_id: &str) -> Option<&RemoteFileItem> {
        self.files().find(|f| f.id == file_id)
    }

    /// Looks a file up by name, ignoring case.
    pub fn file_by_name(&self, name: &str) -> Option<&RemoteFileItem> {
        self.files().find(|f| same_file_name(&f.name, name))
    }

    /// Moves to `next` if it is a forward transition.
    ///
    /// Regressions and moves out of a terminal state are ignored. Returns
    /// `true` if the state changed.
    pub fn apply_state(&mut self, next: CollectionState) -> bool {
        if next == self.state {
            return false;
        }
        if !self.state.can_advance_to(next) {
            warn!(
                collection = %self.id,
                current = %self.state,
                reported = %next,
                "ignoring backwards state transition"
            );
            return false;
        }
        debug!(collection = %self.id, from = %self.state, to = %next, "state changed");
        self.state = next;
        true
    }

    /// Applies the state and share URL carried by a server response.
    pub fn apply_response(&mut self, resp: &CollectionResponse) {
        if resp.id != self.id {
            warn!(collection = %self.id, reported = %resp.id, "response for another collection ignored");
            return;
        }
        self.apply_state(resp.state);
        if let Some(url) = resp.url.as_deref().filter(|u| !u.is_empty()) {
            self.share_url = Some(url.to_string());
        }
    }

    /// Appends items returned by an add-items call.
    pub(crate) fn append_items(&mut self, items: Vec<ItemResponse>) -> Result<usize, UploadError> {
        let items = items
            .into_iter()
            .map(RemoteItem::from_response)
            .collect::<Result<Vec<_>, _>>()?;
        let added = items.len();
        self.items.extend(items);
        Ok(added)
    }
}
