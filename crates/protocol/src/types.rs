use std::fmt;

use serde::{Deserialize, Serialize};

/// The two flavours of collection the service knows about.
///
/// Item handling, uploads and finalization are shared; only the endpoint
/// prefix and a couple of payload fields differ per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Transfer,
    Board,
}

impl CollectionKind {
    /// URL path segment for this kind (`transfers` / `boards`).
    pub fn path_segment(self) -> &'static str {
        match self {
            CollectionKind::Transfer => "transfers",
            CollectionKind::Board => "boards",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Transfer => f.write_str("transfer"),
            CollectionKind::Board => f.write_str("board"),
        }
    }
}

/// Server-side lifecycle state of a collection.
///
/// States only move forward: `uploading → processing → downloadable | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionState {
    Uploading,
    Processing,
    Downloadable,
    Error,
}

impl CollectionState {
    /// Returns `true` for `downloadable` and `error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, CollectionState::Downloadable | CollectionState::Error)
    }

    /// Returns `true` if moving from `self` to `next` is a forward step.
    ///
    /// Staying in the same state is not a transition. Terminal states have
    /// no outgoing transitions.
    pub fn can_advance_to(self, next: CollectionState) -> bool {
        if self == next || self.is_terminal() {
            return false;
        }
        next.rank() > self.rank()
    }

    fn rank(self) -> u8 {
        match self {
            CollectionState::Uploading => 0,
            CollectionState::Processing => 1,
            CollectionState::Downloadable | CollectionState::Error => 2,
        }
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollectionState::Uploading => "uploading",
            CollectionState::Processing => "processing",
            CollectionState::Downloadable => "downloadable",
            CollectionState::Error => "error",
        };
        f.write_str(s)
    }
}
