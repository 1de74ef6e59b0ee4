//! Collection upload flow: build, create, upload, complete, finalize.
//!
//! This crate holds the upload logic on top of an authenticated
//! [`Session`](courier_client::Session). It has no UI dependencies; the
//! CLI (or any other front end) supplies the session and reads progress
//! from the event channel.
//!
//! # Pipeline
//!
//! 1. **Build**: collect files and links with [`CollectionBuilder`]
//! 2. **Create**: declare the collection and its items remotely
//! 3. **Upload**: send every file part by part to signed URLs
//! 4. **Complete**: confirm each file's parts
//! 5. **Finalize**: close the collection and obtain its share URL

pub mod builder;
pub mod coordinator;
pub mod error;
pub mod orchestrator;
pub mod remote;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use builder::CollectionBuilder;
pub use coordinator::CompletionCoordinator;
pub use error::UploadError;
pub use orchestrator::UploadOrchestrator;
pub use remote::{RemoteCollection, RemoteFileItem, RemoteItem, RemoteLinkItem, RemoteMultipart};
pub use types::{
    CollectionDraft, FileItem, FileOutcome, FileUploadReport, LinkItem, UploadEvent,
    UploadOptions, UploadReport, UploadedPart,
};
pub use uploader::{ChunkUploadTicket, ChunkUploader};
