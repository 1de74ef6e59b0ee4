//! Incremental, validating construction of a [`CollectionDraft`].

use std::io::{Read, Seek};
use std::path::Path;

use courier_protocol::CollectionKind;
use courier_transfer::SourceHandle;

use crate::error::UploadError;
use crate::types::{CollectionDraft, FileItem, LinkItem, same_file_name};

/// Collects files and links for a new transfer or board.
///
/// Every `add_*` call validates its input against the items already added
/// and leaves the builder untouched when it fails. Nothing touches the
/// network until the sealed draft is handed to an uploader.
#[derive(Debug)]
pub struct CollectionBuilder {
    kind: CollectionKind,
    title: String,
    description: Option<String>,
    files: Vec<FileItem>,
    links: Vec<LinkItem>,
}

impl CollectionBuilder {
    /// Starts a transfer with the given message.
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::new(CollectionKind::Transfer, message.into())
    }

    /// Starts a board with the given name.
    pub fn board(name: impl Into<String>) -> Self {
        Self::new(CollectionKind::Board, name.into())
    }

    fn new(kind: CollectionKind, title: String) -> Self {
        Self {
            kind,
            title,
            description: None,
            files: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn description(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        self.description = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Adds a file whose size is taken from the source.
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        source: SourceHandle,
    ) -> Result<&mut Self, UploadError> {
        let size = source.size();
        self.push_file(name.into(), size, source)
    }

    /// Adds a file with a declared size, checked against the source.
    pub fn add_file_with_size(
        &mut self,
        name: impl Into<String>,
        size: u64,
        source: SourceHandle,
    ) -> Result<&mut Self, UploadError> {
        let name = name.into();
        if source.size() != size {
            return Err(UploadError::FileMismatch {
                name,
                declared: size,
                actual: source.size(),
            });
        }
        self.push_file(name, size, source)
    }

    /// Adds any seekable reader.
    pub fn add_reader<R>(&mut self, name: impl Into<String>, reader: R) -> Result<&mut Self, UploadError>
    where
        R: Read + Seek + Send + 'static,
    {
        let source = SourceHandle::new(reader)?;
        self.add_file(name, source)
    }

    /// Adds a file from disk, named after its last path component.
    pub fn add_file_at_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::Validation(format!("no file name in {}", path.display())))?;
        // Check the name before opening so duplicates fail without touching disk.
        self.check_file_name(&name)?;
        let source = SourceHandle::open(path)?;
        self.add_file(name, source)
    }

    /// Adds a web link. An empty title defaults to the url.
    pub fn add_web_link(
        &mut self,
        url: impl Into<String>,
        title: Option<&str>,
    ) -> Result<&mut Self, UploadError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(UploadError::Validation("link url must not be empty".into()));
        }
        if self.links.iter().any(|l| l.url == url) {
            return Err(UploadError::DuplicateLink(url));
        }
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => url.clone(),
        };
        self.links.push(LinkItem { url, title });
        Ok(self)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Seals the builder.
    pub fn build(self) -> Result<CollectionDraft, UploadError> {
        if self.title.trim().is_empty() {
            let field = match self.kind {
                CollectionKind::Transfer => "transfer message",
                CollectionKind::Board => "board name",
            };
            return Err(UploadError::Validation(format!("{field} must not be empty")));
        }
        if self.files.is_empty() && self.links.is_empty() {
            return Err(UploadError::NoItemsAdded);
        }
        Ok(CollectionDraft {
            kind: self.kind,
            title: self.title,
            description: self.description,
            files: self.files,
            links: self.links,
        })
    }

    fn push_file(
        &mut self,
        name: String,
        size: u64,
        source: SourceHandle,
    ) -> Result<&mut Self, UploadError> {
        self.check_file_name(&name)?;
        if size == 0 {
            return Err(UploadError::Validation(format!("file {name} is empty")));
        }
        self.files.push(FileItem::new(name, size, source));
        Ok(self)
    }

    fn check_file_name(&self, name: &str) -> Result<(), UploadError> {
        if name.trim().is_empty() {
            return Err(UploadError::Validation("file name must not be empty".into()));
        }
        if self.files.iter().any(|f| same_file_name(f.name(), name)) {
            return Err(UploadError::DuplicateFileName(name.to_string()));
        }
        Ok(())
    }
}
