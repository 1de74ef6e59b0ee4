pub mod endpoints;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    AddItemsRequest, AuthorizeResponse, CollectionResponse, CompleteFileRequest,
    CreateCollectionRequest, ErrorBody, FileResponse, ItemRequest, ItemResponse, LinkMeta,
    LinkResponse, MultipartInfo, PartNumbers, UploadUrlResponse,
};
pub use types::{CollectionKind, CollectionState};
