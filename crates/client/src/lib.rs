//! Authenticated session for the Courier collection API.
//!
//! A [`Session`] owns the API key, lazily acquires a bearer token on first
//! use, and routes every response through [`classify`]. Typed endpoint
//! calls (create, upload URLs, completion, finalize) are methods on the
//! session, parameterized by [`CollectionKind`](courier_protocol::CollectionKind).
//! The HTTP exchange itself goes through the [`HttpTransport`] trait so the
//! session can be driven by mocks in tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;

pub use classify::{ResponseClass, classify};
pub use config::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, SessionConfig};
pub use error::Error;
pub use session::Session;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

pub use reqwest::Method;
