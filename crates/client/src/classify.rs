//! Maps response status codes to error kinds.

use courier_protocol::ErrorBody;
use reqwest::StatusCode;

use crate::error::Error;

/// Outcome of a response, decided from its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    Ok,
    ClientError(String),
    ServerError(String),
    UnknownError(String),
}

impl ResponseClass {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseClass::Ok)
    }

    /// Converts the classification into the session error for `status`.
    pub fn into_result(self, status: u16) -> Result<(), Error> {
        match self {
            ResponseClass::Ok => Ok(()),
            ResponseClass::ClientError(message) => Err(Error::Client { status, message }),
            ResponseClass::ServerError(message) => Err(Error::Server { status, message }),
            ResponseClass::UnknownError(message) => Err(Error::UnknownStatus { status, message }),
        }
    }
}

/// Classifies a response.
///
/// - 200–299 → `Ok`
/// - 400–499 → `ClientError`
/// - 500–504 → `ServerError`
/// - anything else → `UnknownError`
///
/// The message is the body's `message` field when present, otherwise a
/// generic description of the status.
pub fn classify(status: u16, body: &[u8]) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Ok,
        400..=499 => ResponseClass::ClientError(message_from(status, body)),
        500..=504 => ResponseClass::ServerError(message_from(status, body)),
        _ => ResponseClass::UnknownError(message_from(status, body)),
    }
}

fn message_from(status: u16, body: &[u8]) -> String {
    let from_body = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty());
    if let Some(message) = from_body {
        return message;
    }

    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status");
    format!("request failed with status {status} ({reason})")
}
