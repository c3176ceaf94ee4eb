//! Error types for the request client.
//!
//! # Design
//! A request can fail at three points: before the network (bad path, failed
//! precondition, unencodable payload), at the transport (no response at all),
//! or after a response arrived with a status outside the verb's success set.
//! Each point has its own variant so callers can branch without parsing
//! messages. The `ClientRequest` and `Status` messages are part of the public
//! contract and are asserted on by tests.

use thiserror::Error;

use crate::normalize::Body;

/// Errors returned by `RequestClient` operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The transport failed before any response was received (connection
    /// refused, DNS failure, timeout).
    #[error("Client request error: {message}")]
    ClientRequest { message: String },

    /// A response arrived but its status code is not in the verb's success
    /// set. The payload is kept because some callers inspect it.
    #[error("Failed with status code of {status}")]
    Status { status: u16, body: Body },

    /// Caller input failed a precondition. Raised before any network attempt.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The path or url handed to a verb method cannot form a request url.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    /// Status code carried by a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Payload carried by a `Status` error.
    pub fn body(&self) -> Option<&Body> {
        match self {
            Error::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_request_message_wraps_transport_text() {
        let err = Error::ClientRequest {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Client request error: connection refused");
    }

    #[test]
    fn status_message_names_the_code() {
        let err = Error::Status {
            status: 500,
            body: Body::Empty,
        };
        assert_eq!(err.to_string(), "Failed with status code of 500");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn status_accessors_are_none_for_other_variants() {
        let err = Error::Validation("id is required".to_string());
        assert!(err.status().is_none());
        assert!(err.body().is_none());
    }

    #[test]
    fn json_errors_convert_to_deserialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
