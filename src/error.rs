//! Error types for the API and token layers.
//!
//! The HTTP layer reports failures as [`ApiError`] so call sites can tell a
//! rejected request (non-2xx) apart from a transport failure or an
//! undecodable body. Everything above the API layer works in `anyhow`.

use reqwest::StatusCode;

/// A failed backend call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
        url: String,
        endpoint: String,
    },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON shape we expected.
    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// A serialized field inside a conversation item failed to parse.
    #[error("malformed {field} in conversation item {request_id}: {source}")]
    EmbeddedJson {
        request_id: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status of a rejected request, if the backend answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }
}

/// Failure to read a bearer token's claims.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("authorization is not a bearer token")]
    NotBearer,
    #[error("token has no payload segment")]
    MissingPayload,
    #[error("token payload is not valid base64")]
    InvalidBase64,
    #[error("token payload is not a JSON object")]
    InvalidJson,
    #[error("token has no tenant_id claim")]
    MissingTenant,
    #[error("token lifetime is out of range")]
    TtlOutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message_names_endpoint() {
        let err = ApiError::Status {
            status: StatusCode::FORBIDDEN,
            body: "Tenant access denied".to_string(),
            url: "http://localhost:8000/tenants/x/documents".to_string(),
            endpoint: "/tenants/x/documents".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        let msg = err.to_string();
        assert!(msg.contains("/tenants/x/documents"));
        assert!(msg.contains("Tenant access denied"));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ApiError::NotFound("Conversation not found".to_string());
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }
}
