//! Error types for the proxy pipeline.
//!
//! Almost every variant is recovered from inside the pipeline by falling back
//! to a plain passthrough. Only a failed passthrough reaches the client, as a
//! bare `502 Bad Gateway` (or `400` when the request body was unreadable or
//! too large).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Which kind of metadata record a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A `holder` record looked up by address.
    Profile,
    /// A `token` record looked up by id.
    Content,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Profile => f.write_str("profile"),
            Self::Content => f.write_str("token"),
        }
    }
}

/// Proxy error type.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The metadata API answered but had no record for the key.
    #[error("could not fetch {kind} information {key}")]
    MetadataNotFound {
        /// Record kind that was requested.
        kind: RecordKind,
        /// Address or token id.
        key: String,
    },

    /// The metadata API could not be reached or its body could not be read.
    #[error("metadata request failed: {0}")]
    MetadataTransport(#[source] reqwest::Error),

    /// The metadata API returned something that is not the expected JSON.
    #[error("metadata response is not valid JSON: {0}")]
    MetadataParse(#[from] serde_json::Error),

    /// The metadata API returned GraphQL errors and no data.
    #[error("metadata query failed: {0}")]
    Graphql(String),

    /// The upstream origin could not be reached or its body could not be read.
    #[error("origin request failed: {0}")]
    OriginFetch(#[source] reqwest::Error),

    /// The inbound request did not carry enough to rebuild its public URL.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    /// The inbound request body could not be read or exceeded the size limit.
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
}

impl ProxyError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MetadataNotFound { .. } => "metadata_not_found",
            Self::MetadataTransport(_) => "metadata_transport",
            Self::MetadataParse(_) => "metadata_parse",
            Self::Graphql(_) => "metadata_graphql",
            Self::OriginFetch(_) => "origin_fetch",
            Self::InvalidUrl(_) => "invalid_url",
            Self::RequestBody(_) => "request_body",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::RequestBody(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            _ => (StatusCode::BAD_GATEWAY, "Bad Gateway"),
        };

        tracing::error!(error = %self, kind = self.kind(), status = %status, "request failed");

        (
            status,
            [("content-type", "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}
