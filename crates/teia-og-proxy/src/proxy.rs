//! The request pipeline.
//!
//! Every request is forwarded to the origin host. Two path shapes get extra
//! work first:
//!
//! - `/tz/{address}`: the holder record is fetched alongside the page.
//! - `/objkt/{id}`: the token record is fetched alongside the page.
//!
//! When the record arrives, the page is rewritten with fresh social tags. Any
//! failure on the way (no record, metadata API down, bad JSON, origin down)
//! is logged and the request is replayed as a plain passthrough, so clients
//! see the same outcome as for any other path.

use std::sync::LazyLock;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::response::Response;
use regex::Regex;
use reqwest::Url;

use crate::error::{ProxyError, RecordKind};
use crate::inject;
use crate::metadata::MetadataRecord;
use crate::state::AppState;
use crate::upstream;

/// Largest inbound body buffered for forwarding.
pub const MAX_REQUEST_BODY: usize = 8 * 1024 * 1024;

static PROFILE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/tz/(tz[a-zA-Z0-9]{34})").expect("profile path regex should compile")
});

static CONTENT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/objkt/([0-9]+)").expect("content path regex should compile")
});

/// A path that gets social tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/tz/{address}`.
    Profile(String),
    /// `/objkt/{id}`.
    Content(String),
}

impl Route {
    fn kind(&self) -> RecordKind {
        match self {
            Self::Profile(_) => RecordKind::Profile,
            Self::Content(_) => RecordKind::Content,
        }
    }

    fn key(&self) -> &str {
        match self {
            Self::Profile(key) | Self::Content(key) => key,
        }
    }
}

/// Decide whether a path gets social tags. Profile pages win over token
/// pages when both patterns occur in the same path.
pub fn classify(path: &str) -> Option<Route> {
    if let Some(caps) = PROFILE_PATH_RE.captures(path) {
        return Some(Route::Profile(caps[1].to_string()));
    }
    CONTENT_PATH_RE
        .captures(path)
        .map(|caps| Route::Content(caps[1].to_string()))
}

/// One inbound request, buffered so it can be sent to the origin twice.
struct Inbound {
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    /// What the client asked for.
    original_url: Url,
    /// The same URL on the origin host.
    upstream_url: Url,
}

/// Catch-all handler: every request not claimed by another route ends here.
pub async fn proxy_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let original_url = upstream::public_url(&parts, &state.config.public_scheme)?;
    let upstream_url = upstream::rewrite_host(
        &original_url,
        &state.config.target_hostname,
        state.config.target_port,
        state.config.target_scheme.as_deref(),
    )?;
    let body = axum::body::to_bytes(body, MAX_REQUEST_BODY)
        .await
        .map_err(ProxyError::RequestBody)?;

    let inbound = Inbound {
        method: parts.method,
        headers: parts.headers,
        body,
        original_url,
        upstream_url,
    };

    if let Some(route) = classify(inbound.upstream_url.path()) {
        tracing::debug!(
            kind = %route.kind(),
            key = route.key(),
            "matched social preview route"
        );

        match augment(&state, &inbound, &route).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    kind = err.kind(),
                    url = %inbound.original_url,
                    "failed to process token metadata, passing through"
                );
            }
        }
    }

    pass_through(&state, inbound).await
}

/// Fetch the page and its record together and rewrite the page.
async fn augment(
    state: &AppState,
    inbound: &Inbound,
    route: &Route,
) -> Result<Response, ProxyError> {
    let mut headers = upstream::request_headers(&inbound.headers);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // The body is rewritten as text, so ask for it uncompressed.
    headers.remove(header::ACCEPT_ENCODING);

    let origin = upstream::send(
        &state.http,
        inbound.method.clone(),
        inbound.upstream_url.clone(),
        headers,
        inbound.body.clone(),
    );

    let not_found = || ProxyError::MetadataNotFound {
        kind: route.kind(),
        key: route.key().to_string(),
    };

    let (response, record) = match route {
        Route::Profile(address) => {
            let (response, profile) =
                tokio::try_join!(origin, state.metadata.fetch_profile(address))?;
            let profile = profile.ok_or_else(not_found)?;
            (response, MetadataRecord::Profile(profile))
        }
        Route::Content(id) => {
            let (response, token) = tokio::try_join!(origin, state.metadata.fetch_content(id))?;
            let token = token.ok_or_else(not_found)?;
            (response, MetadataRecord::Content(token))
        }
    };

    if !upstream::is_html(response.headers()) {
        tracing::debug!(
            url = %inbound.original_url,
            status = %response.status(),
            "origin response is not html, relaying unchanged"
        );
        return upstream::relay(response).await;
    }

    let status = response.status();
    let headers = upstream::rewritten_response_headers(response.headers());
    let html = response.text().await.map_err(ProxyError::OriginFetch)?;

    let rewritten = inject::inject(&html, &record, &inbound.original_url, &state.config);

    tracing::debug!(
        url = %inbound.original_url,
        status = %status,
        kind = %route.kind(),
        "injected social preview tags"
    );

    Ok(upstream::build_response(status, headers, rewritten))
}

/// Forward the request untouched and relay the origin's answer.
async fn pass_through(state: &AppState, inbound: Inbound) -> Result<Response, ProxyError> {
    let headers = upstream::request_headers(&inbound.headers);
    let response = upstream::send(
        &state.http,
        inbound.method,
        inbound.upstream_url,
        headers,
        inbound.body,
    )
    .await?;

    upstream::relay(response).await
}
