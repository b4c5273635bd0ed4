//! Forwarding requests to the origin and relaying its responses.

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, header};
use axum::response::Response;
use reqwest::{Client, Url};

use crate::error::ProxyError;

/// Connection-scoped headers that must not be relayed in either direction.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Rebuild the URL the client asked for.
///
/// The host comes from the request target when it is absolute (HTTP/2,
/// proxy-form), otherwise from `Host`. The scheme comes from
/// `X-Forwarded-Proto` when it names http or https, else `default_scheme`.
pub fn public_url(parts: &Parts, default_scheme: &str) -> Result<Url, ProxyError> {
    let scheme = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v == "http" || v == "https")
        .unwrap_or_else(|| default_scheme.to_string());

    let host = match parts.uri.authority() {
        Some(authority) => authority.as_str(),
        None => parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ProxyError::InvalidUrl("request has no host".to_string()))?,
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Url::parse(&format!("{scheme}://{host}{path_and_query}"))
        .map_err(|e| ProxyError::InvalidUrl(format!("{host}{path_and_query}: {e}")))
}

/// Point `url` at the origin, keeping path and query. The scheme is kept
/// unless `scheme` overrides it.
pub fn rewrite_host(
    url: &Url,
    hostname: &str,
    port: Option<u16>,
    scheme: Option<&str>,
) -> Result<Url, ProxyError> {
    let mut upstream = url.clone();
    if let Some(scheme) = scheme {
        upstream
            .set_scheme(scheme)
            .map_err(|()| ProxyError::InvalidUrl(format!("cannot switch {upstream} to {scheme}")))?;
    }
    upstream
        .set_host(Some(hostname))
        .map_err(|e| ProxyError::InvalidUrl(format!("target hostname '{hostname}': {e}")))?;
    upstream
        .set_port(port)
        .map_err(|()| ProxyError::InvalidUrl(format!("cannot set port on {upstream}")))?;
    Ok(upstream)
}

/// Copy inbound headers for the origin request.
///
/// `Host` is dropped (the client sets it from the URL), along with hop-by-hop
/// headers and `Content-Length`, which follows the forwarded body.
pub fn request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    strip_hop_by_hop(&mut headers);
    headers
}

/// Copy origin headers for a response whose body was rewritten.
pub fn rewritten_response_headers(origin: &HeaderMap) -> HeaderMap {
    let mut headers = origin.clone();
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_ENCODING);
    strip_hop_by_hop(&mut headers);
    headers
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Send one request to the origin.
pub async fn send(
    client: &Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
) -> Result<reqwest::Response, ProxyError> {
    let mut request = client.request(method, url).headers(headers);
    if !body.is_empty() {
        request = request.body(body);
    }
    request.send().await.map_err(ProxyError::OriginFetch)
}

/// Relay an origin response as-is: status, headers and body bytes.
pub async fn relay(response: reqwest::Response) -> Result<Response, ProxyError> {
    let status = response.status();
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);

    let body = response.bytes().await.map_err(ProxyError::OriginFetch)?;

    Ok(build_response(status, headers, body))
}

/// Assemble an outbound response.
pub fn build_response(status: StatusCode, headers: HeaderMap, body: impl Into<Body>) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Whether a response may be rewritten as HTML.
///
/// A missing `Content-Type` counts as HTML.
pub fn is_html(headers: &HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|v| v.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false),
    }
}
