//! Teia OG Proxy - social preview tags for profile and token pages.
//!
//! This crate provides an HTTP proxy that sits in front of the Teia web
//! frontend. Every request is forwarded to the origin host. Profile pages
//! (`/tz/{address}`) and token pages (`/objkt/{id}`) additionally get their
//! Open Graph and Twitter Card tags replaced with ones built from the
//! metadata API, so link unfurlers see the right title, description and
//! image without running the single-page app.
//!
//! # Architecture
//!
//! - **Proxy**: Classifies the path, forwards the request, falls back to a
//!   plain passthrough on any failure
//! - **Metadata**: Looks up holder and token records over GraphQL
//! - **Inject**: Strips the origin's social tags and inserts fresh ones
//!   after `<head>`
//!
//! # Failure model
//!
//! A missing record, an unreachable metadata API or a malformed response
//! never breaks the page: the request is replayed untouched. Only an
//! unreachable origin surfaces, as `502 Bad Gateway`.

pub mod config;
pub mod error;
pub mod inject;
pub mod metadata;
pub mod proxy;
pub mod routes;
pub mod state;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use routes::router;
pub use state::AppState;
