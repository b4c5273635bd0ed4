//! Application state shared across all request handlers.

use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;

use crate::config::Config;
use crate::metadata::MetadataClient;

/// User agent sent on origin and metadata requests that carry none of their own.
const USER_AGENT: &str = concat!("teia-og-proxy/", env!("CARGO_PKG_VERSION"));

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// HTTP client for origin requests. Redirects are relayed, never followed.
    pub http: Client,

    /// Metadata API client, sharing the connection pool of `http`.
    pub metadata: MetadataClient,
}

impl AppState {
    /// Create a new application state from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;

        let metadata = MetadataClient::new(http.clone(), config.metadata_api_url.clone());

        tracing::info!(
            connect_timeout_secs = config.connect_timeout.map(|t| t.as_secs()),
            "application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            metadata,
        })
    }
}
