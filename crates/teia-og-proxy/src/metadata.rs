//! GraphQL client for holder (profile) and token metadata.
//!
//! Each lookup is a single POST with the address or token id passed as a
//! bound variable. A missing or `null` record is `Ok(None)`; transport and
//! JSON failures are errors so the pipeline can log them apart.

use std::fmt;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ProxyError;

const PROFILE_QUERY: &str = r#"query GetProfileInfos($address: String!) {
  holder: holder_by_pk(address: $address) {
    metadata(path: "identicon")
    address
    name
    description
  }
}"#;

const CONTENT_QUERY: &str = r#"query GetTokenInfos($id: bigint!) {
  token: token_by_pk(id: $id) {
    id
    title
    description
    display_uri
    artifact_uri
  }
}"#;

/// A `holder` row: the profile behind a `/tz/{address}` page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRecord {
    /// Wallet address (primary key).
    #[serde(default)]
    pub address: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text bio.
    #[serde(default)]
    pub description: Option<String>,
    /// Identicon reference, usually an `ipfs://` URI.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ProfileRecord {
    /// The identicon as a string, if the API returned one.
    pub fn icon(&self) -> Option<String> {
        match self.metadata.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Token id as returned by the API. Some deployments serialize `bigint`
/// columns as JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TokenId {
    Number(u64),
    Text(String),
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A `token` row: the object behind an `/objkt/{id}` page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentRecord {
    /// Token id.
    #[serde(default)]
    pub id: Option<TokenId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Preview image URI.
    #[serde(default)]
    pub display_uri: Option<String>,
    /// The artifact itself, used when there is no preview image.
    #[serde(default)]
    pub artifact_uri: Option<String>,
}

/// A record fetched for one request.
#[derive(Debug, Clone)]
pub enum MetadataRecord {
    Profile(ProfileRecord),
    Content(ContentRecord),
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct HolderData {
    #[serde(default)]
    holder: Option<ProfileRecord>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(default)]
    token: Option<ContentRecord>,
}

/// Client for the metadata GraphQL API.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: Client,
    endpoint: String,
}

impl MetadataClient {
    /// Create a client that posts to `endpoint` using a shared HTTP client.
    pub fn new(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Fetch the holder record for a wallet address.
    pub async fn fetch_profile(&self, address: &str) -> Result<Option<ProfileRecord>, ProxyError> {
        let data: Option<HolderData> = self
            .query(
                "GetProfileInfos",
                PROFILE_QUERY,
                json!({ "address": address }),
            )
            .await?;

        Ok(data.and_then(|d| d.holder))
    }

    /// Fetch the token record for a token id.
    ///
    /// The id is forwarded as the digit string taken from the URL; the API
    /// coerces it to `bigint`, so ids beyond `u64` are still its call to reject.
    pub async fn fetch_content(&self, id: &str) -> Result<Option<ContentRecord>, ProxyError> {
        let data: Option<TokenData> = self
            .query("GetTokenInfos", CONTENT_QUERY, json!({ "id": id }))
            .await?;

        Ok(data.and_then(|d| d.token))
    }

    async fn query<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &'static str,
        variables: Value,
    ) -> Result<Option<T>, ProxyError> {
        let body = json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(ProxyError::MetadataTransport)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(ProxyError::MetadataTransport)?;

        tracing::debug!(
            operation,
            status = %status,
            bytes = text.len(),
            "metadata response received"
        );

        // A literal `null` body is treated like an empty envelope.
        let envelope: Option<GraphqlResponse<T>> = serde_json::from_str(&text)?;
        let Some(envelope) = envelope else {
            return Ok(None);
        };

        match envelope.data {
            Some(data) => Ok(Some(data)),
            None if !envelope.errors.is_empty() => {
                let messages: Vec<&str> = envelope
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect();
                Err(ProxyError::Graphql(messages.join("; ")))
            }
            None => Ok(None),
        }
    }
}
