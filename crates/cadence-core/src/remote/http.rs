//! Snapshot published at an HTTP endpoint

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, LAST_MODIFIED};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{RemoteSnapshot, RemoteSnapshotSource};
use crate::error::{Error, Result};
use crate::models::Snapshot;
use crate::util::{compact_text, is_http_url, normalize_text_option};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote that GETs and PUTs the snapshot JSON at one endpoint
#[derive(Clone)]
pub struct HttpRemote {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|error| Error::RemoteFetch(error.to_string()))?;

        Ok(Self {
            endpoint,
            token: normalize_text_option(token),
            client,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = normalize_text_option(token);
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RemoteSnapshotSource for HttpRemote {
    async fn fetch_remote(&self) -> Result<RemoteSnapshot> {
        let response = self
            .authorize(self.client.get(&self.endpoint))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Error::NotFound(format!("remote snapshot {}", self.endpoint)));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::RemoteFetch(parse_api_error(status, &body)));
            }
            _ => {}
        }

        let header_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);
        let snapshot = response
            .json::<Snapshot>()
            .await
            .map_err(|error| Error::RemoteFetch(format!("invalid snapshot payload: {error}")))?;

        tracing::debug!("Fetched remote snapshot from {}", self.endpoint);
        Ok(RemoteSnapshot {
            modified_at: header_modified.unwrap_or(snapshot.last_modified),
            snapshot,
        })
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let response = self
            .authorize(self.client.put(&self.endpoint))
            .json(snapshot)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteFetch(parse_api_error(status, &body)));
        }

        tracing::info!("Published snapshot to {}", self.endpoint);
        Ok(())
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn transport_error(error: reqwest::Error) -> Error {
    Error::RemoteFetch(format!("request failed: {error}"))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidConfig("remote endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidConfig(
            "remote endpoint must include http:// or https://".to_string(),
        ))
    }
}
