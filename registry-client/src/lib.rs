//! Client for the upstream MCP registry list endpoint.
//!
//! One operation: page through `GET {base}/v0/servers` with an optional
//! `updated_since` watermark. Entries are passed through as opaque JSON;
//! normalization happens in the ingestion coordinator.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upstream page size ceiling imposed by the registry.
pub const MAX_UPSTREAM_PAGE: u32 = 100;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body_excerpt}")]
    Http { status: u16, body_excerpt: String },

    #[error("upstream envelope did not validate: {0}")]
    Shape(String),
}

/// A page request against the upstream catalog.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub cursor: Option<String>,
    /// Clamped to [`MAX_UPSTREAM_PAGE`].
    pub limit: u32,
    /// RFC3339 watermark; upstream filters strictly-greater-than.
    pub updated_since: Option<String>,
}

/// One validated page of upstream entries.
#[derive(Debug, Clone)]
pub struct UpstreamPage {
    pub entries: Vec<Value>,
    pub next_cursor: Option<String>,
    pub count: Option<u64>,
}

#[derive(Deserialize)]
struct Envelope {
    servers: Vec<Value>,
    #[serde(default)]
    metadata: Option<EnvelopeMeta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeMeta {
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    count: Option<u64>,
}

/// Thin client for the upstream registry.
pub struct UpstreamClient {
    client: Client,
    url_servers: String,
}

impl UpstreamClient {
    /// Builds a client for the registry at `base_url`.
    ///
    /// # Errors
    /// Returns `UpstreamError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            url_servers: format!("{base}/v0/servers"),
        })
    }

    /// Fetches one catalog page.
    ///
    /// # Errors
    /// - `UpstreamError::Http` with a body excerpt on non-2xx
    /// - `UpstreamError::Shape` when the envelope does not validate as
    ///   `{servers: [...], metadata?: {nextCursor?, count?}}`
    /// - `UpstreamError::Transport` on network failures
    pub async fn fetch_page(&self, req: &PageRequest) -> Result<UpstreamPage, UpstreamError> {
        let mut query: Vec<(&str, String)> =
            vec![("limit", req.limit.clamp(1, MAX_UPSTREAM_PAGE).to_string())];
        if let Some(cursor) = &req.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(since) = &req.updated_since {
            query.push(("updated_since", since.clone()));
        }

        debug!(url = %self.url_servers, cursor = ?req.cursor, "fetching upstream page");

        let resp = self
            .client
            .get(&self.url_servers)
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body_excerpt: excerpt(&body),
            });
        }

        let body = resp.text().await?;
        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Shape(format!("{e}; body: {}", excerpt(&body))))?;

        let (next_cursor, count) = envelope
            .metadata
            .map(|m| (m.next_cursor, m.count))
            .unwrap_or((None, None));

        debug!(
            entries = envelope.servers.len(),
            has_next = next_cursor.is_some(),
            "upstream page fetched"
        );

        Ok(UpstreamPage {
            entries: envelope.servers,
            next_cursor,
            count,
        })
    }
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let line = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.len() <= MAX {
        line
    } else {
        let cut = line
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &line[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_requires_servers_array() {
        let ok: Result<Envelope, _> =
            serde_json::from_str(r#"{"servers": [], "metadata": {"nextCursor": "abc"}}"#);
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap().metadata.unwrap().next_cursor.as_deref(), Some("abc"));

        let missing: Result<Envelope, _> = serde_json::from_str(r#"{"metadata": {}}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn metadata_is_optional() {
        let env: Envelope = serde_json::from_str(r#"{"servers": [{"server": {}}]}"#).unwrap();
        assert_eq!(env.servers.len(), 1);
        assert!(env.metadata.is_none());
    }
}
