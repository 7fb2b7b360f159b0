//! OpenAI-compatible embedding provider implementation.
//!
//! Calls `POST {endpoint}/v1/embeddings` with Bearer auth and extracts
//! `data[0].embedding`.

use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::errors::{EmbedError, make_snippet};
use crate::{EmbedConfig, EmbeddingsProvider};

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    url_embeddings: String,
    model: String,
    dim: Option<usize>,
}

impl OpenAiEmbedder {
    /// Construct a new embedder from configuration.
    ///
    /// # Errors
    /// Returns `EmbedError::Config` if the API key is absent and
    /// `EmbedError::Transport` if the HTTP client cannot be built.
    pub fn new(cfg: &EmbedConfig) -> Result<Self, EmbedError> {
        let api_key = cfg
            .api_key
            .as_deref()
            .ok_or_else(|| EmbedError::Config("openai provider requires an api key".into()))?;

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| EmbedError::Config("api key contains invalid header bytes".into()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        let base = cfg.endpoint.trim_end_matches('/');
        Ok(Self {
            client,
            url_embeddings: format!("{base}/v1/embeddings"),
            model: cfg.model.clone(),
            dim: cfg.dim,
        })
    }
}

impl EmbeddingsProvider for OpenAiEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>>
    {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Request<'a> {
                model: &'a str,
                input: &'a str,
            }

            #[derive(Deserialize)]
            struct Response {
                data: Vec<Item>,
            }

            #[derive(Deserialize)]
            struct Item {
                embedding: Vec<f32>,
            }

            debug!(model = %self.model, input_len = text.len(), "POST {}", self.url_embeddings);

            let resp = self
                .client
                .post(&self.url_embeddings)
                .json(&Request {
                    model: &self.model,
                    input: text,
                })
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(EmbedError::HttpStatus {
                    status,
                    snippet: make_snippet(&body),
                });
            }

            let parsed: Response = resp.json().await.map_err(|e| {
                EmbedError::Decode(format!("serde error: {e}; expected `data[0].embedding`"))
            })?;

            let first = parsed
                .data
                .into_iter()
                .next()
                .ok_or_else(|| EmbedError::Decode("empty `data` in embeddings response".into()))?;

            if let Some(want) = self.dim {
                if first.embedding.len() != want {
                    return Err(EmbedError::VectorSizeMismatch {
                        got: first.embedding.len(),
                        want,
                    });
                }
            }

            Ok(first.embedding)
        })
    }
}
