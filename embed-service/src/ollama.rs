//! Ollama embedding provider implementation.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{EmbedError, make_snippet};
use crate::{EmbedConfig, EmbeddingsProvider};

/// Ollama embedding provider (async).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    url_embeddings: String,
    model: String,
    dim: Option<usize>,
}

impl OllamaEmbedder {
    /// Construct a new embedder from configuration.
    ///
    /// # Errors
    /// Returns `EmbedError::Transport` if the HTTP client cannot be built.
    pub fn new(cfg: &EmbedConfig) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let base = cfg.endpoint.trim_end_matches('/');
        Ok(Self {
            client,
            url_embeddings: format!("{base}/api/embeddings"),
            model: cfg.model.clone(),
            dim: cfg.dim,
        })
    }
}

impl EmbeddingsProvider for OllamaEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>>
    {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Request<'a> {
                model: &'a str,
                prompt: &'a str,
            }

            #[derive(Deserialize)]
            struct Response {
                embedding: Vec<f32>,
            }

            let req = Request {
                model: &self.model,
                prompt: text,
            };

            let resp = self
                .client
                .post(&self.url_embeddings)
                .json(&req)
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

            let parsed: Response = resp
                .json()
                .await
                .map_err(|e| EmbedError::Decode(format!("Ollama JSON parse failed: {e}")))?;

            if let Some(want) = self.dim {
                if parsed.embedding.len() != want {
                    return Err(EmbedError::VectorSizeMismatch {
                        got: parsed.embedding.len(),
                        want,
                    });
                }
            }

            Ok(parsed.embedding)
        })
    }
}
