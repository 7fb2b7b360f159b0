//! Embedding provider abstraction.
//!
//! The catalog pipeline treats embeddings as strictly optional: when the
//! provider is disabled [`EmbeddingClient::embed`] returns `Ok(None)`
//! without side effects, and provider failures are surfaced as errors the
//! caller downgrades to "no embedding for this record". Every provider
//! call is bounded by the configured timeout.

mod config;
mod errors;
pub mod ollama;
pub mod openai;

pub use config::{EmbedConfig, EmbedProviderKind};
pub use errors::EmbedError;

use std::{future::Future, pin::Pin};
use tracing::info;

/// Provider interface for embedding generation.
///
/// Implement this trait to plug in another embedding backend.
pub trait EmbeddingsProvider: Send + Sync {
    /// Async embedding function.
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>>;
}

/// A dense vector together with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedEmbedding {
    pub model: String,
    pub vector: Vec<f32>,
}

/// High-level client over the configured provider, or a no-op when
/// embeddings are disabled.
pub struct EmbeddingClient {
    provider: Option<Box<dyn EmbeddingsProvider>>,
    model: String,
}

impl EmbeddingClient {
    /// A client with embeddings off; `embed` always returns `Ok(None)`.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            model: String::new(),
        }
    }

    /// Constructs the client for the configured backend.
    ///
    /// # Errors
    /// Returns `EmbedError::Config` on incomplete provider configuration
    /// and `EmbedError::Transport` if the HTTP client cannot be built.
    pub fn from_config(cfg: &EmbedConfig) -> Result<Self, EmbedError> {
        let provider: Option<Box<dyn EmbeddingsProvider>> = match cfg.provider {
            EmbedProviderKind::Disabled => None,
            EmbedProviderKind::Ollama => Some(Box::new(ollama::OllamaEmbedder::new(cfg)?)),
            EmbedProviderKind::OpenAi => Some(Box::new(openai::OpenAiEmbedder::new(cfg)?)),
        };
        if provider.is_some() {
            info!(provider = ?cfg.provider, model = %cfg.model, "embedding client initialized");
        }
        Ok(Self {
            provider,
            model: cfg.model.clone(),
        })
    }

    pub fn enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Computes an embedding for `text`, or `Ok(None)` when disabled.
    ///
    /// # Errors
    /// Propagates provider transport, status, decode and dimension errors;
    /// callers in the ingestion path treat these as non-fatal.
    pub async fn embed(&self, text: &str) -> Result<Option<ComputedEmbedding>, EmbedError> {
        let Some(provider) = self.provider.as_deref() else {
            return Ok(None);
        };
        let vector = provider.embed(text).await?;
        Ok(Some(ComputedEmbedding {
            model: self.model.clone(),
            vector,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(Vec<f32>);

    impl EmbeddingsProvider for FixedProvider {
        fn embed<'a>(
            &'a self,
            _text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>> {
            let v = self.0.clone();
            Box::pin(async move { Ok(v) })
        }
    }

    #[tokio::test]
    async fn disabled_client_returns_none() {
        let client = EmbeddingClient::disabled();
        assert!(!client.enabled());
        assert_eq!(client.embed("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn enabled_client_labels_vectors_with_the_model() {
        let client = EmbeddingClient {
            provider: Some(Box::new(FixedProvider(vec![0.5, 0.5]))),
            model: "test-embed".into(),
        };
        let out = client.embed("hello").await.unwrap().unwrap();
        assert_eq!(out.model, "test-embed");
        assert_eq!(out.vector, vec![0.5, 0.5]);
    }
}
