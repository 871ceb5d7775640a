//! Ollama embedding backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tether_core::defaults::{
    EMBED_DIMENSION, EMBED_MAX_CHARS, EMBED_MODEL, EMBED_TIMEOUT_SECS, OLLAMA_URL,
};
use tether_core::{EmbeddingProvider, Error, Result};

/// Embedding operations slower than this get a WARN with `slow = true`.
const SLOW_EMBED_MS: u64 = 5_000;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama-backed [`EmbeddingProvider`].
pub struct OllamaEmbeddings {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl OllamaEmbeddings {
    /// Create a backend with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(
            OLLAMA_URL.to_string(),
            EMBED_MODEL.to_string(),
            EMBED_DIMENSION,
            Duration::from_secs(EMBED_TIMEOUT_SECS),
        )
    }

    /// Create a backend with custom configuration.
    pub fn with_config(
        base_url: String,
        model: String,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %base_url,
            model = %model,
            "Initializing Ollama embedding backend"
        );

        Ok(Self {
            client,
            base_url,
            model,
            dimension,
            timeout,
        })
    }

    /// Create from `TETHER_OLLAMA_URL`, `TETHER_EMBED_MODEL`,
    /// `TETHER_EMBED_DIM`, and `TETHER_EMBED_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("TETHER_OLLAMA_URL").unwrap_or_else(|_| OLLAMA_URL.to_string());
        let model = std::env::var("TETHER_EMBED_MODEL").unwrap_or_else(|_| EMBED_MODEL.to_string());
        let dimension = std::env::var("TETHER_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(EMBED_DIMENSION);
        let timeout = std::env::var("TETHER_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(EMBED_TIMEOUT_SECS);

        Self::with_config(base_url, model, dimension, Duration::from_secs(timeout))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_on_char_boundary(text, EMBED_MAX_CHARS);
        if input.trim().is_empty() {
            return Err(Error::Embedding("empty embedding input".to_string()));
        }

        let start = Instant::now();
        let request = EmbedRequest {
            model: &self.model,
            input,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let embedding = result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Ollama returned no embeddings".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "expected dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            subsystem = "inference",
            component = "ollama",
            op = "embed",
            duration_ms = elapsed,
            "Embedded text"
        );
        if elapsed > SLOW_EMBED_MS {
            warn!(
                subsystem = "inference",
                component = "ollama",
                duration_ms = elapsed,
                slow = true,
                "Slow embedding operation"
            );
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn truncate_on_char_boundary(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut cut = max_chars;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_dimension() {
        let backend = OllamaEmbeddings::new().unwrap();
        assert_eq!(backend.dimension(), EMBED_DIMENSION);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "é".repeat(10);
        // Cutting mid-codepoint backs off instead of panicking.
        let cut = truncate_on_char_boundary(&text, 5);
        assert_eq!(cut, "éé");

        let short = "abc";
        assert_eq!(truncate_on_char_boundary(short, 10), "abc");
    }

    #[test]
    fn test_embed_request_serialization() {
        let request = EmbedRequest {
            model: "nomic-embed-text",
            input: "hello",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"], "hello");
    }
}
