//! # tether-inference
//!
//! Embedding backends: the Ollama HTTP client used in production and a
//! deterministic mock for tests and offline runs.

pub mod mock;
pub mod ollama;

pub use mock::MockEmbeddings;
pub use ollama::OllamaEmbeddings;
