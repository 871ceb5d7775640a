//! # tether-core
//!
//! Core types, traits, and abstractions for the tether link manager.
//!
//! This crate provides the data model, the capability traits for external
//! collaborators (store, rankers, embeddings, fetcher), the error taxonomy,
//! and shared defaults that the other tether crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, FetchError, Result};
pub use models::*;
pub use traits::*;
