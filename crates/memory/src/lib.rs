//! Storage implementations for LocalMind.
//!
//! - [`SqliteStore`]: transcript, chapter ledger and profiles in `localmind.db`
//! - [`SqliteVectorStore`]: semantic memory in `vectors.db`
//! - [`InMemoryStore`] / [`InMemoryVectorStore`]: the same contracts without persistence

pub mod in_memory;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub mod vector_store;

pub use in_memory::{InMemoryStore, InMemoryVectorStore};
pub use vector::cosine_similarity;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "sqlite")]
pub use vector_store::SqliteVectorStore;
