//! Retrieval back ends consulted by the hybrid memory service

use crate::error::Result;
use crate::search::types::{ContextualHit, MemoryRecord, StructuralHit};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Similarity-ranked, per-user memory store
#[async_trait]
pub trait ContextualStore: Send + Sync {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        filters: &BTreeMap<String, serde_json::Value>,
        limit: usize,
    ) -> Result<Vec<ContextualHit>>;

    /// Store a memory and return its id
    async fn add(
        &self,
        user_id: &str,
        content: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String>;

    /// Every memory stored for a user
    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>>;

    /// Replace the content of a stored memory
    async fn update(&self, memory_id: &str, content: &str) -> Result<()>;

    async fn delete(&self, memory_id: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Relationship-ranked graph store
#[async_trait]
pub trait StructuralStore: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<StructuralHit>>;

    /// Prepare data behind a key pattern; no-op unless the store has a use for it
    async fn warm(&self, _pattern: &str) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()>;
}
