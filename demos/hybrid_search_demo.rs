//! Hybrid Search Demo Application
//!
//! Runs searches against in-process back ends to show fusion, caching,
//! invalidation, warming and metrics without any external services.
//!
//! Usage:
//!   cargo run --example hybrid_search_demo
//!
//! Environment variables:
//!   RUST_LOG                 - log filter (default: info)
//!   WEAVE_CONTEXTUAL_WEIGHT  - contextual weight (default: 0.6)
//!   WEAVE_STRUCTURAL_WEIGHT  - structural weight (default: 0.4)

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weave_memory::cache::{start_auto_cleanup, InMemoryStore};
use weave_memory::search::{
    ContextualHit, ContextualStore, GraphNode, HybridMemory, MemoryRecord, NewMemory, Query,
    StructuralHit, StructuralStore,
};
use weave_memory::{MemoryConfig, MemoryError, Result};

/// Naive word-overlap "similarity" over per-user notes
#[derive(Default)]
struct NotesStore {
    notes: RwLock<Vec<(String, String, String)>>,
}

#[async_trait]
impl ContextualStore for NotesStore {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        _filters: &BTreeMap<String, serde_json::Value>,
        limit: usize,
    ) -> Result<Vec<ContextualHit>> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let notes = self.notes.read().await;

        let mut hits: Vec<ContextualHit> = notes
            .iter()
            .filter(|(_, owner, _)| owner == user_id)
            .filter_map(|(id, _, content)| {
                let content_lower = content.to_lowercase();
                let matched = words.iter().filter(|w| content_lower.contains(w.as_str())).count();
                (matched > 0).then(|| ContextualHit {
                    id: id.clone(),
                    score: matched as f64 / words.len().max(1) as f64,
                    payload: serde_json::json!({ "content": content }),
                })
            })
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn add(
        &self,
        user_id: &str,
        content: &str,
        _metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let mut notes = self.notes.write().await;
        let id = format!("note-{}", notes.len() + 1);
        notes.push((id.clone(), user_id.to_string(), content.to_string()));
        Ok(id)
    }

    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let notes = self.notes.read().await;
        Ok(notes
            .iter()
            .filter(|(_, owner, _)| owner == user_id)
            .map(|(id, owner, content)| MemoryRecord {
                id: id.clone(),
                user_id: owner.clone(),
                content: content.clone(),
                metadata: serde_json::Map::new(),
            })
            .collect())
    }

    async fn update(&self, memory_id: &str, content: &str) -> Result<()> {
        let mut notes = self.notes.write().await;
        let note = notes
            .iter_mut()
            .find(|(id, _, _)| id == memory_id)
            .ok_or_else(|| MemoryError::QueryError(format!("no memory {}", memory_id)))?;
        note.2 = content.to_string();
        Ok(())
    }

    async fn delete(&self, memory_id: &str) -> Result<()> {
        self.notes.write().await.retain(|(id, _, _)| id != memory_id);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Fixed set of concepts standing in for a graph
struct ConceptGraph {
    concepts: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl StructuralStore for ConceptGraph {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<StructuralHit>> {
        let query = query.to_lowercase();
        Ok(self
            .concepts
            .iter()
            .filter(|(name, _)| query.contains(name))
            .take(limit)
            .map(|(name, label)| StructuralHit {
                node: GraphNode {
                    id: format!("concept:{}", name),
                    labels: vec![label.to_string()],
                    properties: serde_json::json!({ "name": name }),
                },
                similarity: 0.8,
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Hybrid Memory Demo ===");

    let config = MemoryConfig::from_env()?;
    let cache_store = Arc::new(InMemoryStore::new(config.store.clone()));
    let notes = Arc::new(NotesStore::default());
    let graph = Arc::new(ConceptGraph {
        concepts: vec![("ownership", "Concept"), ("borrowing", "Concept"), ("tokio", "Crate")],
    });

    let cleanup = CancellationToken::new();
    let cleanup_task = start_auto_cleanup(cache_store.clone(), cleanup.clone());

    let memory = Arc::new(HybridMemory::new(config, cache_store, notes, graph)?);
    memory.connect().await;
    let warmer = memory.warmer();
    warmer.start().await;

    for content in [
        "ownership moves values between bindings",
        "borrowing lets you reference without ownership",
    ] {
        memory.add_memory(NewMemory::new("alice", content)).await?;
    }

    info!("\n--- Search (cold) ---");
    let query = Query::new("ownership borrowing", "alice");
    for item in memory.search(&query).await?.iter() {
        info!(
            "  {:<20} {:.3} {:?}",
            item.item.id, item.combined_score, item.relevance
        );
    }

    info!("\n--- Search (cached) ---");
    let cached = memory.search(&Query::new("ownership borrowing", "alice")).await?;
    info!("  {} results from cache", cached.len());

    info!("\n--- Delete ---");
    memory.delete_memory("note-1", Some("alice")).await?;
    let remaining = memory.all_memories("alice").await?;
    info!("  alice keeps {} memories", remaining.len());
    let refreshed = memory.search(&Query::new("ownership borrowing", "alice")).await?;
    info!("  {} results after delete", refreshed.len());

    info!("\n--- Warming ---");
    warmer.analyze_patterns().await;
    let report = warmer.run_warming_pass().await;
    info!("  warmed {:?}", report.succeeded);

    info!("\n--- Health ---");
    let health = memory.health().await;
    info!("  overall: {:?} (HTTP {})", health.status, health.status.to_http_status_code());
    for component in &health.components {
        info!("  {:<12} {:?} {}ms", component.name, component.status, component.response_time_ms);
    }

    info!("\n--- Metrics ---");
    info!("  {}", serde_json::to_string_pretty(&memory.metrics().await)?);

    warmer.shutdown().await;
    cleanup.cancel();
    cleanup_task.await?;
    info!("=== Demo Complete ===");
    Ok(())
}
