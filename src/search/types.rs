//! Common types for the search module

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A search request; immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    request_id: Uuid,
    text: String,
    user_id: String,
    filters: BTreeMap<String, serde_json::Value>,
}

impl Query {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            text: text.into(),
            user_id: user_id.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Id used to correlate log lines of one request
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn filters(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.filters
    }
}

/// Back end that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Similarity-ranked personal memory
    Contextual,
    /// Relationship-ranked graph memory
    Structural,
}

impl MemorySource {
    /// Tie-break rank; lower sorts first
    pub fn priority(&self) -> u8 {
        match self {
            Self::Contextual => 0,
            Self::Structural => 1,
        }
    }

    pub fn relevance(&self) -> Relevance {
        match self {
            Self::Contextual => Relevance::Personal,
            Self::Structural => Relevance::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contextual => "contextual",
            Self::Structural => "structural",
        }
    }
}

/// Relevance tag attached to fused items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Personal,
    System,
}

/// Hit returned by the contextual store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualHit {
    pub id: String,
    pub score: f64,
    pub payload: serde_json::Value,
}

/// Node returned by the structural store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Hit returned by the structural store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralHit {
    pub node: GraphNode,
    pub similarity: f64,
}

/// A single ranked item from either back end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: String,
    pub raw_score: f64,
    pub source: MemorySource,
    pub payload: serde_json::Value,
}

impl From<ContextualHit> for ResultItem {
    fn from(hit: ContextualHit) -> Self {
        Self {
            id: hit.id,
            raw_score: hit.score,
            source: MemorySource::Contextual,
            payload: hit.payload,
        }
    }
}

impl From<StructuralHit> for ResultItem {
    fn from(hit: StructuralHit) -> Self {
        let id = hit.node.id.clone();
        let payload = serde_json::to_value(&hit.node).unwrap_or(serde_json::Value::Null);
        Self {
            id,
            raw_score: hit.similarity,
            source: MemorySource::Structural,
            payload,
        }
    }
}

/// An item of a fused ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedItem {
    pub item: ResultItem,
    pub combined_score: f64,
    pub source: MemorySource,
    pub relevance: Relevance,
}

/// Merged ranking, sorted by `combined_score` descending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub items: Vec<FusedItem>,
}

impl FusedResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FusedItem> {
        self.items.iter()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.combined_score).collect()
    }
}

impl IntoIterator for FusedResult {
    type Item = FusedItem;
    type IntoIter = std::vec::IntoIter<FusedItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A memory to add to the contextual store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewMemory {
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A memory as held by the contextual store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = Query::new("rust async", "alice").with_filter("topic", "code");
        assert_eq!(query.text(), "rust async");
        assert_eq!(query.user_id(), "alice");
        assert_eq!(query.filters()["topic"], "code");
        assert_ne!(query.request_id(), Query::new("x", "y").request_id());
    }

    #[test]
    fn test_source_priority_and_relevance() {
        assert!(MemorySource::Contextual.priority() < MemorySource::Structural.priority());
        assert_eq!(MemorySource::Contextual.relevance(), Relevance::Personal);
        assert_eq!(MemorySource::Structural.relevance(), Relevance::System);
    }

    #[test]
    fn test_structural_hit_conversion() {
        let hit = StructuralHit {
            node: GraphNode {
                id: "n1".to_string(),
                labels: vec!["Concept".to_string()],
                properties: serde_json::json!({"name": "tokio"}),
            },
            similarity: 0.8,
        };

        let item = ResultItem::from(hit);
        assert_eq!(item.id, "n1");
        assert_eq!(item.raw_score, 0.8);
        assert_eq!(item.source, MemorySource::Structural);
        assert_eq!(item.payload["properties"]["name"], "tokio");
    }
}
