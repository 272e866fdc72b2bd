//! Neo4j-backed structural store
//!
//! Searches go through a full-text index and report the index score as the
//! similarity of each node.

use crate::config::GraphConfig;
use crate::error::{MemoryError, Result};
use crate::search::backends::StructuralStore;
use crate::search::types::{GraphNode, StructuralHit};
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use tracing::{debug, info};

/// URI schemes the Bolt driver accepts
const SUPPORTED_SCHEMES: &[&str] = &["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"];

const FULLTEXT_SEARCH: &str = "CALL db.index.fulltext.queryNodes($index, $query) YIELD node, score
     RETURN elementId(node) AS id,
            coalesce(node.name, '') AS name,
            labels(node) AS labels,
            score
     ORDER BY score DESC
     LIMIT $limit";

/// Structural store over a Neo4j graph
pub struct Neo4jGraphStore {
    graph: Graph,
    fulltext_index: String,
}

impl Neo4jGraphStore {
    /// Connect with pool settings from `config`
    ///
    /// # Example
    /// ```no_run
    /// use weave_memory::config::GraphConfig;
    /// use weave_memory::graph::Neo4jGraphStore;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let store = Neo4jGraphStore::connect(&GraphConfig::default()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        validate_uri(&config.uri)?;

        info!(
            "Connecting to Neo4j at {} (database: {})",
            config.uri, config.database
        );

        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections)
            .build()
            .map_err(|e| MemoryError::ConfigError(e.to_string()))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| MemoryError::ConnectionError(e.to_string()))?;

        info!("Successfully connected to Neo4j");

        Ok(Self {
            graph,
            fulltext_index: config.fulltext_index.clone(),
        })
    }

    /// Underlying driver handle for custom queries
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl StructuralStore for Neo4jGraphStore {
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<StructuralHit>> {
        let cypher = query(FULLTEXT_SEARCH)
            .param("index", self.fulltext_index.clone())
            .param("query", text.to_string())
            .param("limit", limit as i64);

        let mut result = self
            .graph
            .execute(cypher)
            .await
            .map_err(|e| MemoryError::QueryError(format!("Full-text search failed: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| MemoryError::QueryError(format!("Failed to read search row: {}", e)))?
        {
            let id: String = row
                .get("id")
                .map_err(|e| MemoryError::QueryError(format!("Failed to extract node id: {}", e)))?;
            let name: String = row.get("name").unwrap_or_default();
            let labels: Vec<String> = row.get("labels").unwrap_or_default();
            let score: f64 = row
                .get("score")
                .map_err(|e| MemoryError::QueryError(format!("Failed to extract score: {}", e)))?;

            hits.push(StructuralHit {
                node: GraphNode {
                    id,
                    labels,
                    properties: serde_json::json!({ "name": name }),
                },
                similarity: score,
            });
        }

        debug!("Full-text search for {:?} returned {} nodes", text, hits.len());
        Ok(hits)
    }

    async fn warm(&self, pattern: &str) -> Result<()> {
        debug!("Keeping graph connection warm for {}", pattern);
        self.ping().await
    }

    async fn ping(&self) -> Result<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| MemoryError::ConnectionError(e.to_string()))
    }
}

fn validate_uri(uri: &str) -> Result<()> {
    let scheme = uri
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| MemoryError::ConfigError(format!("URI without scheme: {}", uri)))?;

    if SUPPORTED_SCHEMES.contains(&scheme) {
        Ok(())
    } else {
        Err(MemoryError::ConfigError(format!(
            "Unsupported URI scheme {:?} (expected one of {})",
            scheme,
            SUPPORTED_SCHEMES.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uri() {
        assert!(validate_uri("bolt://localhost:7687").is_ok());
        assert!(validate_uri("neo4j+s://db.example.com").is_ok());
        assert!(validate_uri("http://localhost:7474").is_err());
        assert!(validate_uri("localhost:7687").is_err());
    }
}
