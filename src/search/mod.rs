//! Hybrid search over contextual and structural memory

pub mod backends;
pub mod fusion;
pub mod hybrid;
pub mod types;

pub use backends::{ContextualStore, StructuralStore};
pub use fusion::{merge_and_rank, FusionConfig, FusionWeights, DEFAULT_MAX_RESULTS};
pub use hybrid::{HybridMemory, SEARCH_KEY_PREFIX, USER_SEGMENT_PREFIX};
pub use types::{
    ContextualHit, FusedItem, FusedResult, GraphNode, MemoryRecord, MemorySource, NewMemory, Query,
    Relevance, ResultItem, StructuralHit,
};
