//! Weighted fusion of contextual and structural results

use crate::error::{MemoryError, Result};
use crate::search::types::{FusedItem, FusedResult, ResultItem};
use serde::{Deserialize, Serialize};

/// Default cap on fused results
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Per-source weights applied to raw scores
///
/// `FusionWeights::default()` is the one place the default emphasis is
/// defined; configuration overrides go through this type as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub contextual: f64,
    pub structural: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            contextual: 0.6,
            structural: 0.4,
        }
    }
}

impl FusionWeights {
    pub fn new(contextual: f64, structural: f64) -> Result<Self> {
        let weights = Self {
            contextual,
            structural,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("contextual", self.contextual), ("structural", self.structural)] {
            if !value.is_finite() || value < 0.0 {
                return Err(MemoryError::ConfigError(format!(
                    "{} weight must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for result fusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    /// Cap on fused results, also the per-back-end fetch limit
    pub max_results: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl FusionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, contextual: f64, structural: f64) -> Self {
        self.weights = FusionWeights {
            contextual,
            structural,
        };
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if self.max_results == 0 {
            return Err(MemoryError::ConfigError(
                "max_results must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merge two ranked lists into one.
///
/// Every item is scored `raw_score * weight` for its source; items are not
/// deduplicated across sources. The output is sorted by combined score
/// descending, ties going to contextual items and then to input order, and
/// truncated to `cap`. A score that is not finite, from the raw score or from
/// the weight, ranks as 0.0.
pub fn merge_and_rank(
    contextual: &[ResultItem],
    structural: &[ResultItem],
    weights: FusionWeights,
    cap: usize,
) -> FusedResult {
    let scored = contextual
        .iter()
        .map(|item| (item, weights.contextual))
        .chain(structural.iter().map(|item| (item, weights.structural)))
        .enumerate()
        .map(|(position, (item, weight))| (position, finite_or_zero(item.raw_score * weight), item));

    let mut ranked: Vec<(usize, f64, &ResultItem)> = scored.collect();
    ranked.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| a.2.source.priority().cmp(&b.2.source.priority()))
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(cap);

    FusedResult {
        items: ranked
            .into_iter()
            .map(|(_, combined_score, item)| FusedItem {
                item: item.clone(),
                combined_score,
                source: item.source,
                relevance: item.source.relevance(),
            })
            .collect(),
    }
}

fn finite_or_zero(score: f64) -> f64 {
    // also folds -0.0 into 0.0 so total_cmp ties them
    if score.is_finite() && score != 0.0 {
        score
    } else {
        0.0
    }
}
