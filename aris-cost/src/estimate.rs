//! ABOUTME: Pre-hop cost estimation for `cost estimate` and per-hop authorization
//! ABOUTME: Complexity-scored query -> (estimated_searches, estimated_tokens, estimated_cost, confidence)

use aris_config::{ArisConfig, Depth};
use serde::{Deserialize, Serialize};

const DOMAIN_KEYWORDS: &[&str] = &[
    "compare", "analyze", "architecture", "versus", "tradeoffs", "survey", "benchmark",
    "implementation", "comprehensive", "history",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostEstimate {
    pub complexity: f64,
    pub estimated_searches: u32,
    pub estimated_tokens: u64,
    pub estimated_cost: f64,
    pub confidence: f64,
}

/// Complexity score in [0,1] from query length, entity count (capitalized
/// tokens), modifier count (comparatives/conjunctions), and domain-keyword
/// density.
#[must_use]
pub fn complexity_score(query: &str) -> f64 {
    let words: Vec<&str> = query.split_whitespace().collect();
    let word_count = words.len().max(1);

    let length_component = (word_count as f64 / 20.0).min(1.0);

    let entity_count = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .count();
    let entity_component = (entity_count as f64 / 5.0).min(1.0);

    let modifier_count = words
        .iter()
        .filter(|w| {
            matches!(
                w.to_ascii_lowercase().trim_matches(|c: char| !c.is_alphanumeric()),
                "and" | "or" | "versus" | "vs" | "compared" | "between" | "across"
            )
        })
        .count();
    let modifier_component = (modifier_count as f64 / 3.0).min(1.0);

    let lower = query.to_ascii_lowercase();
    let keyword_hits = DOMAIN_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    let keyword_component = (keyword_hits as f64 / 3.0).min(1.0);

    let score =
        0.30 * length_component + 0.25 * entity_component + 0.20 * modifier_component + 0.25 * keyword_component;
    score.clamp(0.0, 1.0)
}

/// `base(depth) × multiplier(complexity)` for searches and tokens, plus
/// `Σ units × unit_cost` for the dollar figure, and a confidence band
/// (0.85 simple / 0.75 default / 0.65 complex).
#[must_use]
pub fn estimate(config: &ArisConfig, query: &str, depth: Depth) -> CostEstimate {
    let complexity = complexity_score(query);
    let base_searches = depth.max_hops();
    let multiplier = 1.0 + complexity * 1.5;

    let estimated_searches = ((base_searches as f64) * multiplier).ceil() as u32;
    let estimated_tokens = ((base_searches as u64) * 1500 * multiplier as u64).max(base_searches as u64 * 500);

    let search_cost = config.unit_cost("search") / 1000.0 * estimated_searches as f64 * 1000.0;
    let reasoning_cost = config.unit_cost("reasoning") / 1000.0 * estimated_tokens as f64;
    let estimated_cost = search_cost + reasoning_cost;

    let confidence = if complexity < 0.3 {
        0.85
    } else if complexity < 0.7 {
        0.75
    } else {
        0.65
    };

    CostEstimate {
        complexity,
        estimated_searches,
        estimated_tokens,
        estimated_cost,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_query_yields_high_confidence() {
        let config = ArisConfig::default();
        let estimate = estimate(&config, "what is rust", Depth::Quick);
        assert!((estimate.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn complex_query_yields_lower_confidence_and_more_searches() {
        let config = ArisConfig::default();
        let simple = estimate(&config, "what is rust", Depth::Standard);
        let complex = estimate(
            &config,
            "Compare and analyze architecture tradeoffs between Kubernetes and Nomad across multi-region benchmarks",
            Depth::Standard,
        );
        assert!(complex.complexity > simple.complexity);
        assert!(complex.estimated_searches >= simple.estimated_searches);
        assert!(complex.confidence <= simple.confidence);
    }

    #[test]
    fn deeper_depth_estimates_more_cost() {
        let config = ArisConfig::default();
        let quick = estimate(&config, "what is semantic search", Depth::Quick);
        let deep = estimate(&config, "what is semantic search", Depth::Deep);
        assert!(deep.estimated_cost >= quick.estimated_cost);
    }
}
