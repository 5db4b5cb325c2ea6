//! ABOUTME: Per-provider unit pricing and budget-warning thresholds
//! ABOUTME: ModelPricing/ProviderPricing shape narrowed to a single session's budget instead of a global multi-tenant aggregator

use std::collections::HashMap;

use aris_config::ArisConfig;
use serde::{Deserialize, Serialize};

/// Price per 1000 units (tokens or searches) for one provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub unit_cost: f64,
}

/// Resolves unit pricing from the loaded configuration. Kept as a small
/// owned table rather than reading `ArisConfig` directly from call sites so
/// `CostManager` doesn't need a config reference on every call.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, ModelPricing>,
}

impl PriceTable {
    #[must_use]
    pub fn from_config(config: &ArisConfig) -> Self {
        let prices = config
            .pricing
            .iter()
            .map(|(provider, price)| {
                (
                    provider.clone(),
                    ModelPricing {
                        unit_cost: price.unit_cost,
                    },
                )
            })
            .collect();
        Self { prices }
    }

    #[must_use]
    pub fn unit_cost(&self, provider: &str) -> f64 {
        self.prices.get(provider).map(|p| p.unit_cost).unwrap_or(0.0)
    }

    /// Token-based cost: `units/1000 × unit_cost`.
    #[must_use]
    pub fn cost_for(&self, provider: &str, units: u64) -> f64 {
        (units as f64 / 1000.0) * self.unit_cost(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_token_based_cost() {
        let mut config = ArisConfig::default();
        config
            .pricing
            .insert("search".into(), aris_config::UnitPrice { unit_cost: 10.0 });
        let table = PriceTable::from_config(&config);
        assert!((table.cost_for("search", 2500) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_provider_costs_nothing() {
        let table = PriceTable::from_config(&ArisConfig::default());
        assert_eq!(table.cost_for("unknown-provider", 1000), 0.0);
    }
}
