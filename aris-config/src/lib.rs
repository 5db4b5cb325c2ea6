//! ABOUTME: TOML + environment configuration loading for ARIS
//! ABOUTME: Loaded once at startup and threaded explicitly through constructors, never read from module-scope statics

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Depth preset → (max_hops, confidence_target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    Standard,
    Deep,
    Exhaustive,
}

impl Depth {
    #[must_use]
    pub fn max_hops(self) -> u32 {
        match self {
            Self::Quick => 1,
            Self::Standard => 3,
            Self::Deep => 5,
            Self::Exhaustive => 8,
        }
    }

    #[must_use]
    pub fn confidence_target(self) -> f64 {
        match self {
            Self::Quick => 0.60,
            Self::Standard => 0.75,
            Self::Deep => 0.85,
            Self::Exhaustive => 0.90,
        }
    }
}

impl std::str::FromStr for Depth {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "deep" => Ok(Self::Deep),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(ConfigError::Invalid {
                message: format!("unknown depth '{other}'"),
            }),
        }
    }
}

/// Deduplication gate thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    pub update_threshold: f64,
    pub merge_threshold: f64,
    /// Added to the merge/create boundary when falling back to lexical
    /// similarity on `EmbeddingUnavailable`, biasing toward CREATE because
    /// the signal is weaker.
    pub lexical_fallback_bias: f64,
    pub neighbors_considered: usize,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            update_threshold: 0.85,
            merge_threshold: 0.70,
            lexical_fallback_bias: 0.05,
            neighbors_considered: 5,
        }
    }
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub window_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_secs: 60,
            cooldown_secs: 30,
        }
    }
}

impl BreakerSettings {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Per-(provider, unit) price. The exact unit-cost table is
/// environment-dependent; `unit_cost` is price per 1000 units (tokens or
/// searches).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitPrice {
    pub unit_cost: f64,
}

/// Budget warning thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetWarnings {
    pub warn_at: f64,
    pub critical_at: f64,
}

impl Default for BudgetWarnings {
    fn default() -> Self {
        Self {
            warn_at: 0.75,
            critical_at: 0.90,
        }
    }
}

/// Top-level ARIS configuration, loaded once and passed explicitly to every
/// component constructor. `ArisConfig::load` is the only entry point;
/// there is no module-scope static to read before it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArisConfig {
    pub data_dir: PathBuf,
    pub gate: GateThresholds,
    pub breaker: BreakerSettings,
    pub budget_warnings: BudgetWarnings,
    pub pricing: HashMap<String, UnitPrice>,
    pub embedding_dim: usize,
    pub default_budget: f64,
    pub per_hop_floor: f64,
    pub call_timeout_secs: u64,
    pub hop_deadline_secs: u64,
    pub resume_grace_period_secs: u64,
}

impl Default for ArisConfig {
    fn default() -> Self {
        let mut pricing = HashMap::new();
        pricing.insert("search".to_string(), UnitPrice { unit_cost: 0.01 });
        pricing.insert("reasoning".to_string(), UnitPrice { unit_cost: 0.015 });
        pricing.insert("embedding".to_string(), UnitPrice { unit_cost: 0.0001 });

        Self {
            data_dir: PathBuf::from("./aris-data"),
            gate: GateThresholds::default(),
            breaker: BreakerSettings::default(),
            budget_warnings: BudgetWarnings::default(),
            pricing,
            embedding_dim: 256,
            default_budget: 1.0,
            per_hop_floor: 0.01,
            call_timeout_secs: 30,
            hop_deadline_secs: 120,
            resume_grace_period_secs: 900,
        }
    }
}

impl ArisConfig {
    /// Loads configuration from an optional TOML file, then applies
    /// `ARIS_`-prefixed environment overrides on top (file then env
    /// precedence).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("ARIS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(budget) = std::env::var("ARIS_DEFAULT_BUDGET") {
            if let Ok(parsed) = budget.parse() {
                self.default_budget = parsed;
            }
        }
        if let Ok(threshold) = std::env::var("ARIS_GATE_UPDATE_THRESHOLD") {
            if let Ok(parsed) = threshold.parse() {
                self.gate.update_threshold = parsed;
            }
        }
        if let Ok(threshold) = std::env::var("ARIS_GATE_MERGE_THRESHOLD") {
            if let Ok(parsed) = threshold.parse() {
                self.gate.merge_threshold = parsed;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.gate.merge_threshold > self.gate.update_threshold {
            return Err(ConfigError::Invalid {
                message: "gate.merge_threshold must be <= gate.update_threshold".to_string(),
            });
        }
        if self.default_budget <= 0.0 {
            return Err(ConfigError::Invalid {
                message: "default_budget must be positive".to_string(),
            });
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::Invalid {
                message: "embedding_dim must be nonzero".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn metadata_db_path(&self) -> PathBuf {
        self.data_dir.join("metadata.db")
    }

    #[must_use]
    pub fn vector_index_path(&self) -> PathBuf {
        self.data_dir.join("vector-index")
    }

    #[must_use]
    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    #[must_use]
    pub fn unit_cost(&self, provider: &str) -> f64 {
        self.pricing
            .get(provider)
            .map(|p| p.unit_cost)
            .unwrap_or(0.0)
    }

    /// Looks up a provider API key under the `ARIS_{NAME}_API_KEY`
    /// environment namespace.
    #[must_use]
    pub fn provider_api_key(provider: &str) -> Option<String> {
        std::env::var(format!("ARIS_{}_API_KEY", provider.to_uppercase())).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = ArisConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn depth_table_has_expected_hop_counts() {
        assert_eq!(Depth::Quick.max_hops(), 1);
        assert!((Depth::Quick.confidence_target() - 0.60).abs() < 1e-9);
        assert_eq!(Depth::Exhaustive.max_hops(), 8);
        assert!((Depth::Exhaustive.confidence_target() - 0.90).abs() < 1e-9);
    }

    #[test]
    fn load_from_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aris.toml");
        std::fs::write(&path, "default_budget = 5.0\ndata_dir = \"/tmp/aris-test\"\n").unwrap();

        let config = ArisConfig::load(Some(&path)).unwrap();
        assert!((config.default_budget - 5.0).abs() < 1e-9);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/aris-test"));
    }

    #[test]
    fn invalid_threshold_ordering_fails_validation() {
        let mut config = ArisConfig::default();
        config.gate.merge_threshold = 0.95;
        config.gate.update_threshold = 0.85;
        assert!(config.validate().is_err());
    }
}
