//! Run configuration: every tunable the original model exposed, plus the
//! seed that makes a run reproducible.

use serde::Deserialize;
use thiserror::Error;

/// All knobs for one simulation run. Every field has a default matching
/// the original model's baseline scenario, so a config file only needs to
/// override what it actually changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Total peers in the network, including the two adversaries `S01`
    /// and `S02`.
    pub number_of_peers: u32,
    /// Fraction of peers randomly tagged as running on a slow network
    /// link.
    pub z0: f64,
    /// Hash-power share held by adversary `S01`.
    pub z1: f64,
    /// Hash-power share held by adversary `S02`.
    pub z2: f64,

    pub min_neighbors: usize,
    pub max_neighbors: usize,
    pub mean_network_delay_millis: f64,

    pub avg_txn_interval_time: f64,
    pub number_of_transactions: u64,
    pub initial_coins: f64,
    pub avg_block_mining_time: f64,
    pub max_num_blocks: u64,

    pub random_seed: u64,

    /// Whether [`crate::run`] writes `results.json`/`summary.json`/
    /// `config.txt` at all, or just returns after the run finishes —
    /// useful for a batch of throwaway parameter sweeps.
    pub save_results: bool,
    /// Names this run for its output subdirectory
    /// (`output/{test_case_name}/` when the binary picks its own
    /// directory; ignored when a caller supplies an explicit path).
    pub test_case_name: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        let max_num_blocks = 150;
        Self {
            number_of_peers: 50,
            z0: 0.5,
            z1: 0.2,
            z2: 0.2,
            min_neighbors: 4,
            max_neighbors: 6,
            mean_network_delay_millis: 50.0,
            avg_txn_interval_time: 100.0,
            number_of_transactions: max_num_blocks * 5,
            initial_coins: 1000.0,
            avg_block_mining_time: 10_000.0,
            max_num_blocks,
            random_seed: 0,
            save_results: true,
            test_case_name: "z1_10_z2_0".to_string(),
        }
    }
}

/// Failures caught at startup, before a single event is scheduled.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("number_of_peers must be at least 3 (two adversaries plus one honest peer), got {0}")]
    TooFewPeers(u32),
    #[error("{field} must not be negative, got {value}")]
    NegativeShare { field: &'static str, value: f64 },
    #[error("z1 + z2 must not exceed 1.0 (honest peers would get negative hash-power), got {0}")]
    AdversaryShareExceedsOne(f64),
    #[error("min_neighbors ({min}) must not exceed max_neighbors ({max})")]
    NeighborRangeInverted { min: usize, max: usize },
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Exactly two adversaries, `S01` and `S02`, always present.
    pub fn adversary_count(&self) -> u32 {
        2
    }

    /// Rejects negative hash-power shares and peer counts too small to
    /// hold both adversaries plus at least one honest peer, per the
    /// `ConfigurationError` startup check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_peers < 3 {
            return Err(ConfigError::TooFewPeers(self.number_of_peers));
        }
        for (field, value) in [("z0", self.z0), ("z1", self.z1), ("z2", self.z2)] {
            if value < 0.0 {
                return Err(ConfigError::NegativeShare { field, value });
            }
        }
        if self.z1 + self.z2 > 1.0 {
            return Err(ConfigError::AdversaryShareExceedsOne(self.z1 + self.z2));
        }
        if self.min_neighbors > self.max_neighbors {
            return Err(ConfigError::NeighborRangeInverted {
                min: self.min_neighbors,
                max: self.max_neighbors,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_baseline_scenario() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.number_of_peers, 50);
        assert_eq!(cfg.number_of_transactions, 750);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg = SimConfig::from_toml_str("z0 = 0.3\nz1 = 0.1\n").unwrap();
        assert_eq!(cfg.z0, 0.3);
        assert_eq!(cfg.z1, 0.1);
        assert_eq!(cfg.number_of_peers, 50);
    }

    #[test]
    fn rejects_too_few_peers() {
        let cfg = SimConfig {
            number_of_peers: 2,
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::TooFewPeers(2))));
    }

    #[test]
    fn rejects_negative_hash_power() {
        let cfg = SimConfig {
            z1: -0.1,
            ..SimConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NegativeShare { field: "z1", .. })
        ));
    }

    #[test]
    fn rejects_adversary_shares_summing_past_one() {
        let cfg = SimConfig {
            z1: 0.7,
            z2: 0.6,
            ..SimConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::AdversaryShareExceedsOne(_))
        ));
    }
}
