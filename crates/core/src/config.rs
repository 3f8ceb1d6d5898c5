//! Store-wide configuration.
//!
//! `MercuryConfig` governs the knobs every subsystem crate reads at open
//! time: the atom size ceiling, WAL checkpoint thresholds, the page cache's
//! capacity per index, and the pool's disk budget, grouped under one
//! builder rather than threading a dozen constructor arguments through
//! `QuadStore::open`.

use crate::limits::{
    DEFAULT_MAX_ATOM_SIZE, DEFAULT_POOL_DISK_BUDGET_FRACTION, DEFAULT_POOL_GATE_TIMEOUT_SECS,
    WAL_CHECKPOINT_INTERVAL_SECS, WAL_CHECKPOINT_SIZE_BYTES,
};
use std::time::Duration;

/// Top-level configuration for a `QuadStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct MercuryConfig {
    /// Maximum size, in bytes, of a single interned atom.
    pub max_atom_size: usize,
    /// Number of pages each `QuadIndex`'s page cache may hold.
    pub page_cache_capacity: usize,
    /// WAL checkpoint policy.
    pub checkpoint: CheckpointPolicy,
    /// Pool sizing and gating, used only by `mercury-pool`.
    pub pool: PoolPolicy,
}

impl Default for MercuryConfig {
    fn default() -> Self {
        MercuryConfig {
            max_atom_size: DEFAULT_MAX_ATOM_SIZE,
            page_cache_capacity: 4096,
            checkpoint: CheckpointPolicy::default(),
            pool: PoolPolicy::default(),
        }
    }
}

impl MercuryConfig {
    /// A configuration tuned for unit/integration tests: small checkpoint
    /// thresholds so tests can exercise checkpoint/truncation behavior
    /// without writing megabytes of fixture data.
    pub fn for_testing() -> Self {
        MercuryConfig {
            checkpoint: CheckpointPolicy {
                size_threshold_bytes: 64 * 1024,
                interval: Duration::from_secs(5),
            },
            page_cache_capacity: 64,
            ..Default::default()
        }
    }

    /// Set the maximum atom size.
    pub fn with_max_atom_size(mut self, max: usize) -> Self {
        self.max_atom_size = max;
        self
    }

    /// Set the page cache capacity, per index.
    pub fn with_page_cache_capacity(mut self, capacity: usize) -> Self {
        self.page_cache_capacity = capacity;
        self
    }

    /// Set the checkpoint policy.
    pub fn with_checkpoint(mut self, policy: CheckpointPolicy) -> Self {
        self.checkpoint = policy;
        self
    }

    /// Set the pool policy.
    pub fn with_pool(mut self, policy: PoolPolicy) -> Self {
        self.pool = policy;
        self
    }
}

/// Governs when `WriteAheadLog::should_checkpoint` returns true.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointPolicy {
    /// Checkpoint once the log has grown past this many bytes since the
    /// last checkpoint.
    pub size_threshold_bytes: u64,
    /// Checkpoint once this much time has elapsed since the last
    /// checkpoint.
    pub interval: Duration,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        CheckpointPolicy {
            size_threshold_bytes: WAL_CHECKPOINT_SIZE_BYTES,
            interval: Duration::from_secs(WAL_CHECKPOINT_INTERVAL_SECS),
        }
    }
}

/// Governs `QuadStorePool` sizing and the optional cross-process gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolPolicy {
    /// Fraction (0.0–1.0) of free disk space on the temp volume a pool may
    /// claim across all of its rented stores.
    pub disk_budget_fraction: f64,
    /// Whether the machine-wide cross-process slot counter is enabled.
    pub cross_process_gate: bool,
    /// Timeout for acquiring a cross-process gate slot.
    pub gate_timeout: Duration,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        PoolPolicy {
            disk_budget_fraction: DEFAULT_POOL_DISK_BUDGET_FRACTION,
            cross_process_gate: false,
            gate_timeout: Duration::from_secs(DEFAULT_POOL_GATE_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = MercuryConfig::default();
        assert_eq!(config.max_atom_size, 1024 * 1024);
        assert_eq!(config.checkpoint.size_threshold_bytes, 16 * 1024 * 1024);
        assert_eq!(config.checkpoint.interval, Duration::from_secs(60));
        assert!((config.pool.disk_budget_fraction - 0.33).abs() < 1e-9);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = MercuryConfig::default()
            .with_max_atom_size(4096)
            .with_page_cache_capacity(16);
        assert_eq!(config.max_atom_size, 4096);
        assert_eq!(config.page_cache_capacity, 16);
    }

    #[test]
    fn for_testing_shrinks_checkpoint_thresholds() {
        let config = MercuryConfig::for_testing();
        assert!(config.checkpoint.size_threshold_bytes < WAL_CHECKPOINT_SIZE_BYTES);
    }
}
