//! Shard configuration
//!
//! A [`MultiQueueConfig`] is validated once, before any shard is allocated, and
//! is read-only for the lifetime of the queue built from it.

use crate::{Error, Result};

/// Caller groups assumed by the default configuration
pub const DEFAULT_CALLER_GROUPS: usize = 4;
/// Shards dedicated to each caller group by default
pub const DEFAULT_SHARDS_PER_CALLER: usize = 2;
/// Home shards an affinity dequeue tries before falling back to random
pub const DEFAULT_HOME_PROBES: usize = 2;

/// Which built-in selector decides the shard an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SelectionPolicy {
    /// Bias each caller toward a fixed subset of shards
    #[default]
    Affinity,
    /// Draw every candidate uniformly from all shards
    Uniform,
}

/// Construction parameters for a [`MultiQueue`](crate::MultiQueue)
///
/// # Examples
///
/// ```rust
/// use stripeq::{MultiQueueConfig, SelectionPolicy};
///
/// let config = MultiQueueConfig::new(16)
///     .shards_per_caller(4)
///     .home_probes(3)
///     .policy(SelectionPolicy::Affinity);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.caller_groups(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MultiQueueConfig {
    /// Number of independently locked sub-queues
    pub shard_count: usize,
    /// Shards dedicated to each caller group under affinity selection
    pub shards_per_caller: usize,
    /// Home shards tried by an affinity dequeue, clamped to `shards_per_caller`
    pub home_probes: usize,
    /// Built-in selection policy
    pub policy: SelectionPolicy,
    /// Record operation metrics from the start
    pub metrics: bool,
}

impl Default for MultiQueueConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_CALLER_GROUPS * DEFAULT_SHARDS_PER_CALLER,
            shards_per_caller: DEFAULT_SHARDS_PER_CALLER,
            home_probes: DEFAULT_HOME_PROBES,
            policy: SelectionPolicy::Affinity,
            metrics: true,
        }
    }
}

impl MultiQueueConfig {
    /// Default configuration with `shard_count` shards and one shard per caller
    pub fn new(shard_count: usize) -> Self {
        Self {
            shard_count,
            shards_per_caller: 1,
            ..Self::default()
        }
    }

    /// Set the number of shards dedicated to each caller group
    pub fn shards_per_caller(mut self, shards_per_caller: usize) -> Self {
        self.shards_per_caller = shards_per_caller;
        self
    }

    /// Set how many home shards an affinity dequeue tries first
    pub fn home_probes(mut self, home_probes: usize) -> Self {
        self.home_probes = home_probes;
        self
    }

    /// Pick the built-in selection policy
    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable metrics recording
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Number of caller groups the shard space is partitioned into
    pub fn caller_groups(&self) -> usize {
        (self.shard_count / self.shards_per_caller.max(1)).max(1)
    }

    /// Home probes after clamping to the shards a caller group owns
    pub fn effective_home_probes(&self) -> usize {
        self.home_probes.min(self.shards_per_caller)
    }

    /// Check the configuration without allocating anything
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(Error::Config("shard_count must be at least 1".into()));
        }
        if self.shards_per_caller == 0 {
            return Err(Error::Config("shards_per_caller must be at least 1".into()));
        }
        if self.policy == SelectionPolicy::Affinity && self.shard_count % self.shards_per_caller != 0 {
            return Err(Error::Config(format!(
                "shards_per_caller ({}) must divide shard_count ({}) under affinity selection",
                self.shards_per_caller, self.shard_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_four_groups_of_two() {
        let config = MultiQueueConfig::default();
        assert_eq!(config.shard_count, 8);
        assert_eq!(config.shards_per_caller, 2);
        assert_eq!(config.caller_groups(), 4);
        assert_eq!(config.effective_home_probes(), 2);
        assert_eq!(config.policy, SelectionPolicy::Affinity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_shards_rejected() {
        let err = MultiQueueConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_shards_per_caller_rejected() {
        let err = MultiQueueConfig::new(4).shards_per_caller(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_affinity_requires_even_partition() {
        let config = MultiQueueConfig::new(6).shards_per_caller(4);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        // Uniform selection ignores the partition hint.
        let config = config.policy(SelectionPolicy::Uniform);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_home_probes_clamped() {
        let config = MultiQueueConfig::new(8).shards_per_caller(2).home_probes(5);
        assert_eq!(config.effective_home_probes(), 2);

        let config = MultiQueueConfig::new(8).shards_per_caller(4).home_probes(3);
        assert_eq!(config.effective_home_probes(), 3);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_config_fills_defaults() {
        let config: MultiQueueConfig =
            serde_json::from_str(r#"{"shard_count": 12, "policy": "uniform"}"#).unwrap();
        assert_eq!(config.shard_count, 12);
        assert_eq!(config.policy, SelectionPolicy::Uniform);
        assert_eq!(config.shards_per_caller, DEFAULT_SHARDS_PER_CALLER);
        assert!(config.metrics);
    }
}
