//! Configuration for kstore
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, StoreError};

/// Hard upper bound on the number of groups a registry can hold
pub const MAX_GROUPS: usize = 4;

/// Main configuration for a kstore registry
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Registry Configuration
    // -------------------------------------------------------------------------
    /// Number of groups that can be allocated (1..=MAX_GROUPS)
    pub max_groups: usize,

    // -------------------------------------------------------------------------
    // Entry Configuration
    // -------------------------------------------------------------------------
    /// Largest payload accepted by a single put (in bytes); unlimited by default
    pub max_entry_len: usize,

    // -------------------------------------------------------------------------
    // Reclamation Configuration
    // -------------------------------------------------------------------------
    /// Hand retired snapshots to the global collector on every write
    /// instead of letting them accumulate in the writer's local bag
    pub eager_reclaim: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_groups: MAX_GROUPS,
            max_entry_len: usize::MAX,
            eager_reclaim: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config before a registry is built from it
    pub fn validate(&self) -> Result<()> {
        if self.max_groups == 0 || self.max_groups > MAX_GROUPS {
            return Err(StoreError::Config(format!(
                "max_groups must be between 1 and {}, got {}",
                MAX_GROUPS, self.max_groups
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of allocatable groups
    pub fn max_groups(mut self, count: usize) -> Self {
        self.config.max_groups = count;
        self
    }

    /// Set the largest accepted payload (in bytes)
    pub fn max_entry_len(mut self, len: usize) -> Self {
        self.config.max_entry_len = len;
        self
    }

    /// Flush retired snapshots to the global collector on every write
    pub fn eager_reclaim(mut self, eager: bool) -> Self {
        self.config.eager_reclaim = eager;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
