//! Configuration for caskdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Main configuration for a caskdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single append-only data file
    pub path: PathBuf,

    /// Unix permission bits used when the data file is created
    pub permissions: u32,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the data file
    pub sync_strategy: SyncStrategy,
}

/// Data file sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append or tombstone rewrite (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced writes (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./caskdb.log"),
            permissions: 0o600,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(CaskError::Config(
                "sync_strategy EveryNEntries needs a count of at least 1".to_string(),
            ));
        }
        if self.permissions > 0o7777 {
            return Err(CaskError::Config(format!(
                "permissions {:o} are not valid mode bits",
                self.permissions
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
    /// Set the data file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the permission bits for a newly created data file
    pub fn permissions(mut self, mode: u32) -> Self {
        self.config.permissions = mode;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
