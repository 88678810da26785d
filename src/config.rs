//! Engine configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Batching knobs for relationship dataloaders, loaded from environment
/// variables with sensible defaults.
///
/// The 100-row page-size cap is intentionally *not* configurable; it is a
/// hard limit applied when building a request context.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a dataloader waits to accumulate keys before dispatching a
    /// batch, in milliseconds.
    pub dataloader_delay_ms: u64,

    /// Maximum number of keys dispatched in a single repository read.
    pub max_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dataloader_delay_ms: 1,
            max_batch_size: 1000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let dataloader_delay_ms = match env::var("REGISTRAR_DATALOADER_DELAY_MS") {
            Ok(value) => value
                .parse()
                .context("REGISTRAR_DATALOADER_DELAY_MS must be an integer")?,
            Err(_) => defaults.dataloader_delay_ms,
        };

        let max_batch_size = match env::var("REGISTRAR_MAX_BATCH_SIZE") {
            Ok(value) => value
                .parse()
                .context("REGISTRAR_MAX_BATCH_SIZE must be an integer")?,
            Err(_) => defaults.max_batch_size,
        };

        Ok(Self {
            dataloader_delay_ms,
            max_batch_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dataloader_delay_ms, 1);
        assert_eq!(config.max_batch_size, 1000);
    }
}
