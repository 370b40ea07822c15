//! Runtime configuration.

use serde::Deserialize;

use crate::error::RuntimeError;
use crate::mailbox;

/// Tunables shared by actors built from one configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Ring capacity of each actor mailbox; overflow beyond it is unbounded.
    pub mailbox_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: mailbox::DEFAULT_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, RuntimeError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| RuntimeError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.mailbox_capacity == 0 {
            return Err(RuntimeError::config("mailbox_capacity must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.mailbox_capacity, 64);
        config.validate().unwrap();
    }

    #[test]
    fn from_toml() {
        let config = RuntimeConfig::from_toml_str("mailbox_capacity = 16").unwrap();
        assert_eq!(config.mailbox_capacity, 16);
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(RuntimeConfig::from_toml_str("mailbox_capacity = 0").is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(RuntimeConfig::from_toml_str("mailbox_size = 10").is_err());
    }
}
