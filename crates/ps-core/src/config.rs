//! Role configuration

use serde::{Deserialize, Serialize};

use crate::{Error, PlacementMode, Result};

/// Environment variable selecting the placement mode code
pub const ENV_SERVER_WORKER_MODE: &str = "PS_SERVER_WORKER_MODE";

/// Environment variable holding the processes launched per node
pub const ENV_PROC_PER_NODE: &str = "PS_PROC_PER_NODE";

/// Environment variable overriding the advertised address
pub const ENV_ADVERTISE_ADDRESS: &str = "PS_ADVERTISE_ADDRESS";

/// Construction parameters of an instance coordinator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleConfig {
    /// Placement mode, serialized as its integer code
    pub server_worker_mode: PlacementMode,

    /// Processes launched on each node
    pub processes_per_node: usize,

    /// Address to advertise instead of the resolved local one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_address: Option<String>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            server_worker_mode: PlacementMode::Contiguous,
            processes_per_node: 1,
            advertise_address: None,
        }
    }
}

impl RoleConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RoleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RoleConfig::default();

        if let Some(mode) = lookup(ENV_SERVER_WORKER_MODE) {
            let code: u8 = mode.trim().parse().map_err(|_| Error::InvalidConfig {
                message: format!("{} must be a mode code, got {:?}", ENV_SERVER_WORKER_MODE, mode),
            })?;
            config.server_worker_mode = PlacementMode::from(code);
        }

        if let Some(ppn) = lookup(ENV_PROC_PER_NODE) {
            config.processes_per_node = ppn.trim().parse().map_err(|_| Error::InvalidConfig {
                message: format!("{} must be an integer, got {:?}", ENV_PROC_PER_NODE, ppn),
            })?;
        }

        config.advertise_address = lookup(ENV_ADVERTISE_ADDRESS).filter(|a| !a.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Check local preconditions
    ///
    /// Divisibility against the world size is only known once the group
    /// service has reported it, and is checked by the topology.
    pub fn validate(&self) -> Result<()> {
        if self.processes_per_node == 0 {
            return Err(Error::InvalidConfig {
                message: "processes_per_node must be positive".to_string(),
            });
        }
        if matches!(&self.advertise_address, Some(a) if a.is_empty()) {
            return Err(Error::InvalidConfig {
                message: "advertise_address must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
