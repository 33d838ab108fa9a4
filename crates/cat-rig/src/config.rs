//! Connection configuration

use std::time::Duration;

use cat_protocol::civ::CONTROLLER_ADDR;
use cat_protocol::EchoMode;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};

/// Per-connection settings
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use cat_rig::RigConfig;
///
/// let config = RigConfig::from_json(r#"{ "timeout_ms": 800, "echo": "On" }"#).unwrap();
/// assert_eq!(config.timeout_ms, 800);
/// assert_eq!(config.cache_ttl_ms, 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Time allowed for one command, echo and reply included
    pub timeout_ms: u64,
    /// Lifetime of cached values
    pub cache_ttl_ms: u64,
    /// Pin echo on or off instead of using the model's profile
    pub echo: Option<EchoMode>,
    /// CI-V address of the radio, when changed from the model default
    pub civ_address: Option<u8>,
    /// Our CI-V address
    pub controller_address: u8,
    /// Depth of the command queue between handles and the connection task
    pub channel_depth: usize,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            cache_ttl_ms: 250,
            echo: None,
            civ_address: None,
            controller_address: CONTROLLER_ADDR,
            channel_depth: 32,
        }
    }
}

impl RigConfig {
    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RigError::InvalidParameter(format!("config: {}", e)))
    }

    /// Command timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
