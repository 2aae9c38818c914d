//! Home Assistant discovery settings.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default MQTT discovery prefix of Home Assistant.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HomeAssistantConfig {
    /// First topic level of discovery and state topics.
    #[validate(custom(function = "validate_discovery_prefix"))]
    pub discovery_prefix: String,
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }
}

fn validate_discovery_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.is_empty() || prefix.contains(['+', '#']) || prefix.ends_with('/') {
        let mut err = ValidationError::new("invalid_discovery_prefix");
        err.message = Some(format!("Invalid discovery prefix: '{prefix}'").into());
        return Err(err);
    }
    Ok(())
}
