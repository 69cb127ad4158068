//! Engine configuration
//!
//! Optional YAML file; every field has a default so partial files work:
//!
//! ```yaml
//! validation:
//!   max_complexity: 30
//!   check_division_by_zero: false
//! calculation:
//!   round: 2
//! ```

use crate::core::calculator::CalculateOptions;
use crate::core::validator::ValidationOptions;
use crate::error::{CalcError, CalcResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub validation: ValidationOptions,
    pub calculation: CalculateOptions,
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> CalcResult<Self> {
        // An empty file deserializes as unit, not as an empty map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> CalcResult<()> {
        if self.validation.max_complexity == 0 {
            return Err(CalcError::Config(
                "validation.max_complexity must be greater than 0".to_string(),
            ));
        }
        if matches!(self.calculation.round, Some(places) if places > 15) {
            return Err(CalcError::Config(
                "calculation.round must be between 0 and 15".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a config file, or the defaults when no path is given
pub fn load_config(path: Option<&Path>) -> CalcResult<EngineConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            EngineConfig::from_yaml_str(&content)
        }
        None => Ok(EngineConfig::default()),
    }
}
