//! Loading configuration from YAML

use std::fs;
use std::path::Path;

use super::schema::{QdqConfig, QuantSpec};
use super::validate::validate_config;
use crate::error::{Error, Result};

impl QuantSpec {
    /// Parse and validate a quantizer configuration
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: QuantSpec = serde_yaml::from_str(yaml)
            .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;
        spec.validate()?;
        Ok(spec)
    }
}

impl QdqConfig {
    /// Parse and validate a layer configuration
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: QdqConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;
        validate_config(&config)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Load and validate a layer configuration file
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<QdqConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    QdqConfig::from_yaml(&yaml_content)
}
