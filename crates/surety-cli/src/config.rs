//! Protocol configuration loading

use crate::error::{CliError, CliResult};
use std::path::Path;
use surety_core::SuretyConfig;

/// Load protocol constants from a TOML file.
///
/// No path, or a path that does not exist, yields the deployed defaults.
/// Fields missing from the file keep their default values.
pub fn load_config(path: Option<&Path>) -> CliResult<SuretyConfig> {
    let config = match path {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))?
        }
        _ => SuretyConfig::default(),
    };

    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}

/// Render the effective configuration as TOML
pub fn render_config(config: &SuretyConfig) -> CliResult<String> {
    toml::to_string_pretty(config).map_err(|e| CliError::Config(e.to_string()))
}
