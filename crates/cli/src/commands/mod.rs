pub mod config_cmd;
pub mod replay;

use roundtable_config::{ConfigError, RoundtableConfig};
use std::path::Path;

/// Load from an explicit path, or from the default location with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<RoundtableConfig, ConfigError> {
    match path {
        Some(path) => RoundtableConfig::load_from(path),
        None => RoundtableConfig::load(),
    }
}
