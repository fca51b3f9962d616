//! Configuration parsing and types.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

pub use parser::load_config;
pub use types::*;

use tracing::warn;

use crate::common::error::ConfigError;

/// Load the config file, apply environment overrides and validate the result.
pub fn load_and_validate() -> Result<Config, ConfigError> {
    for var in env::check_empty_env_vars() {
        warn!("Environment variable {} is set but empty", var);
    }

    let config = env::apply_env_overrides(load_config(env::get_config_path())?);
    validate::validate_config(&config)?;
    Ok(config)
}
