//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `WILLOW_DISCORD_TOKEN` - Discord bot token
//! - `WILLOW_DISCORD_PREFIX` - Command prefix
//! - `WILLOW_OWNER_ID` - Bot owner user ID
//! - `WILLOW_DATA_DIR` - Storage directory

use std::env;
use std::path::PathBuf;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "WILLOW";

/// Apply environment variable overrides to a config.
///
/// This allows the token to be provided via the environment instead of the
/// config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }
    if let Ok(prefix) = env::var(format!("{}_DISCORD_PREFIX", ENV_PREFIX)) {
        config.discord.prefix = prefix;
    }
    if let Ok(owner) = env::var(format!("{}_OWNER_ID", ENV_PREFIX)) {
        if let Ok(id) = owner.parse() {
            config.discord.owner_id = Some(id);
        }
    }
    if let Ok(dir) = env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
        config.storage.data_dir = PathBuf::from(dir);
    }

    config
}

/// Check if any required environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_DISCORD_TOKEN", ENV_PREFIX),
        format!("{}_DATA_DIR", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `WILLOW_CONFIG` environment variable, otherwise returns "willow.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "willow.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "file_token".to_string(),
                prefix: "!".to_string(),
                owner_id: None,
                admins: Vec::new(),
            },
            storage: StorageConfig::default(),
            research: ResearchConfig::default(),
        }
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "WILLOW");
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("WILLOW_CONFIG");
        assert_eq!(get_config_path(), "willow.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("WILLOW_DISCORD_TOKEN");
        env::remove_var("WILLOW_DATA_DIR");

        let result = apply_env_overrides(make_test_config());

        assert_eq!(result.discord.token, "file_token");
        assert_eq!(result.storage.data_dir, PathBuf::from("./storage"));
    }

    #[test]
    fn test_owner_id_override() {
        env::set_var("WILLOW_OWNER_ID", "4242");
        let result = apply_env_overrides(make_test_config());
        env::remove_var("WILLOW_OWNER_ID");

        assert_eq!(result.discord.owner_id, Some(4242));
    }
}
