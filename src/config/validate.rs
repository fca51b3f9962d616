//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Longest allowed event overlay lifetime: one day.
pub const MAX_EVENT_EXPIRY_MINUTES: i64 = 24 * 60;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    if config.discord.prefix.trim().is_empty() {
        errors.push("discord.prefix must not be empty".to_string());
    }
    if config.discord.owner_id == Some(0) {
        errors.push("discord.owner_id must be non-zero".to_string());
    }
    for (i, admin) in config.discord.admins.iter().enumerate() {
        if *admin == 0 {
            errors.push(format!("discord.admins[{}] must be non-zero", i));
        }
    }

    if config.storage.data_dir.as_os_str().is_empty() {
        errors.push("storage.data_dir is required".to_string());
    }

    if config.research.sweep_interval_secs == 0 {
        errors.push("research.sweep_interval_secs must be non-zero".to_string());
    }
    let expiry = config.research.event_expiry_minutes;
    if expiry <= 0 {
        errors.push(format!(
            "research.event_expiry_minutes must be positive (got {})",
            expiry
        ));
    } else if expiry > MAX_EVENT_EXPIRY_MINUTES {
        errors.push(format!(
            "research.event_expiry_minutes must be at most {} (got {})",
            MAX_EVENT_EXPIRY_MINUTES, expiry
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "valid_token_here".to_string(),
                prefix: "!".to_string(),
                owner_id: Some(123456789),
                admins: vec![987654321],
            },
            storage: StorageConfig::default(),
            research: ResearchConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("discord.token"));
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_all_problems_are_reported() {
        let mut config = make_valid_config();
        config.discord.prefix = " ".to_string();
        config.research.sweep_interval_secs = 0;
        config.research.event_expiry_minutes = -5;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("discord.prefix"));
        assert!(message.contains("sweep_interval_secs"));
        assert!(message.contains("got -5"));
    }

    #[test]
    fn test_event_expiry_bounds() {
        let mut config = make_valid_config();
        config.research.event_expiry_minutes = MAX_EVENT_EXPIRY_MINUTES;
        assert!(validate_config(&config).is_ok());

        config.research.event_expiry_minutes = i64::MAX;
        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("must be at most 1440"));
    }

    #[test]
    fn test_zero_admin_fails() {
        let mut config = make_valid_config();
        config.discord.admins.push(0);

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("discord.admins[1]"));
    }
}
