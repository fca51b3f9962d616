//! Configuration file parsing (HOCON format).

use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use hocon::HoconLoader;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = load_config_str(r#"discord { token = "abc" }"#).unwrap();
        assert_eq!(config.discord.prefix, "!");
        assert!(config.discord.admins.is_empty());
        assert_eq!(config.storage.data_dir, std::path::PathBuf::from("./storage"));
        assert_eq!(config.research.sweep_interval_secs, 300);
        assert_eq!(config.research.event_expiry_minutes, 30);
    }

    #[test]
    fn test_full_config() {
        let config = load_config_str(
            r#"
            discord {
                token = "abc"
                prefix = "?"
                owner_id = 1234
                admins = [5678, 91011]
            }
            storage { data_dir = "/var/lib/willow" }
            research {
                sweep_interval_secs = 60
                event_expiry_minutes = 45
            }
            "#,
        )
        .unwrap();
        assert_eq!(config.discord.prefix, "?");
        assert_eq!(config.discord.owner_id, Some(1234));
        assert_eq!(config.discord.admins, vec![5678, 91011]);
        assert_eq!(config.research.sweep_interval_secs, 60);
        assert_eq!(config.research.event_expiry_minutes, 45);
    }

    #[test]
    fn test_missing_token_is_a_parse_error() {
        assert!(matches!(
            load_config_str("discord { prefix = \"!\" }"),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/willow.conf"),
            Err(ConfigError::IoError { .. })
        ));
    }
}
