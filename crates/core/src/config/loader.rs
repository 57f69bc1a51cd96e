use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Plain environment variables accepted for compatibility with existing
/// deployments, and the config key each one maps to.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DISCORD_TOKEN", "discord.token"),
    ("GUILD_ID", "discord.guild_id"),
    ("TICKET_CATEGORY_ID", "tickets.category_id"),
    ("SUPPORT_ROLE_ID", "tickets.support_role_id"),
    ("ADMIN_ROLE_ID", "tickets.admin_role_id"),
    ("LOG_CHANNEL_ID", "tickets.log_channel_id"),
    ("CTFD_URL", "ctfd.url"),
    ("CTFD_API_TOKEN", "ctfd.api_token"),
    ("CTFD_POLL_INTERVAL", "ctfd.poll_interval_secs"),
    ("CTFD_ALERT_CHANNEL_ID", "ctfd.alert_channel_id"),
    ("DEBUG", "logging.debug"),
];

fn legacy_key(name: &str) -> Option<&'static str> {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(env, _)| env.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

/// Load configuration from an optional TOML file, `.env`, and environment variables.
///
/// Precedence, lowest first: file, legacy variables (`DISCORD_TOKEN`, ...),
/// then `CTFDESK_SECTION__KEY` variables.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    // A missing .env is normal in production
    let _ = dotenvy::dotenv();

    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let legacy_names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(env, _)| *env).collect();

    let config: Config = figment
        .merge(
            Env::raw()
                .only(&legacy_names)
                .map(|key| legacy_key(key.as_str()).unwrap_or(key.as_str()).into()),
        )
        .merge(Env::prefixed("CTFDESK_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[discord]
token = "abc"
guild_id = 42

[tickets]
category_id = 100
support_role_id = 200
prefix = "help-"

[[tickets.types]]
name = "Billing"
description = "Payment questions"
emoji = "💳"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.discord.guild_id, 42);
        assert_eq!(config.tickets.prefix, "help-");
        assert_eq!(config.tickets.types.len(), 1);
        assert_eq!(config.tickets.types[0].emoji, "💳");
        assert!(config.ctfd.is_none());
    }

    #[test]
    fn test_load_config_from_str_invalid_type() {
        let toml = r#"
[discord]
guild_id = "not a number"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[discord]
guild_id = 7

[ctfd]
url = "https://ctf.example.org"
poll_interval_secs = 15

[http]
enabled = true
port = 3000
"#
        )
        .unwrap();

        let config = load_config(Some(temp_file.path())).unwrap();
        assert_eq!(config.http.port, 3000);
        assert!(config.http.enabled);
        let ctfd = config.ctfd.unwrap();
        assert_eq!(ctfd.url, "https://ctf.example.org");
        assert_eq!(ctfd.auth_scheme, "Token");
    }

    #[test]
    fn test_prefixed_env_overrides_legacy_and_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[discord]
token = "from-file"
guild_id = 7
"#,
            )?;
            jail.set_env("DISCORD_TOKEN", "from-legacy");
            jail.set_env("GUILD_ID", "8");
            jail.set_env("CTFDESK_DISCORD__TOKEN", "from-prefixed");

            let config =
                load_config(Some(Path::new("config.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.discord.token, "from-prefixed");
            assert_eq!(config.discord.guild_id, 8);
            Ok(())
        });
    }

    #[test]
    fn test_legacy_key_mapping() {
        assert_eq!(legacy_key("DISCORD_TOKEN"), Some("discord.token"));
        assert_eq!(legacy_key("ctfd_poll_interval"), Some("ctfd.poll_interval_secs"));
        assert_eq!(legacy_key("HOME"), None);
    }
}
