use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Discord token and guild id are present (startup is impossible without them)
/// - Ticket prefix is a usable channel name fragment
/// - Ticket types are non-empty with unique names
/// - CTFd poll interval and timeout are not 0
/// - HTTP port is not 0 when the endpoint is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.discord.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discord.token is required (set DISCORD_TOKEN)".to_string(),
        ));
    }

    if config.discord.guild_id == 0 {
        return Err(ConfigError::ValidationError(
            "discord.guild_id is required (set GUILD_ID)".to_string(),
        ));
    }

    let prefix = &config.tickets.prefix;
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::ValidationError(
            "tickets.prefix must be non-empty and contain no whitespace".to_string(),
        ));
    }

    if config.tickets.types.is_empty() {
        return Err(ConfigError::ValidationError(
            "tickets.types must contain at least one ticket type".to_string(),
        ));
    }

    // Select menus cap at 25 options
    if config.tickets.types.len() > 25 {
        return Err(ConfigError::ValidationError(
            "tickets.types cannot contain more than 25 entries".to_string(),
        ));
    }

    for (i, ticket_type) in config.tickets.types.iter().enumerate() {
        if config.tickets.types[..i]
            .iter()
            .any(|other| other.name == ticket_type.name)
        {
            return Err(ConfigError::ValidationError(format!(
                "duplicate ticket type '{}'",
                ticket_type.name
            )));
        }
    }

    if let Some(ctfd) = &config.ctfd {
        if ctfd.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ctfd.poll_interval_secs cannot be 0".to_string(),
            ));
        }
        if ctfd.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ctfd.timeout_secs cannot be 0".to_string(),
            ));
        }
    }

    if config.http.enabled && config.http.port == 0 {
        return Err(ConfigError::ValidationError(
            "http.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[discord]
token = "token"
guild_id = 1
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_token_fails() {
        let mut config = valid_config();
        config.discord.token = String::new();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn test_validate_missing_guild_fails() {
        let mut config = valid_config();
        config.discord.guild_id = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_ticket_types_fails() {
        let mut config = valid_config();
        let first = config.tickets.types[0].clone();
        config.tickets.types.push(first);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = valid_config();
        config.ctfd = Some(
            toml::from_str(
                r#"
url = "https://ctf.example.org"
api_token = "x"
poll_interval_secs = 0
"#,
            )
            .unwrap(),
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_port_zero_only_when_enabled() {
        let mut config = valid_config();
        config.http.port = 0;
        assert!(validate_config(&config).is_ok());
        config.http.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
