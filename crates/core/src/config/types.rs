use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub tickets: TicketsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ctfd: Option<CtfdConfig>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Discord connection settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DiscordConfig {
    /// Bot token. Usually supplied through `DISCORD_TOKEN`.
    #[serde(default)]
    pub token: String,
    /// The single guild the bot serves.
    #[serde(default)]
    pub guild_id: u64,
}

/// Ticket workflow settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketsConfig {
    /// Category that hosts ticket channels.
    #[serde(default)]
    pub category_id: Option<u64>,
    /// Role allowed to claim and close any ticket.
    #[serde(default)]
    pub support_role_id: Option<u64>,
    #[serde(default)]
    pub admin_role_id: Option<u64>,
    /// Channel receiving created/claimed/closed notices.
    #[serde(default)]
    pub log_channel_id: Option<u64>,
    /// Prefix of every ticket channel name.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_embed_color")]
    pub embed_color: u32,
    /// Minimum time between two tickets from the same user.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// DM the owner a copy of the transcript on close.
    #[serde(default = "default_true")]
    pub transcript_dm: bool,
    #[serde(default = "default_true")]
    pub auto_delete_after_close: bool,
    #[serde(default = "default_delete_delay_secs")]
    pub delete_delay_secs: u64,
    #[serde(default = "default_ticket_types")]
    pub types: Vec<TicketTypeConfig>,
    #[serde(default)]
    pub messages: TicketMessages,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            category_id: None,
            support_role_id: None,
            admin_role_id: None,
            log_channel_id: None,
            prefix: default_prefix(),
            embed_color: default_embed_color(),
            cooldown_secs: default_cooldown_secs(),
            transcript_dm: true,
            auto_delete_after_close: true,
            delete_delay_secs: default_delete_delay_secs(),
            types: default_ticket_types(),
            messages: TicketMessages::default(),
        }
    }
}

impl TicketsConfig {
    /// Find a configured ticket type by name.
    pub fn ticket_type(&self, name: &str) -> Option<&TicketTypeConfig> {
        self.types.iter().find(|t| t.name == name)
    }
}

fn default_prefix() -> String {
    "ticket-".to_string()
}

fn default_embed_color() -> u32 {
    0x58_65_F2
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_delete_delay_secs() -> u64 {
    5
}

fn default_ticket_types() -> Vec<TicketTypeConfig> {
    vec![
        TicketTypeConfig {
            name: "General".to_string(),
            description: "General questions and help".to_string(),
            emoji: "💬".to_string(),
            category: None,
        },
        TicketTypeConfig {
            name: "Technical".to_string(),
            description: "Problems with a challenge or the platform".to_string(),
            emoji: "🛠️".to_string(),
            category: None,
        },
        TicketTypeConfig {
            name: "Report".to_string(),
            description: "Report a user or a rule violation".to_string(),
            emoji: "🚩".to_string(),
            category: None,
        },
    ]
}

/// One entry of the ticket type select menu.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TicketTypeConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_type_emoji")]
    pub emoji: String,
    /// Optional category override for this type.
    #[serde(default)]
    pub category: Option<u64>,
}

fn default_type_emoji() -> String {
    "🎫".to_string()
}

/// Message templates. `{user}` is replaced with the owner mention.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketMessages {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_closed")]
    pub closed: String,
}

impl Default for TicketMessages {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            closed: default_closed(),
        }
    }
}

fn default_welcome() -> String {
    "Hello {user}! A member of the support team will be with you shortly.".to_string()
}

fn default_closed() -> String {
    "This ticket has been closed.".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ctfdesk.db")
}

/// CTFd scoring platform configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CtfdConfig {
    /// CTFd base URL (e.g., "https://ctf.example.org")
    #[serde(default)]
    pub url: String,
    /// Admin access token generated in the CTFd settings page.
    #[serde(default)]
    pub api_token: String,
    /// Authorization scheme placed before the token.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Channel receiving First Blood announcements.
    #[serde(default)]
    pub alert_channel_id: Option<u64>,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Start polling as soon as the bot is ready.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl CtfdConfig {
    /// Whether both URL and token are present.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.api_token.trim().is_empty()
    }

    /// Describe why the token cannot be used, if it obviously cannot.
    pub fn token_problem(&self) -> Option<&'static str> {
        let token = self.api_token.trim();
        if token.is_empty() {
            Some("CTFd API token is empty")
        } else if token.starts_with("http") {
            Some("CTFd API token looks like a URL; check CTFD_URL and CTFD_API_TOKEN")
        } else if token == "YOUR_ACTUAL_CTFD_TOKEN_HERE" {
            Some("CTFd API token is still the placeholder value")
        } else {
            None
        }
    }
}

fn default_auth_scheme() -> String {
    "Token".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_state_file() -> PathBuf {
    PathBuf::from("first_bloods.json")
}

fn default_timeout() -> u64 {
    30
}

/// Status HTTP endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Verbose logging (the `DEBUG` environment flag).
    #[serde(default)]
    pub debug: bool,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub discord: SanitizedDiscordConfig,
    pub tickets: TicketsConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctfd: Option<SanitizedCtfdConfig>,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscordConfig {
    pub token_configured: bool,
    pub guild_id: u64,
}

/// Sanitized CTFd config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCtfdConfig {
    pub url: String,
    pub api_token_configured: bool,
    pub poll_interval_secs: u64,
    pub alert_channel_id: Option<u64>,
    pub state_file: PathBuf,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            discord: SanitizedDiscordConfig {
                token_configured: !config.discord.token.is_empty(),
                guild_id: config.discord.guild_id,
            },
            tickets: config.tickets.clone(),
            database: config.database.clone(),
            ctfd: config.ctfd.as_ref().map(|c| SanitizedCtfdConfig {
                url: c.url.clone(),
                api_token_configured: !c.api_token.is_empty(),
                poll_interval_secs: c.poll_interval_secs,
                alert_channel_id: c.alert_channel_id,
                state_file: c.state_file.clone(),
                timeout_secs: c.timeout_secs,
            }),
            http: config.http.clone(),
            logging: config.logging.clone(),
        }
    }
}
