use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serenity::http::Http;
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ctfdesk_core::config::LoggingConfig;
use ctfdesk_core::{
    create_event_system, load_config, validate_config, ChatPlatform, CooldownStore, CtfdClient,
    FirstBloodDetector, JsonNotifiedStore, PlatformSink, PollScheduler, SqliteTicketStore,
    TicketController, TicketStore,
};

use ctfdesk_bot::api::create_router;
use ctfdesk_bot::discord::{start_discord_bot, SerenityPlatform};
use ctfdesk_bot::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the ticket event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// How long to wait for queued log notices on shutdown
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Config file from `CTFDESK_CONFIG`, else `config.toml` when present.
fn config_path() -> Option<PathBuf> {
    match std::env::var("CTFDESK_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let default = PathBuf::from("config.toml");
            default.exists().then_some(default)
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let default_filter = if logging.debug {
        "debug,serenity=info,hyper=info,rustls=info,h2=info"
    } else {
        "info,serenity=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    let config_path = config_path();
    let loaded = load_config(config_path.as_deref());

    // Logging settings come from the config, so initialize it even if loading failed
    init_logging(
        &loaded
            .as_ref()
            .map(|c| c.logging.clone())
            .unwrap_or_default(),
    );

    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No config file, using environment variables"),
    }
    let config = loaded.context("Failed to load configuration")?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config.tickets).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "ctfdesk v{} starting (guild {}, ticket config {})",
        VERSION,
        config.discord.guild_id,
        &config_hash[..16]
    );
    info!("Database path: {:?}", config.database.path);

    // REST client shared by the ticket platform; the gateway client has its own
    let http = Arc::new(Http::new(&config.discord.token));
    let bot_user = http
        .get_current_user()
        .await
        .context("Failed to authenticate with Discord")?;
    info!("Authenticated as {} ({})", bot_user.name, bot_user.id);

    let platform: Arc<dyn ChatPlatform> = Arc::new(SerenityPlatform::new(
        Arc::clone(&http),
        config.discord.guild_id,
        bot_user.id.get(),
    ));

    // Create SQLite ticket store
    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    // Create event system and spawn the log channel relay
    let (event_handle, event_relay) = create_event_system(
        Arc::clone(&platform),
        config.tickets.log_channel_id,
        EVENT_BUFFER_SIZE,
    );
    let relay_handle = tokio::spawn(event_relay.run());

    let cooldown = Arc::new(CooldownStore::new(Duration::from_secs(
        config.tickets.cooldown_secs,
    )));
    let controller = Arc::new(TicketController::new(
        config.tickets.clone(),
        ticket_store,
        Arc::clone(&platform),
        cooldown,
        event_handle.clone(),
    ));

    // Create the First Blood monitor if CTFd is configured
    let scheduler = match config.ctfd.as_ref().filter(|c| c.is_configured()) {
        Some(ctfd_config) => match CtfdClient::new(ctfd_config) {
            Ok(client) => {
                info!("Initializing First Blood monitor for {}", client.base_url());
                let detector = FirstBloodDetector::new(
                    Arc::new(client),
                    Arc::new(PlatformSink::new(Arc::clone(&platform))),
                    Arc::new(JsonNotifiedStore::new(&ctfd_config.state_file)),
                    ctfd_config.alert_channel_id,
                );
                Some(Arc::new(PollScheduler::new(
                    Arc::new(detector),
                    Duration::from_secs(ctfd_config.poll_interval_secs),
                )))
            }
            Err(e) => {
                error!("First Blood monitor disabled: {}", e);
                None
            }
        },
        None => {
            info!("CTFd not configured, First Blood monitor disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        controller,
        scheduler.clone(),
    ));

    // Optional status endpoint
    let (http_shutdown_tx, http_shutdown_rx) = oneshot::channel::<()>();
    let http_server = if config.http.enabled {
        let addr = SocketAddr::new(config.http.host, config.http.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Status endpoint listening on {}", addr);

        let app = create_router(Arc::clone(&state));
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = http_shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Status endpoint error: {}", e);
            }
        }))
    } else {
        None
    };

    let mut client = start_discord_bot(&config.discord.token, Arc::clone(&state))
        .await
        .context("Failed to start Discord bot")?;
    let shard_manager = Arc::clone(&client.shard_manager);

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!("Discord client stopped: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutting down...");
    shard_manager.shutdown_all().await;

    if let Some(scheduler) = &scheduler {
        if scheduler.is_running() {
            scheduler.stop();
        }
    }

    let _ = http_shutdown_tx.send(());
    if let Some(server) = http_server {
        let _ = server.await;
    }

    // Drop every EventHandle holder so the relay drains and exits
    drop(client);
    drop(state);
    drop(event_handle);

    match tokio::time::timeout(RELAY_DRAIN_TIMEOUT, relay_handle).await {
        Ok(_) => info!("Event relay stopped"),
        Err(_) => warn!("Event relay did not drain in time"),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
