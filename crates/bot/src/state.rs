use std::sync::Arc;

use ctfdesk_core::{Config, InteractionSessions, PollScheduler, SanitizedConfig, TicketController};

/// Shared application state
pub struct AppState {
    config: Config,
    controller: Arc<TicketController>,
    sessions: InteractionSessions,
    scheduler: Option<Arc<PollScheduler>>,
}

impl AppState {
    pub fn new(
        config: Config,
        controller: Arc<TicketController>,
        scheduler: Option<Arc<PollScheduler>>,
    ) -> Self {
        Self {
            config,
            controller,
            sessions: InteractionSessions::new(),
            scheduler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn guild_id(&self) -> u64 {
        self.config.discord.guild_id
    }

    pub fn controller(&self) -> &Arc<TicketController> {
        &self.controller
    }

    pub fn sessions(&self) -> &InteractionSessions {
        &self.sessions
    }

    /// The First Blood scheduler, when CTFd is configured.
    pub fn scheduler(&self) -> Option<&Arc<PollScheduler>> {
        self.scheduler.as_ref()
    }
}
