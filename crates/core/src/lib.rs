pub mod config;
pub mod ctfd;
pub mod events;
pub mod first_blood;
pub mod metrics;
pub mod platform;
pub mod testing;
pub mod ticket;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, CtfdConfig,
    SanitizedConfig, TicketsConfig,
};
pub use ctfd::{CtfdClient, CtfdError, ScoringApi};
pub use events::{create_event_system, EventHandle, EventRelay, TicketEvent};
pub use first_blood::{
    AnnouncementSink, FirstBloodDetector, JsonNotifiedStore, MonitorError, PlatformSink,
    PollScheduler, SchedulerStatus,
};
pub use platform::{Actor, ChatPlatform, PlatformError};
pub use ticket::{
    CooldownStore, InteractionSessions, SqliteTicketStore, TicketController, TicketError,
    TicketFlowError, TicketStore,
};
