pub mod api;
pub mod discord;
pub mod metrics;
pub mod state;
