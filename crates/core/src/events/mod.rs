//! Ticket lifecycle events and the log-channel relay.

mod handle;
mod relay;
mod types;

pub use handle::*;
pub use relay::*;
pub use types::*;
