pub mod handlers;
pub mod monitor;
pub mod routes;

pub use routes::create_router;
