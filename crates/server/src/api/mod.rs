pub mod convert;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod ws;

pub use routes::{create_router, API_PREFIX};
pub use ws::{WsBroadcaster, WsMessage};
