//! HTTP front end for batch media conversion.
//!
//! Exposes the conversion API, result downloads, progress over WebSocket,
//! and Prometheus metrics.

pub mod api;
pub mod metrics;
pub mod state;
pub mod store;

pub use api::{create_router, WsBroadcaster};
pub use state::AppState;
pub use store::{BatchStore, StoredBatch};
