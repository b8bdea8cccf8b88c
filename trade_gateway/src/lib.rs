pub mod protocol;
pub mod server;
pub mod websocket;

use std::sync::{MutexGuard, PoisonError};

use matching_engine::MatchingEngine;
use tokio::sync::broadcast;
use tracing::error;

pub use protocol::SharedEngine;

/// Every adapter serializes into the engine through this one lock; the
/// critical sections are short and never held across an await.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, MatchingEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fans a server message out to every connected client. Having no
/// subscribers is not an error.
pub fn publish(events: &broadcast::Sender<String>, message: &protocol::ServerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            let _ = events.send(json);
        }
        Err(err) => error!(error = %err, "failed to serialize broadcast message"),
    }
}
