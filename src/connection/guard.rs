// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::connection::ConnectionKey;
use crate::core::network::ClientEvents;
use tracing::debug;

/// Removes a connection from the registry when the connection task's scope is exited,
/// however it exits.
///
/// Only created after the connection was successfully registered. Removal is keyed on
/// the session id too, so an entry that a newer transport registered under the same
/// address survives.
pub struct ConnectionGuard {
    events: ClientEvents,
    key: ConnectionKey,
    session_id: u64,
}

impl ConnectionGuard {
    pub(crate) fn new(events: ClientEvents, key: ConnectionKey, session_id: u64) -> Self {
        Self {
            events,
            key,
            session_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(
            "ConnectionGuard dropping, cleaning up resources for session {} ({})",
            self.session_id, self.key
        );
        // Already gone if the session ended on a malformed frame.
        self.events.on_disconnect(&self.key, self.session_id);
    }
}
