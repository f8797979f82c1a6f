// src/core/registry.rs

//! The directory of live client connections, shared by the network loop and the bus loop.
//!
//! All state sits behind one mutex. Lookups that are followed by a mutation must happen
//! inside a single [`Registry::with`] call so a disconnect cannot slip in between them.

use super::connection::{Connection, ConnectionKey, ConnectionState};
use super::errors::GatewayError;
use super::metrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The connections themselves, only reachable while the registry lock is held.
#[derive(Debug, Default)]
pub struct Connections {
    by_address: HashMap<ConnectionKey, Connection>,
    /// Secondary index: session id -> primary key.
    by_session: HashMap<u64, ConnectionKey>,
}

impl Connections {
    /// Inserts a connection. An address that is already present is rejected: the new
    /// transport is terminated and the existing entry is left untouched.
    pub fn add(&mut self, connection: Connection) -> Result<(), GatewayError> {
        let key = connection.address().clone();
        if self.by_address.contains_key(&key) {
            warn!("Connection already present for {}, closing this one.", key);
            connection.terminate();
            metrics::REJECTED_CONNECTIONS_TOTAL.inc();
            return Err(GatewayError::AddressInUse(key.to_string()));
        }
        self.by_session.insert(connection.session_id(), key.clone());
        self.by_address.insert(key, connection);
        metrics::CONNECTED_CLIENTS.set(self.by_address.len() as f64);
        Ok(())
    }

    /// Removes the connection at `address`, if any.
    pub fn remove(&mut self, address: &ConnectionKey) -> Option<Connection> {
        let removed = self.by_address.remove(address)?;
        self.by_session.remove(&removed.session_id());
        metrics::CONNECTED_CLIENTS.set(self.by_address.len() as f64);
        debug!(
            "Removed session {} ({}), {} connections remaining.",
            removed.session_id(),
            address,
            self.by_address.len()
        );
        Some(removed)
    }

    pub fn find_by_address(&self, address: &ConnectionKey) -> Option<&Connection> {
        self.by_address.get(address)
    }

    pub fn find_by_address_mut(&mut self, address: &ConnectionKey) -> Option<&mut Connection> {
        self.by_address.get_mut(address)
    }

    pub fn find_by_session_id(&self, session_id: u64) -> Option<&Connection> {
        let key = self.by_session.get(&session_id)?;
        self.by_address.get(key)
    }

    /// Resolves a session id to its primary key.
    pub fn key_of_session(&self, session_id: u64) -> Option<&ConnectionKey> {
        self.by_session.get(&session_id)
    }

    pub fn find_by_username(&self, username: &str, require_logged_in: bool) -> Option<&Connection> {
        self.by_address.values().find(|c| {
            c.username == username && (!require_logged_in || c.is_logged_in())
        })
    }

    /// Calls `f` for every connection in the `LoggedIn` state.
    pub fn for_each_logged_in<F>(&self, f: F)
    where
        F: FnMut(&Connection),
    {
        self.by_address
            .values()
            .filter(|c| c.state() == ConnectionState::LoggedIn)
            .for_each(f);
    }

    /// Calls `f` for every logged-in connection whose username is `username`.
    pub fn for_each_logged_in_named<F>(&self, username: &str, mut f: F)
    where
        F: FnMut(&Connection),
    {
        self.for_each_logged_in(|c| {
            if c.username == username {
                f(c)
            }
        });
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    pub fn logged_in_count(&self) -> usize {
        self.by_address.values().filter(|c| c.is_logged_in()).count()
    }
}

/// Shared, mutex-guarded [`Connections`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Connections>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with exclusive access to the connections. `f` must not call back into the
    /// registry and must not block.
    pub fn with<R>(&self, f: impl FnOnce(&mut Connections) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn add(&self, connection: Connection) -> Result<(), GatewayError> {
        self.with(|c| c.add(connection))
    }

    pub fn remove(&self, address: &ConnectionKey) -> Option<Connection> {
        self.with(|c| c.remove(address))
    }

    pub fn find_by_address(&self, address: &ConnectionKey) -> Option<Connection> {
        self.with(|c| c.find_by_address(address).cloned())
    }

    pub fn find_by_session_id(&self, session_id: u64) -> Option<Connection> {
        self.with(|c| c.find_by_session_id(session_id).cloned())
    }

    pub fn find_by_username(&self, username: &str, require_logged_in: bool) -> Option<Connection> {
        self.with(|c| c.find_by_username(username, require_logged_in).cloned())
    }

    pub fn for_each_logged_in<F>(&self, f: F)
    where
        F: FnMut(&Connection),
    {
        self.with(|c| c.for_each_logged_in(f))
    }

    pub fn len(&self) -> usize {
        self.with(|c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|c| c.is_empty())
    }

    pub fn logged_in_count(&self) -> usize {
        self.with(|c| c.logged_in_count())
    }
}
