//! Per-connection context for the session server
//!
//! This module tracks every open transport connection, independent of whether it has
//! joined the game yet:
//! - Connection lifecycle (connect, authenticate, disconnect, timeout)
//! - The protocol phase of each connection (connected, waiting for setup, joined)
//! - One-shot "reload required" notices for ghost connections
//! - Client capacity management and address tracking
//!
//! Handlers receive this context explicitly instead of capturing per-connection state,
//! so a reconnecting browser always starts from a clean record.

use log::info;
use shared::AuthenticationData;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::utils::generate_id;

/// Where a connection stands in the join handshake
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPhase {
    /// Transport is open, no authentication yet
    Connected,
    /// Authenticated while the team bases were still unknown; joins once setup completes
    AwaitingSetup(AuthenticationData),
    /// Has a player in the session
    Joined,
}

/// A connected client and its protocol state
#[derive(Debug)]
pub struct Client {
    /// Opaque connection id, also used as the player id
    pub id: String,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Last time we received any frame from this client
    pub last_seen: Instant,
    pub phase: ClientPhase,
    /// Whether this connection has already been told to reload
    pub reload_notified: bool,
    /// Connection order, used to admit deferred authentications fairly
    pub sequence: u64,
}

impl Client {
    pub fn new(id: String, addr: SocketAddr, sequence: u64) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            phase: ClientPhase::Connected,
            reload_notified: false,
            sequence,
        }
    }

    /// Records activity on the connection
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing was received within the timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    pub fn is_joined(&self) -> bool {
        self.phase == ClientPhase::Joined
    }
}

/// Registry of all open connections
///
/// Owned by the dispatcher, so it is only ever mutated from the single event loop.
pub struct ClientManager {
    /// Connected clients indexed by connection id
    clients: HashMap<String, Client>,
    /// Monotonic counter for connection order
    next_sequence: u64,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_sequence: 1,
            max_clients,
        }
    }

    /// Registers a new connection.
    ///
    /// Returns the connection id, or None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<String> {
        if !self.has_capacity() {
            return None;
        }

        let id = generate_id();
        let client = Client::new(id.clone(), addr, self.next_sequence);
        self.next_sequence += 1;

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id.clone(), client);
        Some(id)
    }

    /// Removes a connection. Unknown ids return None; a connection may be dropped by a
    /// stop or reset before its transport notices.
    pub fn remove_client(&mut self, id: &str) -> Option<Client> {
        let removed = self.clients.remove(id);
        if let Some(client) = &removed {
            info!("Client {} ({}) disconnected", client.id, client.addr);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Refreshes the activity timestamp of a connection
    pub fn touch(&mut self, id: &str) {
        if let Some(client) = self.clients.get_mut(id) {
            client.touch();
        }
    }

    pub fn set_phase(&mut self, id: &str, phase: ClientPhase) {
        if let Some(client) = self.clients.get_mut(id) {
            client.phase = phase;
        }
    }

    pub fn phase(&self, id: &str) -> Option<&ClientPhase> {
        self.clients.get(id).map(|c| &c.phase)
    }

    /// Marks that the reload notice went out. Returns true only the first time.
    pub fn mark_reload_notified(&mut self, id: &str) -> bool {
        match self.clients.get_mut(id) {
            Some(client) if !client.reload_notified => {
                client.reload_notified = true;
                true
            }
            _ => false,
        }
    }

    /// Connections waiting for the setup handshake, oldest first
    pub fn awaiting_setup(&self) -> Vec<(String, AuthenticationData)> {
        let mut waiting: Vec<(u64, String, AuthenticationData)> = self
            .clients
            .values()
            .filter_map(|c| match &c.phase {
                ClientPhase::AwaitingSetup(auth) => Some((c.sequence, c.id.clone(), auth.clone())),
                _ => None,
            })
            .collect();
        waiting.sort_by_key(|(sequence, _, _)| *sequence);
        waiting
            .into_iter()
            .map(|(_, id, auth)| (id, auth))
            .collect()
    }

    /// Ids of connections that have a player in the session
    pub fn joined_ids(&self) -> Vec<String> {
        self.clients
            .values()
            .filter(|c| c.is_joined())
            .map(|c| c.id.clone())
            .collect()
    }

    /// Ids of every open connection
    pub fn ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// Ids of connections silent for longer than `timeout`.
    ///
    /// The caller is responsible for running the disconnect path for each of them.
    pub fn check_timeouts(&self, timeout: Duration) -> Vec<String> {
        self.clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id.clone())
            .collect()
    }

    pub fn has_capacity(&self) -> bool {
        self.clients.len() < self.max_clients
    }

    /// Returns the number of currently open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
    }
}
