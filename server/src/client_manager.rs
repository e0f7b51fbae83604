//! Session registry: the client table and the ban table.
//!
//! Both tables are plain `HashMap`s with no interior locking. The registry is
//! owned by the session actor and mutated only from its event loop, which is
//! what keeps every operation here race-free.

use crate::connection::Connection;
use log::info;
use shared::AsSensitive;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tokio::time::Instant;

/// Where a session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingToken,
    AwaitingUsername,
    Chatting,
}

/// Server-side state of one live connection.
#[derive(Debug)]
pub struct ClientSession {
    connection: Connection,
    /// Whether the shared token has been accepted
    pub authenticated: bool,
    /// Unset until the username step succeeds
    pub username: Option<String>,
    /// Time of the last accepted message; `None` means never, so the first
    /// message is never rate limited
    pub last_message_at: Option<Instant>,
    /// Accumulated rate and validation violations. Never decays.
    pub strike_count: u32,
}

impl ClientSession {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            authenticated: false,
            username: None,
            last_message_at: None,
            strike_count: 0,
        }
    }

    pub fn addr(&self) -> &str {
        self.connection.addr()
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.authenticated, &self.username) {
            (false, _) => SessionPhase::AwaitingToken,
            (true, None) => SessionPhase::AwaitingUsername,
            (true, Some(_)) => SessionPhase::Chatting,
        }
    }

    /// Authenticated and holding a username.
    pub fn is_named(&self) -> bool {
        self.phase() == SessionPhase::Chatting
    }

    /// True if a message at `now` comes sooner than `rate` after the last accepted one.
    pub fn is_rate_limited(&self, now: Instant, rate: Duration) -> bool {
        match self.last_message_at {
            Some(last) => now.saturating_duration_since(last) < rate,
            None => false,
        }
    }

    pub async fn send(&mut self, data: &[u8], limit: Duration) -> io::Result<()> {
        self.connection.send(data, limit).await
    }

    pub async fn close(self) {
        self.connection.close().await
    }
}

/// Connected clients keyed by address, plus banned addresses.
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: HashMap<String, ClientSession>,
    banned: HashMap<String, Instant>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, returning any session previously held under the
    /// same address.
    pub fn add_client(&mut self, session: ClientSession) -> Option<ClientSession> {
        let addr = session.addr().to_string();
        info!("Client {} connected", addr.sensitive());
        self.clients.insert(addr, session)
    }

    /// Removes a session. Unknown addresses are a no-op.
    pub fn remove_client(&mut self, addr: &str) -> Option<ClientSession> {
        let removed = self.clients.remove(addr);
        if removed.is_some() {
            info!("Client {} removed", addr.sensitive());
        }
        removed
    }

    pub fn get(&self, addr: &str) -> Option<&ClientSession> {
        self.clients.get(addr)
    }

    pub fn get_mut(&mut self, addr: &str) -> Option<&mut ClientSession> {
        self.clients.get_mut(addr)
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.clients.contains_key(addr)
    }

    /// Address of the session holding `username`, case-sensitive.
    pub fn find_by_username(&self, username: &str) -> Option<String> {
        self.clients
            .iter()
            .find(|(_, client)| client.username.as_deref() == Some(username))
            .map(|(addr, _)| addr.clone())
    }

    /// Whether an authenticated session already holds `username`.
    pub fn is_username_taken(&self, username: &str) -> bool {
        self.clients
            .values()
            .any(|client| client.authenticated && client.username.as_deref() == Some(username))
    }

    /// Addresses of authenticated sessions, named or not.
    pub fn authenticated_addrs(&self) -> Vec<String> {
        self.clients
            .iter()
            .filter(|(_, client)| client.authenticated)
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// Chat recipients: authenticated, named sessions other than `exclude`.
    pub fn named_addrs_except(&self, exclude: &str) -> Vec<String> {
        self.clients
            .iter()
            .filter(|(addr, client)| addr.as_str() != exclude && client.is_named())
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// `(username, address)` for every named session, sorted by username.
    pub fn named_users(&self) -> Vec<(String, String)> {
        let mut users: Vec<(String, String)> = self
            .clients
            .iter()
            .filter(|(_, client)| client.authenticated)
            .filter_map(|(addr, client)| {
                client
                    .username
                    .as_ref()
                    .map(|name| (name.clone(), addr.clone()))
            })
            .collect();
        users.sort();
        users
    }

    /// Empties the client table, handing back every session.
    pub fn drain_clients(&mut self) -> Vec<ClientSession> {
        self.clients.drain().map(|(_, client)| client).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Adds or refreshes a ban.
    pub fn ban(&mut self, addr: &str, at: Instant) {
        self.banned.insert(addr.to_string(), at);
    }

    pub fn unban(&mut self, addr: &str) -> Option<Instant> {
        self.banned.remove(addr)
    }

    pub fn banned_at(&self, addr: &str) -> Option<Instant> {
        self.banned.get(addr).copied()
    }

    /// Time left on an active ban.
    pub fn ban_remaining(&self, addr: &str, now: Instant, limit: Duration) -> Option<Duration> {
        let banned_at = self.banned.get(addr)?;
        let elapsed = now.saturating_duration_since(*banned_at);
        if elapsed < limit {
            Some(limit - elapsed)
        } else {
            None
        }
    }

    /// Drops every ban older than `limit`, returning how many were removed.
    pub fn prune_expired_bans(&mut self, now: Instant, limit: Duration) -> usize {
        let before = self.banned.len();
        self.banned
            .retain(|_, banned_at| now.saturating_duration_since(*banned_at) < limit);
        before - self.banned.len()
    }

    pub fn banned_count(&self) -> usize {
        self.banned.len()
    }
}
