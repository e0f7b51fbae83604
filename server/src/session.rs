//! The session actor: sole owner of the registry and the per-client state
//! machine.
//!
//! Events are drained one at a time in arrival order. Each one is handled to
//! completion, including any fan-out writes, before the next is taken, so no
//! locking is needed and the final registry state is a deterministic function
//! of the event sequence.

use crate::admin;
use crate::client_manager::{ClientManager, ClientSession, SessionPhase};
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::event::{Event, EventReceiver};
use log::{debug, error, info, warn};
use shared::{chat_line, is_valid_message, server_line, server_prompt, AsSensitive};
use std::ops::ControlFlow;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a strike was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    RateLimit,
    InvalidMessage,
}

pub struct SessionActor {
    clients: ClientManager,
    token: String,
    config: ServerConfig,
}

impl SessionActor {
    pub fn new(token: impl Into<String>, config: ServerConfig) -> Self {
        Self {
            clients: ClientManager::new(),
            token: token.into(),
            config,
        }
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Drains the bus until `/shutdown` or until every producer is gone, then
    /// raises the shutdown signal.
    pub async fn run(mut self, mut events: EventReceiver, shutdown: watch::Sender<bool>) {
        info!("Session actor started");

        while let Some(event) = events.recv().await {
            if self.handle_event(event).await.is_break() {
                break;
            }
        }

        let _ = shutdown.send(true);
        info!("Session actor stopped");
    }

    /// Applies one event to the registry.
    pub async fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        let pruned = self
            .clients
            .prune_expired_bans(Instant::now(), self.config.ban_limit);
        if pruned > 0 {
            debug!("Dropped {} expired ban(s)", pruned);
        }

        match event {
            Event::ClientConnected(connection) => self.handle_connected(connection).await,
            Event::ClientDisconnected(addr) => self.handle_disconnected(&addr),
            Event::NewMessage { addr, data } => self.handle_message(&addr, &data).await,
            Event::AdminCommand { name, args } => {
                let report =
                    admin::execute(&mut self.clients, &self.config, &name, &args, Instant::now())
                        .await;
                for line in &report.lines {
                    println!("{}", line);
                }
                if report.shutdown {
                    return ControlFlow::Break(());
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_connected(&mut self, mut connection: Connection) {
        let now = Instant::now();
        let addr = connection.addr().to_string();

        if let Some(remaining) = self
            .clients
            .ban_remaining(&addr, now, self.config.ban_limit)
        {
            let secs = remaining.as_secs_f64().round();
            warn!("{} blocked (banned for {:.0}s more)", addr.sensitive(), secs);

            let notice = server_line(&format!("You are banned: {:.0} secs left", secs));
            if let Err(e) = connection
                .send(notice.as_bytes(), self.config.write_timeout)
                .await
            {
                debug!("Could not send ban notice to {}: {}", addr.sensitive(), e.sensitive());
            }
            // Reconnecting while banned restarts the ban window.
            self.clients.ban(&addr, now);
            connection.close().await;
            return;
        }

        self.clients.unban(&addr);

        let mut session = ClientSession::new(connection);
        let prompt = server_prompt("Enter auth token: ");
        if let Err(e) = session
            .send(prompt.as_bytes(), self.config.write_timeout)
            .await
        {
            error!("Could not send token prompt to {}: {}", addr.sensitive(), e.sensitive());
        }

        if let Some(stale) = self.clients.add_client(session) {
            warn!("Replaced stale session for {}", addr.sensitive());
            stale.close().await;
        }
    }

    fn handle_disconnected(&mut self, addr: &str) {
        if self.clients.remove_client(addr).is_some() {
            info!("Client {} disconnected", addr.sensitive());
        }
    }

    async fn handle_message(&mut self, addr: &str, data: &[u8]) {
        let now = Instant::now();

        let Some(session) = self.clients.get_mut(addr) else {
            debug!("Dropping message from unknown client {}", addr.sensitive());
            return;
        };

        if session.is_rate_limited(now, self.config.message_rate) {
            self.record_strike(addr, now, Violation::RateLimit).await;
            return;
        }

        let text = String::from_utf8_lossy(data);
        if !is_valid_message(data, &text) {
            self.record_strike(addr, now, Violation::InvalidMessage).await;
            return;
        }

        session.last_message_at = Some(now);

        match session.phase() {
            SessionPhase::AwaitingToken => self.authenticate(addr, &text).await,
            SessionPhase::AwaitingUsername => self.assign_username(addr, &text).await,
            SessionPhase::Chatting => self.broadcast_chat(addr, &text).await,
        }
    }

    /// Single-shot: a wrong token disconnects immediately, without a strike.
    async fn authenticate(&mut self, addr: &str, text: &str) {
        if text.trim_end() == self.token {
            let Some(session) = self.clients.get_mut(addr) else {
                return;
            };
            session.authenticated = true;
            info!("{} authenticated", addr.sensitive());

            let prompt = server_prompt("Token accepted! Enter your username: ");
            if let Err(e) = session
                .send(prompt.as_bytes(), self.config.write_timeout)
                .await
            {
                error!("Could not send username prompt to {}: {}", addr.sensitive(), e.sensitive());
            }
            return;
        }

        info!("{} failed authentication", addr.sensitive());
        if let Some(mut session) = self.clients.remove_client(addr) {
            let notice = server_line("Invalid token!");
            if let Err(e) = session
                .send(notice.as_bytes(), self.config.write_timeout)
                .await
            {
                debug!("Could not notify {} about invalid token: {}", addr.sensitive(), e.sensitive());
            }
            session.close().await;
        }
    }

    async fn assign_username(&mut self, addr: &str, text: &str) {
        let username = text.trim();
        let length = username.chars().count();

        let rejection = if length == 0 || length > self.config.max_username_length {
            Some(format!(
                "Username must be between 1 and {} characters. Try again: ",
                self.config.max_username_length
            ))
        } else if self.clients.is_username_taken(username) {
            Some("Username already taken. Try again: ".to_string())
        } else {
            None
        };

        let Some(session) = self.clients.get_mut(addr) else {
            return;
        };

        if let Some(rejection) = rejection {
            let prompt = server_prompt(&rejection);
            if let Err(e) = session
                .send(prompt.as_bytes(), self.config.write_timeout)
                .await
            {
                error!("Could not re-prompt {}: {}", addr.sensitive(), e.sensitive());
            }
            return;
        }

        session.username = Some(username.to_string());
        info!("{} is now '{}'", addr.sensitive(), username);

        let welcome = server_line(&format!("Welcome to the club, {}!", username));
        if let Err(e) = session
            .send(welcome.as_bytes(), self.config.write_timeout)
            .await
        {
            error!("Could not welcome {}: {}", addr.sensitive(), e.sensitive());
        }

        let joined = server_line(&format!("{} joined the chat", username));
        self.fan_out(addr, joined.as_bytes()).await;
    }

    async fn broadcast_chat(&mut self, addr: &str, text: &str) {
        let Some(username) = self
            .clients
            .get(addr)
            .and_then(|session| session.username.clone())
        else {
            return;
        };

        info!("[{}] {} sent {} bytes", username, addr.sensitive(), text.len());
        debug!("[{}] {:?}", username, text);

        let message = chat_line(&username, text);
        self.fan_out(addr, message.as_bytes()).await;
    }

    /// Best-effort delivery to every named session except `sender`.
    async fn fan_out(&mut self, sender: &str, data: &[u8]) {
        for addr in self.clients.named_addrs_except(sender) {
            let Some(recipient) = self.clients.get_mut(&addr) else {
                continue;
            };
            if let Err(e) = recipient.send(data, self.config.write_timeout).await {
                error!("Could not deliver to {}: {}", addr.sensitive(), e.sensitive());
            }
        }
    }

    async fn record_strike(&mut self, addr: &str, now: Instant, violation: Violation) {
        let Some(session) = self.clients.get_mut(addr) else {
            return;
        };

        session.strike_count += 1;
        debug!(
            "Strike {} for {} ({:?})",
            session.strike_count,
            addr.sensitive(),
            violation
        );

        if session.strike_count >= self.config.strike_limit {
            self.ban_client(addr, now).await;
        }
    }

    async fn ban_client(&mut self, addr: &str, now: Instant) {
        info!("Client {} got banned", addr.sensitive());
        self.clients.ban(addr, now);

        if let Some(mut session) = self.clients.remove_client(addr) {
            let notice = server_line("You are banned for repeated violations");
            if let Err(e) = session
                .send(notice.as_bytes(), self.config.write_timeout)
                .await
            {
                error!("Could not send ban notice to {}: {}", addr.sensitive(), e.sensitive());
            }
            session.close().await;
        }
    }
}
