//! TCP listener and task wiring for the chat relay.

use crate::config::ServerConfig;
use crate::connection::spawn_connection;
use crate::error::ServerError;
use crate::event::{event_bus, EventReceiver, EventSender};
use crate::session::SessionActor;
use log::{error, info};
use shared::AsSensitive;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) can't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bound listener plus the event bus and shutdown signal shared by every
/// task it spawns.
pub struct Server {
    listener: TcpListener,
    token: String,
    config: ServerConfig,
    events_tx: EventSender,
    events_rx: EventReceiver,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Binds `addr`. Bind failures are fatal and reported as such.
    pub async fn bind(
        addr: &str,
        token: impl Into<String>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr.to_string()))?;

        let listener = TcpListener::bind(socket_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Listening on {}", addr.sensitive());

        let (events_tx, events_rx) = event_bus();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Server {
            listener,
            token: token.into(),
            config,
            events_tx,
            events_rx,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// A producer handle for the bus, e.g. for the operator console.
    pub fn events(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Flips to `true` once the actor has stopped.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Runs the session actor and the accept loop until shutdown.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            token,
            config,
            events_tx,
            events_rx,
            shutdown_tx,
            mut shutdown_rx,
        } = self;

        let actor = SessionActor::new(token, config);
        let actor_handle = tokio::spawn(actor.run(events_rx, shutdown_tx));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            spawn_connection(
                                stream,
                                addr.to_string(),
                                events_tx.clone(),
                                shutdown_rx.clone(),
                            );
                        }
                        Err(e) => accept_failed(&e).await,
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Listener stopping");
                    break;
                }
            }
        }

        if let Err(e) = actor_handle.await {
            error!("Session actor task failed: {}", e);
        }

        Ok(())
    }
}

async fn accept_failed(e: &io::Error) {
    error!("Failed to accept connection: {}", e.sensitive());
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
