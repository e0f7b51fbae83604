//! # Chat Relay Server Library
//!
//! This library implements a line-oriented TCP chat relay. Clients connect,
//! present a shared access token, pick a username, and from then on every
//! message they send is relayed to all other named clients.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Session Actor
//! All shared mutable state (connected sessions and banned addresses) lives in
//! one [`session::SessionActor`]. Every other task talks to it exclusively
//! through an unbounded event bus, and the actor handles one event at a time.
//! This eliminates locking on the registry and makes the outcome of any event
//! sequence deterministic.
//!
//! ### One Reader Task per Connection
//! Each accepted socket is split. Its reader task posts a `ClientConnected`
//! event carrying the write half, then one `NewMessage` per socket read of up
//! to 64 bytes, then `ClientDisconnected` on EOF. There is no framing: a
//! longer send is delivered as several independent messages.
//!
//! ### Operator Console
//! Administrative commands (`/users`, `/kick`, `/ban`, ...) are parsed from
//! the terminal and posted to the same bus, so they never race with client
//! traffic.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The per-client state machine:
//! - Token check (single attempt, wrong token disconnects)
//! - Username assignment with length and uniqueness checks
//! - Chat fan-out to named sessions, best-effort per recipient
//! - Rate limiting, strike accounting and time-boxed bans
//!
//! ### Client Manager Module (`client_manager`)
//! The session registry: client table keyed by remote address and the ban
//! table, owned by the actor.
//!
//! ### Admin Module (`admin`)
//! Executes operator commands against the registry from inside the actor.
//!
//! ### Connection Module (`connection`)
//! The write handle held by the actor and the reader loop for each socket.
//!
//! ### Network Module (`network`)
//! Binds the listener and wires the actor, readers and shutdown signal.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::utils::generate_token;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let token = generate_token();
//!     println!("Token: {}", token);
//!
//!     let server = Server::bind("127.0.0.1:4293", token, ServerConfig::default()).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Abuse Containment
//!
//! A message arriving sooner than the configured rate after the sender's
//! last accepted message, or one that fails validation (invalid UTF-8,
//! whitespace only, control characters), is a strike. At the strike limit the
//! address is banned, the client notified and disconnected. Reconnecting from
//! a banned address inside the ban window is refused and restarts the window.

pub mod admin;
pub mod client_manager;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod event;
pub mod network;
pub mod session;
pub mod utils;

#[cfg(test)]
mod test_support;
