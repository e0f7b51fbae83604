//! Events flowing from connection readers and the operator console into the
//! session actor.
//!
//! The bus is an unbounded tokio `mpsc` channel: producers never block and no
//! event is ever dropped. Each producer's events arrive in the order it sent
//! them, and the single consumer drains them strictly one at a time.

use crate::connection::Connection;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Event {
    /// A socket was accepted; ownership of its write half moves to the actor.
    ClientConnected(Connection),
    /// The reader for `addr` saw EOF or a fatal read error.
    ClientDisconnected(String),
    /// One socket read worth of bytes from `addr`.
    NewMessage { addr: String, data: Vec<u8> },
    /// An operator command, already split into name and arguments.
    AdminCommand { name: String, args: Vec<String> },
}

impl Event {
    pub fn admin(name: &str, args: &[&str]) -> Self {
        Event::AdminCommand {
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Creates the event bus.
pub fn event_bus() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
