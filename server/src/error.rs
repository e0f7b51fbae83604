use std::io;
use thiserror::Error;

/// Errors that end the server. Per-connection failures never become one of these.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("event bus closed")]
    EventBusClosed,
}
