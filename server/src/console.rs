//! Operator console: turns `/command arg...` lines from a terminal into admin
//! events on the bus.

use crate::error::ServerError;
use crate::event::{Event, EventSender};
use log::{debug, error};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

/// Splits a console line into a command name and its arguments.
///
/// Only lines starting with `/` are commands. Pieces are separated by spaces
/// with empty pieces dropped; the command name is lower-cased.
pub fn parse_command(input: &str) -> Option<(String, Vec<String>)> {
    let rest = input.trim().strip_prefix('/')?;
    let mut parts = rest.split(' ').filter(|part| !part.is_empty());
    let command = parts.next()?.to_lowercase();
    let args = parts.map(str::to_string).collect();
    Some((command, args))
}

/// Reads operator lines until EOF or shutdown.
///
/// Fails with [`ServerError::EventBusClosed`] if the actor has gone away, or
/// with [`ServerError::Io`] if the input cannot be read.
pub async fn run_console<R>(
    input: R,
    events: EventSender,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let Some((name, args)) = parse_command(&line) else {
                            println!("Commands start with '/'. Type /help for a list of commands");
                            continue;
                        };
                        if events.send(Event::AdminCommand { name, args }).is_err() {
                            return Err(ServerError::EventBusClosed);
                        }
                    }
                    Ok(None) => {
                        debug!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read console input: {}", e);
                        return Err(e.into());
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    Ok(())
}
