//! Operator commands, executed from inside the session actor's loop.
//!
//! Every command runs to completion against the registry before the actor
//! picks up the next event, so commands never interleave with client traffic.
//! Per-recipient send failures are logged and never stop the remaining sends.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use log::{info, warn};
use shared::{private_line, server_line, AsSensitive};
use tokio::time::Instant;

pub const HELP_TEXT: &str = "Available commands:
  /users                  List all connected users
  /shutdown               Shutdown the server
  /kick <user>...         Kick one or more users
  /kickall                Kick every client
  /broadcast <msg>        Send a message to all authenticated clients
  /msg <user> <msg>       Send a private message to one user
  /ban <user> [reason]    Ban a user's address
  /help /h                Show this help message";

/// Operator-facing outcome of a command.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AdminReport {
    /// Lines for the operator console
    pub lines: Vec<String>,
    /// Set by `/shutdown`; the actor stops after this command
    pub shutdown: bool,
}

impl AdminReport {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

/// Runs one operator command against the registry.
pub async fn execute(
    clients: &mut ClientManager,
    config: &ServerConfig,
    name: &str,
    args: &[String],
    now: Instant,
) -> AdminReport {
    let mut report = AdminReport::default();

    match name {
        "users" => list_users(clients, &mut report),
        "shutdown" => shutdown(clients, config, &mut report).await,
        "kick" => kick(clients, config, args, &mut report).await,
        "kickall" => kick_all(clients, config, &mut report).await,
        "broadcast" => broadcast(clients, config, args, &mut report).await,
        "msg" => private_message(clients, config, args, &mut report).await,
        "ban" => ban(clients, config, args, now, &mut report).await,
        "help" | "h" => report.line(HELP_TEXT),
        other => {
            report.line(format!("Unknown command: '{}'", other));
            report.line("Type /help for a list of commands");
        }
    }

    report
}

fn list_users(clients: &ClientManager, report: &mut AdminReport) {
    let users = clients.named_users();
    if users.is_empty() {
        report.line("No users connected");
        return;
    }
    for (username, addr) in users {
        report.line(format!("- {} ({})", username, addr));
    }
}

async fn shutdown(clients: &mut ClientManager, config: &ServerConfig, report: &mut AdminReport) {
    let notice = server_line("Shutting down");

    for mut client in clients.drain_clients() {
        if client.authenticated {
            if let Err(e) = client.send(notice.as_bytes(), config.write_timeout).await {
                warn!(
                    "Could not notify {} about shutdown: {}",
                    client.addr().sensitive(),
                    e.sensitive()
                );
            }
        }
        client.close().await;
    }

    info!("Shutdown requested by operator");
    report.line("Shutting down");
    report.shutdown = true;
}

async fn kick(
    clients: &mut ClientManager,
    config: &ServerConfig,
    args: &[String],
    report: &mut AdminReport,
) {
    if args.is_empty() {
        report.line("Usage: /kick <user>...");
        return;
    }

    let notice = server_line("Admin kicked you!");

    for username in args {
        let Some(addr) = clients.find_by_username(username) else {
            report.line(format!("Error: could not find user '{}'", username));
            continue;
        };
        if let Some(mut client) = clients.remove_client(&addr) {
            if let Err(e) = client.send(notice.as_bytes(), config.write_timeout).await {
                warn!("Could not notify {} about kick: {}", addr.sensitive(), e.sensitive());
            }
            client.close().await;
            info!("Kicked {} ({})", username, addr.sensitive());
            report.line(format!("Kicked {} ({})", username, addr));
        }
    }
}

async fn kick_all(clients: &mut ClientManager, config: &ServerConfig, report: &mut AdminReport) {
    let notice = server_line("Admin kicked you! (and everybody else)");
    let mut kicked = 0;

    for mut client in clients.drain_clients() {
        if let Err(e) = client.send(notice.as_bytes(), config.write_timeout).await {
            warn!(
                "Could not notify {} about kick: {}",
                client.addr().sensitive(),
                e.sensitive()
            );
        }
        client.close().await;
        kicked += 1;
    }

    info!("Kicked all {} clients", kicked);
    report.line(format!("Kicked all clients ({})", kicked));
}

async fn broadcast(
    clients: &mut ClientManager,
    config: &ServerConfig,
    args: &[String],
    report: &mut AdminReport,
) {
    if args.is_empty() {
        report.line("Usage: /broadcast <msg>");
        return;
    }

    let notice = server_line(&args.join(" "));
    let mut delivered = 0;

    for addr in clients.authenticated_addrs() {
        let Some(client) = clients.get_mut(&addr) else {
            continue;
        };
        match client.send(notice.as_bytes(), config.write_timeout).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Could not broadcast to {}: {}", addr.sensitive(), e.sensitive()),
        }
    }

    report.line(format!("Broadcast delivered to {} clients", delivered));
}

async fn private_message(
    clients: &mut ClientManager,
    config: &ServerConfig,
    args: &[String],
    report: &mut AdminReport,
) {
    if args.len() < 2 {
        report.line("Usage: /msg <user> <msg>");
        return;
    }

    let username = &args[0];
    let Some(addr) = clients.find_by_username(username) else {
        report.line(format!("Error: user '{}' does not exist", username));
        return;
    };
    let Some(client) = clients.get_mut(&addr) else {
        return;
    };

    let message = private_line(&args[1..].join(" "));
    match client.send(message.as_bytes(), config.write_timeout).await {
        Ok(()) => report.line(format!("Message sent to {}", username)),
        Err(e) => {
            warn!("Could not message {}: {}", client.addr().sensitive(), e.sensitive());
            report.line(format!("Error: could not deliver message to '{}'", username));
        }
    }
}

async fn ban(
    clients: &mut ClientManager,
    config: &ServerConfig,
    args: &[String],
    now: Instant,
    report: &mut AdminReport,
) {
    if args.is_empty() {
        report.line("Usage: /ban <user> [reason]");
        return;
    }

    let username = &args[0];
    let Some(addr) = clients.find_by_username(username) else {
        report.line(format!("Error: user '{}' does not exist", username));
        return;
    };

    let reason = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        "No reason provided".to_string()
    };

    clients.ban(&addr, now);
    if let Some(mut client) = clients.remove_client(&addr) {
        let notice = server_line(&format!("You are banned, reason: {}", reason));
        if let Err(e) = client.send(notice.as_bytes(), config.write_timeout).await {
            warn!("Could not notify {} about ban: {}", addr.sensitive(), e.sensitive());
        }
        client.close().await;
    }

    info!("Banned {} ({}). Reason: {}", username, addr.sensitive(), reason);
    report.line(format!("Banned {} ({}). Reason: {}", username, addr, reason));
}
