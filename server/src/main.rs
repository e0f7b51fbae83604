use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::console::run_console;
use server::error::ServerError;
use server::event::Event;
use server::network::Server;
use server::utils::generate_token;
use shared::{
    set_safe_mode, BAN_LIMIT, DEFAULT_HOST, DEFAULT_PORT, MAX_USERNAME_LENGTH, MESSAGE_RATE,
    STRIKE_LIMIT, WRITE_TIMEOUT,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::task::JoinError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: IpAddr,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds a banned address is refused on reconnect
    #[arg(long, default_value_t = BAN_LIMIT.as_secs())]
    ban_limit_secs: u64,

    /// Minimum milliseconds between two messages from one client
    #[arg(long, default_value_t = MESSAGE_RATE.as_millis() as u64)]
    message_rate_ms: u64,

    /// Violations before a client is banned
    #[arg(long, default_value_t = STRIKE_LIMIT)]
    strike_limit: u32,

    /// Longest accepted username
    #[arg(long, default_value_t = MAX_USERNAME_LENGTH)]
    max_username_length: usize,

    /// Milliseconds before a write to a stalled client is abandoned
    #[arg(long, default_value_t = WRITE_TIMEOUT.as_millis() as u64)]
    write_timeout_ms: u64,

    /// Redact addresses and error details in logs
    #[arg(long)]
    safe_mode: bool,
}

impl Args {
    /// `ip:port`, with IPv6 hosts bracketed.
    fn listen_addr(&self) -> String {
        SocketAddr::new(self.host, self.port).to_string()
    }

    fn config(&self) -> ServerConfig {
        ServerConfig {
            ban_limit: Duration::from_secs(self.ban_limit_secs),
            message_rate: Duration::from_millis(self.message_rate_ms),
            strike_limit: self.strike_limit,
            max_username_length: self.max_username_length,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    set_safe_mode(args.safe_mode);

    let token = generate_token();
    println!("Token: {}", token);

    let address = args.listen_addr();
    let server = match Server::bind(&address, token, args.config()).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let events = server.events();
    let console = run_console(
        BufReader::new(tokio::io::stdin()),
        events.clone(),
        server.shutdown_signal(),
    );
    tokio::spawn(async move {
        if let Err(e) = console.await {
            error!("Console stopped: {}", e);
        }
    });

    let mut server_handle = tokio::spawn(server.run());

    let outcome = tokio::select! {
        result = &mut server_handle => flatten(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = events.send(Event::admin("shutdown", &[]));
            flatten(server_handle.await)
        }
    };
    outcome?;

    // The console's stdin read runs on a blocking thread that cannot be
    // cancelled, so exit rather than wait for the runtime to drain it.
    std::process::exit(0);
}

fn flatten(
    result: Result<Result<(), ServerError>, JoinError>,
) -> Result<(), Box<dyn std::error::Error>> {
    result??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_addr() {
        let args = Args::try_parse_from(["server"]).unwrap();
        assert_eq!(args.listen_addr(), "127.0.0.1:4293");
        assert!(!args.safe_mode);
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let args = Args::try_parse_from(["server", "--host", "::1", "--port", "9000"]).unwrap();
        assert_eq!(args.listen_addr(), "[::1]:9000");
        assert!(args.listen_addr().parse::<SocketAddr>().is_ok());
    }

    #[test]
    fn test_host_must_be_an_ip() {
        assert!(Args::try_parse_from(["server", "--host", "localhost:1"]).is_err());
    }

    #[test]
    fn test_flags_map_to_config() {
        let args = Args::try_parse_from([
            "server",
            "--ban-limit-secs",
            "30",
            "--message-rate-ms",
            "250",
            "--strike-limit",
            "4",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.ban_limit, Duration::from_secs(30));
        assert_eq!(config.message_rate, Duration::from_millis(250));
        assert_eq!(config.strike_limit, 4);
        assert_eq!(config.max_username_length, MAX_USERNAME_LENGTH);
    }
}
