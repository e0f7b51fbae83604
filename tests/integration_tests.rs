//! Integration tests for the chat relay
//!
//! These tests run the full server on an ephemeral loopback port and talk to
//! it over real TCP sockets.

use server::config::ServerConfig;
use server::event::{Event, EventSender};
use server::network::Server;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const TOKEN: &str = "ABCD1234";
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts a server with rate limiting disabled so tests can talk quickly.
async fn start_server(config: ServerConfig) -> (String, EventSender) {
    let server = Server::bind("127.0.0.1:0", TOKEN, config).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let events = server.events();
    tokio::spawn(server.run());
    (addr, events)
}

fn fast_config() -> ServerConfig {
    ServerConfig {
        message_rate: Duration::ZERO,
        ..ServerConfig::default()
    }
}

/// Reads until the accumulated text contains `needle`, returning all of it.
async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut received = Vec::new();
    let mut buf = [0u8; 256];

    while !String::from_utf8_lossy(&received).contains(needle) {
        let n = timeout(READ_TIMEOUT, stream.read(&mut buf))
            .await
            .expect("timed out waiting for server")
            .expect("read failed");
        assert!(
            n > 0,
            "connection closed before '{}' arrived; got {:?}",
            needle,
            String::from_utf8_lossy(&received)
        );
        received.extend_from_slice(&buf[..n]);
    }

    String::from_utf8_lossy(&received).into_owned()
}

/// Reads until the server closes the connection.
async fn read_to_close(stream: &mut TcpStream) -> String {
    let mut received = Vec::new();
    timeout(READ_TIMEOUT, stream.read_to_end(&mut received))
        .await
        .expect("timed out waiting for close")
        .expect("read failed");
    String::from_utf8_lossy(&received).into_owned()
}

async fn join(addr: &str, username: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "Enter auth token: ").await;

    stream.write_all(format!("{}\n", TOKEN).as_bytes()).await.unwrap();
    read_until(&mut stream, "Enter your username: ").await;

    stream.write_all(format!("{}\n", username).as_bytes()).await.unwrap();
    read_until(&mut stream, &format!("Welcome to the club, {}!", username)).await;

    stream
}

/// HANDSHAKE AND RELAY TESTS
mod relay_tests {
    use super::*;

    #[tokio::test]
    async fn handshake_then_chat_is_relayed() {
        let (addr, _events) = start_server(fast_config()).await;

        let mut alice = join(&addr, "alice").await;
        let mut bob = join(&addr, "bob").await;

        let notice = read_until(&mut alice, "bob joined the chat").await;
        assert!(notice.starts_with("[Server]"));

        alice.write_all(b"hi bob\n").await.unwrap();
        let received = read_until(&mut bob, "[alice]hi bob\n").await;
        assert_eq!(received, "[alice]hi bob\n");
    }

    #[tokio::test]
    async fn wrong_token_gets_one_line_then_close() {
        let (addr, _events) = start_server(fast_config()).await;

        let mut stream = TcpStream::connect(&addr).await.unwrap();
        read_until(&mut stream, "Enter auth token: ").await;

        stream.write_all(b"wrong\n").await.unwrap();
        let rest = read_to_close(&mut stream).await;
        assert_eq!(rest, "[Server]Invalid token!\n");
    }

    #[tokio::test]
    async fn long_send_is_relayed_as_separate_chunks() {
        let (addr, _events) = start_server(fast_config()).await;

        let mut alice = join(&addr, "alice").await;
        let mut bob = join(&addr, "bob").await;
        read_until(&mut alice, "bob joined the chat").await;

        let mut payload = "a".repeat(64);
        payload.push('b');
        alice.write_all(payload.as_bytes()).await.unwrap();

        let expected = format!("[alice]{}[alice]b", "a".repeat(64));
        let received = read_until(&mut bob, &expected).await;
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn unnamed_clients_do_not_receive_chat() {
        let (addr, _events) = start_server(fast_config()).await;

        let mut alice = join(&addr, "alice").await;
        let mut lurker = TcpStream::connect(&addr).await.unwrap();
        read_until(&mut lurker, "Enter auth token: ").await;
        lurker.write_all(format!("{}\n", TOKEN).as_bytes()).await.unwrap();
        read_until(&mut lurker, "Enter your username: ").await;

        let mut bob = join(&addr, "bob").await;
        read_until(&mut alice, "bob joined the chat").await;

        alice.write_all(b"secret\n").await.unwrap();
        read_until(&mut bob, "[alice]secret\n").await;

        let mut buf = [0u8; 64];
        let idle = timeout(Duration::from_millis(200), lurker.read(&mut buf)).await;
        assert!(idle.is_err(), "unnamed client received data");
    }
}

/// ABUSE CONTAINMENT TESTS
mod abuse_tests {
    use super::*;

    #[tokio::test]
    async fn strikes_lead_to_ban_and_disconnect() {
        let config = ServerConfig {
            strike_limit: 2,
            ..fast_config()
        };
        let (addr, _events) = start_server(config).await;

        let mut stream = TcpStream::connect(&addr).await.unwrap();
        read_until(&mut stream, "Enter auth token: ").await;

        stream.write_all(b"\x07").await.unwrap();
        // Give the first strike time to land as its own read.
        tokio::time::sleep(Duration::from_millis(100)).await;
        stream.write_all(b"\x07").await.unwrap();

        let rest = read_to_close(&mut stream).await;
        assert!(rest.contains("banned"));
    }
}

/// OPERATOR COMMAND TESTS
mod admin_tests {
    use super::*;

    #[tokio::test]
    async fn ban_notifies_with_reason_and_disconnects() {
        let (addr, events) = start_server(fast_config()).await;
        let mut bob = join(&addr, "bob").await;

        events
            .send(Event::admin("ban", &["bob", "\"spamming\""]))
            .unwrap();

        let rest = read_to_close(&mut bob).await;
        assert!(rest.contains("spamming"));
    }

    #[tokio::test]
    async fn kickall_disconnects_everyone() {
        let (addr, events) = start_server(fast_config()).await;

        let mut clients = vec![join(&addr, "alice").await, join(&addr, "bob").await];
        let mut stranger = TcpStream::connect(&addr).await.unwrap();
        read_until(&mut stranger, "Enter auth token: ").await;
        clients.push(stranger);

        events.send(Event::admin("kickall", &[])).unwrap();

        for client in &mut clients {
            let rest = read_to_close(client).await;
            assert!(rest.contains("Admin kicked you! (and everybody else)"));
        }
    }

    #[tokio::test]
    async fn private_message_reaches_only_its_target() {
        let (addr, events) = start_server(fast_config()).await;
        let mut alice = join(&addr, "alice").await;
        let mut bob = join(&addr, "bob").await;
        read_until(&mut alice, "bob joined the chat").await;

        events
            .send(Event::admin("msg", &["bob", "just", "for", "you"]))
            .unwrap();

        let received = read_until(&mut bob, "just for you\n").await;
        assert_eq!(received, "[Server (private)]just for you\n");

        let mut buf = [0u8; 64];
        let idle = timeout(Duration::from_millis(200), alice.read(&mut buf)).await;
        assert!(idle.is_err(), "private message leaked to alice");
    }

    #[tokio::test]
    async fn shutdown_notifies_and_closes() {
        let (addr, events) = start_server(fast_config()).await;
        let mut alice = join(&addr, "alice").await;

        events.send(Event::admin("shutdown", &[])).unwrap();

        let rest = read_to_close(&mut alice).await;
        assert_eq!(rest, "[Server]Shutting down\n");
    }
}
