//! Per-connection plumbing: the write handle owned by the session actor and
//! the reader task that turns socket reads into events.
//!
//! A socket is split on accept. The read half stays with its reader task for
//! the lifetime of the connection; the write half travels to the actor inside
//! [`Event::ClientConnected`] and is only ever touched from there. The two
//! halves are tied together by a one-shot close signal: when the actor closes
//! or drops a [`Connection`], the reader stops and releases the read half.

use crate::event::{Event, EventSender};
use log::{debug, error, info, warn};
use shared::{AsSensitive, READ_BUFFER_SIZE};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Write side of one client connection.
pub struct Connection {
    addr: String,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl Connection {
    pub fn new<W>(addr: impl Into<String>, writer: W, close_tx: oneshot::Sender<()>) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            addr: addr.into(),
            writer: Box::new(writer),
            close_tx: Some(close_tx),
        }
    }

    /// Remote endpoint, `ip:port`. Used as the registry key.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Writes and flushes `data`, giving up after `limit`.
    pub async fn send(&mut self, data: &[u8], limit: Duration) -> io::Result<()> {
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(data).await?;
            writer.flush().await
        };

        match tokio::time::timeout(limit, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
        }
    }

    /// Shuts down the write half and stops the reader.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown of {} failed: {}", self.addr.sensitive(), e.sensitive());
        }
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// Splits an accepted socket and spawns its reader task.
pub fn spawn_connection(
    stream: TcpStream,
    addr: String,
    events: EventSender,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let (reader, writer) = stream.into_split();
    let (close_tx, close_rx) = oneshot::channel();
    let connection = Connection::new(addr, writer, close_tx);

    tokio::spawn(run_reader(connection, reader, close_rx, events, shutdown))
}

/// Reader loop for one connection.
///
/// Posts `ClientConnected` first, then one `NewMessage` per successful read of
/// up to [`READ_BUFFER_SIZE`] bytes. There is no reassembly: a longer send is
/// delivered as several independent messages. EOF or a read error posts
/// `ClientDisconnected`. A close from the actor or the process-wide shutdown
/// signal ends the loop without further events.
pub async fn run_reader<R>(
    connection: Connection,
    mut reader: R,
    mut close_rx: oneshot::Receiver<()>,
    events: EventSender,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let addr = connection.addr().to_string();

    if events.send(Event::ClientConnected(connection)).is_err() {
        warn!("Event bus closed, dropping connection {}", addr.sensitive());
        return;
    }

    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        debug!("{} closed the connection", addr.sensitive());
                        let _ = events.send(Event::ClientDisconnected(addr));
                        break;
                    }
                    Ok(n) => {
                        let event = Event::NewMessage {
                            addr: addr.clone(),
                            data: buffer[..n].to_vec(),
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) if is_disconnect(&e) => {
                        info!("Connection for {} lost: {}", addr.sensitive(), e.sensitive());
                        let _ = events.send(Event::ClientDisconnected(addr));
                        break;
                    }
                    Err(e) => {
                        error!("Read error on {}: {}", addr.sensitive(), e.sensitive());
                        let _ = events.send(Event::ClientDisconnected(addr));
                        break;
                    }
                }
            }
            _ = &mut close_rx => {
                debug!("Connection for {} closed by server", addr.sensitive());
                break;
            }
            _ = shutdown.changed() => {
                debug!("Reader for {} stopping on shutdown", addr.sensitive());
                break;
            }
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
