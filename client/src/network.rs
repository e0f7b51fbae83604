use crate::input::{encode_line, parse_input, Input, HELP_TEXT};
use log::{error, info};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Terminal chat client over one TCP connection.
pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        info!("Connected to {}", server_addr);
        Ok(Client { stream })
    }

    /// Relays stdin to the server and server output to stdout until either
    /// side closes.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, writer) = self.stream.into_split();
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();

        relay(reader, writer, stdin, &mut stdout).await
    }
}

/// Core loop, generic over its endpoints so it can run against in-memory streams.
pub async fn relay<R, W, I, O>(
    mut server_rx: R,
    mut server_tx: W,
    input: I,
    output: &mut O,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: Write,
{
    let mut lines = input.lines();
    let mut buffer = [0u8; 1024];

    loop {
        tokio::select! {
            result = server_rx.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        writeln!(output)?;
                        writeln!(output, "Disconnected from server")?;
                        break;
                    }
                    Ok(n) => {
                        output.write_all(String::from_utf8_lossy(&buffer[..n]).as_bytes())?;
                        output.flush()?;
                    }
                    Err(e) => {
                        error!("Failed reading from server: {}", e);
                        return Err(e.into());
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Some(Input::Send(text)) => {
                        server_tx.write_all(&encode_line(&text)).await?;
                        server_tx.flush().await?;
                    }
                    Some(Input::Help) => {
                        writeln!(output, "{}", HELP_TEXT)?;
                    }
                    Some(Input::Quit) => break,
                    None => {}
                }
            }
        }
    }

    let _ = server_tx.shutdown().await;
    Ok(())
}
