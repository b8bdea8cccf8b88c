use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::protocol::{handle_request, ServerMessage, SharedEngine};
use crate::publish;

/// Line-oriented control socket: one JSON object per newline-terminated
/// line in both directions. Every connection also receives the shared
/// event stream (trades, book snapshots, order statuses).
pub struct LineServer {
    engine: SharedEngine,
    events: broadcast::Sender<String>,
}

impl LineServer {
    pub fn new(engine: SharedEngine, events: broadcast::Sender<String>) -> Self {
        Self { engine, events }
    }

    pub async fn run(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "client connected");
                    let engine = self.engine.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, engine, events).await {
                            // Client went away mid-message; nothing to recover.
                            warn!(%peer, error = %err, "connection error");
                        }
                        info!(%peer, "client disconnected");
                    });
                }
                Err(err) => {
                    error!(error = %err, "failed to accept connection");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    engine: SharedEngine,
    events: broadcast::Sender<String>,
) -> std::io::Result<()> {
    let mut event_rx = events.subscribe();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    send_line(&mut write_half, &ServerMessage::welcome()).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if !line.trim().is_empty() => {
                        let (reply, notification) = handle_request(&engine, &line);
                        send_line(&mut write_half, &reply).await?;
                        if let Some(notification) = notification {
                            publish(&events, &notification);
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(json) => {
                        write_half.write_all(json.as_bytes()).await?;
                        write_half.write_all(b"\n").await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "slow client, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

async fn send_line(writer: &mut OwnedWriteHalf, message: &ServerMessage) -> std::io::Result<()> {
    let mut json = serde_json::to_string(message)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await
}
