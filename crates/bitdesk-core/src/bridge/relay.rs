//! WebSocket relay window
//!
//! The editor runs in a browser page (the relay) that hosts it in an iframe
//! and forwards frames between the iframe and a WebSocket:
//!
//! - host → relay: [`PeerFrame`] as JSON text
//! - relay → host: [`Envelope`] as JSON text, posted onto the [`MessageBus`]
//!
//! The connection is kept alive for as long as the window is, reconnecting
//! with exponential backoff. Frames sent while disconnected are queued.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{Envelope, MessageBus, PeerFrame, PeerWindow, TransportError};

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Peer window reached through a WebSocket relay
#[derive(Debug, Clone)]
pub struct RelayWindow {
    tx: mpsc::UnboundedSender<PeerFrame>,
}

impl RelayWindow {
    /// Connect to the relay at `url`, posting inbound messages onto `bus`
    ///
    /// Fails if the first connection attempt fails. Later disconnects are
    /// retried in the background until every clone of the window is dropped.
    pub async fn connect(url: &str, bus: MessageBus) -> Result<Self> {
        let stream = open(url).await?;
        info!("Connected to editor relay at {}", url);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(relay_loop(url.to_string(), stream, rx, bus));

        Ok(Self { tx })
    }

    fn push(&self, frame: PeerFrame) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl PeerWindow for RelayWindow {
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError> {
        self.push(PeerFrame::Post {
            target_origin: target_origin.to_string(),
            data,
        })
    }

    fn navigate(&self, url: &str) -> Result<(), TransportError> {
        self.push(PeerFrame::Navigate {
            url: url.to_string(),
        })
    }
}

async fn open(url: &str) -> Result<RelayStream> {
    debug!("Connecting to {}", url);
    let (stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to editor relay at {}", url))?;
    Ok(stream)
}

/// Why a connection ended
enum Ended {
    /// Every window handle is gone
    WindowDropped,
    /// The relay closed the socket
    RelayClosed,
}

/// Connection loop with reconnection
async fn relay_loop(
    url: String,
    stream: RelayStream,
    mut frames_rx: mpsc::UnboundedReceiver<PeerFrame>,
    bus: MessageBus,
) {
    let mut stream = Some(stream);
    let mut backlog: VecDeque<PeerFrame> = VecDeque::new();
    let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

    loop {
        let connection = match stream.take() {
            Some(connection) => Some(connection),
            None => match open(&url).await {
                Ok(connection) => {
                    info!("Reconnected to editor relay");
                    reconnect_delay = INITIAL_RECONNECT_DELAY;
                    Some(connection)
                }
                Err(e) => {
                    warn!("{:#}", e);
                    None
                }
            },
        };

        if let Some(connection) = connection {
            match pump(connection, &mut frames_rx, &mut backlog, &bus).await {
                Ok(Ended::WindowDropped) => break,
                Ok(Ended::RelayClosed) => info!("Editor relay disconnected"),
                Err(e) => warn!("Editor relay connection error: {}", e),
            }
        }

        // Wait before reconnecting, queueing frames sent meanwhile
        let sleep = tokio::time::sleep(reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                frame = frames_rx.recv() => match frame {
                    Some(frame) => backlog.push_back(frame),
                    None => {
                        debug!("Relay window dropped while disconnected");
                        return;
                    }
                },
            }
        }
        reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
    }

    debug!("Relay connection closed");
}

/// Move frames both ways until the connection or the window goes away
async fn pump(
    connection: RelayStream,
    frames_rx: &mut mpsc::UnboundedReceiver<PeerFrame>,
    backlog: &mut VecDeque<PeerFrame>,
    bus: &MessageBus,
) -> Result<Ended> {
    let (mut write, mut read) = connection.split();

    flush_backlog(&mut write, backlog).await?;

    loop {
        tokio::select! {
            frame = frames_rx.recv() => {
                match frame {
                    Some(frame) => {
                        backlog.push_back(frame);
                        flush_backlog(&mut write, backlog).await?;
                    }
                    None => {
                        write.close().await.ok();
                        return Ok(Ended::WindowDropped);
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(envelope) => bus.post(envelope.origin, envelope.data),
                            Err(e) => debug!("Ignoring malformed relay frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(Ended::RelayClosed),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

/// Send queued frames in order. A frame leaves the queue only once written.
async fn flush_backlog<W>(write: &mut W, backlog: &mut VecDeque<PeerFrame>) -> Result<()>
where
    W: Sink<Message> + Unpin,
    W::Error: std::error::Error + Send + Sync + 'static,
{
    while let Some(frame) = backlog.pop_front() {
        let message = match encode(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping frame that failed to encode: {}", e);
                continue;
            }
        };
        if let Err(e) = write.send(message).await {
            backlog.push_front(frame);
            return Err(e.into());
        }
    }
    Ok(())
}

fn encode(frame: &PeerFrame) -> Result<Message> {
    Ok(Message::Text(serde_json::to_string(frame)?))
}
