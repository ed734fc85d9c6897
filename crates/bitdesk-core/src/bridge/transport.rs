//! Bridge transport
//!
//! Two halves of the channel to the editor:
//!
//! - **Outbound**: a [`PeerWindow`] that posts messages into the editor's
//!   window and navigates it. [`LocalWindow`] keeps frames in-process;
//!   `RelayWindow` forwards them over a WebSocket.
//! - **Inbound**: a [`MessageBus`] that routes each received envelope to the
//!   live [`Subscription`]s expecting its exact origin. Other origins never
//!   reach a subscription's queue, and a subscription only yields validated
//!   messages.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::message::{InboundMessage, OutboundMessage};

/// Errors raised while talking to the peer window
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer window (or its relay) is gone
    #[error("Peer window channel closed")]
    Closed,

    /// The outbound message could not be encoded
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A received message with the origin it claims to come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: String,
    pub data: Value,
}

/// One live subscription and the origin it accepts
#[derive(Debug)]
struct Route {
    origin: String,
    tx: mpsc::UnboundedSender<Value>,
}

/// Inbound fan-out of messages received from peer windows
///
/// Messages are routed by exact origin when posted; a message no
/// subscription accepts is dropped here and never buffered.
#[derive(Debug, Clone, Default)]
pub struct MessageBus {
    routes: Arc<Mutex<Vec<Route>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a message to every live subscription expecting `origin`
    pub fn post(&self, origin: impl Into<String>, data: Value) {
        let origin = origin.into();
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.retain(|route| !route.tx.is_closed());

        let mut delivered = false;
        for route in routes.iter().filter(|route| route.origin == origin) {
            delivered |= route.tx.send(data.clone()).is_ok();
        }

        if !delivered {
            debug!(origin = %origin, "Ignoring message from unexpected origin");
        }
    }

    fn subscribe(&self, origin: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.push(Route {
            origin: origin.to_string(),
            tx,
        });
        rx
    }
}

/// The editor's window, as seen from the host
pub trait PeerWindow: Send + Sync {
    /// Post a message, delivered only if the window's origin is `target_origin`
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError>;

    /// Point the window at a new URL
    fn navigate(&self, url: &str) -> Result<(), TransportError>;
}

/// Frame sent from the host towards a peer window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PeerFrame {
    Post {
        #[serde(rename = "targetOrigin")]
        target_origin: String,
        data: Value,
    },
    Navigate {
        url: String,
    },
}

/// In-process peer window that records every frame
#[derive(Debug, Clone)]
pub struct LocalWindow {
    tx: mpsc::UnboundedSender<PeerFrame>,
}

impl LocalWindow {
    /// Create a window and the receiver its frames arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PeerWindow for LocalWindow {
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError> {
        self.tx
            .send(PeerFrame::Post {
                target_origin: target_origin.to_string(),
                data,
            })
            .map_err(|_| TransportError::Closed)
    }

    fn navigate(&self, url: &str) -> Result<(), TransportError> {
        self.tx
            .send(PeerFrame::Navigate {
                url: url.to_string(),
            })
            .map_err(|_| TransportError::Closed)
    }
}

/// Channel between one session and the editor
#[derive(Clone)]
pub struct BridgeTransport {
    origin: String,
    window: Arc<dyn PeerWindow>,
    bus: MessageBus,
}

impl BridgeTransport {
    /// `origin` is the exact origin the editor is expected to speak from
    pub fn new(origin: impl Into<String>, window: Arc<dyn PeerWindow>, bus: MessageBus) -> Self {
        Self {
            origin: origin.into(),
            window,
            bus,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Post a message to the editor. Fire-and-forget: nothing is acknowledged.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let data = message.to_value()?;
        trace!(action = message.action(), "Posting message to editor");
        self.window.post_message(data, &self.origin)
    }

    /// Navigate the editor window
    pub fn load_peer(&self, url: &str) -> Result<(), TransportError> {
        debug!(url, "Loading editor");
        self.window.navigate(url)
    }

    /// Start receiving messages. Drop the subscription to detach.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.bus.subscribe(&self.origin),
        }
    }
}

impl std::fmt::Debug for BridgeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeTransport")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Stream of validated messages from the expected origin
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    /// Wait for the next accepted message. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<InboundMessage> {
        loop {
            let data = self.rx.recv().await?;
            match InboundMessage::from_value(&data) {
                Some(message) => return Some(message),
                None => trace!(data = %data, "Ignoring unrecognised message"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORIGIN: &str = "https://makecode.microbit.org";

    fn transport() -> (
        BridgeTransport,
        MessageBus,
        mpsc::UnboundedReceiver<PeerFrame>,
    ) {
        let bus = MessageBus::new();
        let (window, frames) = LocalWindow::new();
        (
            BridgeTransport::new(ORIGIN, Arc::new(window), bus.clone()),
            bus,
            frames,
        )
    }

    fn content_loaded() -> Value {
        json!({"type": "pxthost", "action": "editorcontentloaded"})
    }

    #[tokio::test]
    async fn test_filters_origin_and_shape() {
        let (transport, bus, _frames) = transport();
        let mut sub = transport.subscribe();

        bus.post("https://evil.example", content_loaded());
        bus.post("https://makecode.microbit.org.evil.example", content_loaded());
        bus.post(ORIGIN, json!("editorcontentloaded"));
        bus.post(ORIGIN, json!(null));
        bus.post(ORIGIN, json!({"type": "pxthost", "action": "unknown"}));
        bus.post(ORIGIN, content_loaded());

        assert_eq!(sub.next().await, Some(InboundMessage::EditorContentLoaded));
    }

    #[tokio::test]
    async fn test_independent_subscriptions() {
        let bus = MessageBus::new();
        let (window_a, _) = LocalWindow::new();
        let (window_b, _) = LocalWindow::new();
        let a = BridgeTransport::new("https://a.example", Arc::new(window_a), bus.clone());
        let b = BridgeTransport::new("https://b.example", Arc::new(window_b), bus.clone());
        let mut sub_a = a.subscribe();
        let mut sub_b = b.subscribe();

        bus.post("https://b.example", content_loaded());
        bus.post("https://a.example", json!({"type": "pxthost", "action": "workspacesync", "id": "1"}));

        assert_eq!(
            sub_a.next().await,
            Some(InboundMessage::WorkspaceSync { id: "1".to_string() })
        );
        assert_eq!(sub_b.next().await, Some(InboundMessage::EditorContentLoaded));
    }

    #[tokio::test]
    async fn test_subscription_ends_when_bus_dropped() {
        let (transport, bus, _frames) = transport();
        let mut sub = transport.subscribe();
        drop(transport);
        drop(bus);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_foreign_burst_does_not_displace_queued_message() {
        let (transport, bus, _frames) = transport();
        let mut sub = transport.subscribe();

        bus.post(ORIGIN, json!({"type": "pxthost", "action": "workspacesave", "project": {"rev": 1}}));
        for _ in 0..300 {
            bus.post("https://evil.example", content_loaded());
        }
        bus.post(ORIGIN, content_loaded());

        assert_eq!(
            sub.next().await,
            Some(InboundMessage::WorkspaceSave {
                project: json!({"rev": 1})
            })
        );
        assert_eq!(sub.next().await, Some(InboundMessage::EditorContentLoaded));
    }

    #[test]
    fn test_dropped_subscriptions_are_pruned() {
        let (transport, bus, _frames) = transport();
        let first = transport.subscribe();
        let _second = transport.subscribe();
        drop(first);

        bus.post(ORIGIN, content_loaded());
        assert_eq!(bus.routes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_send_targets_expected_origin() {
        let (transport, _bus, mut frames) = transport();

        transport
            .send(&OutboundMessage::workspace_sync_reply("9"))
            .unwrap();
        transport.load_peer("https://makecode.microbit.org/?embed=1").unwrap();

        match frames.try_recv().unwrap() {
            PeerFrame::Post {
                target_origin,
                data,
            } => {
                assert_eq!(target_origin, ORIGIN);
                assert_eq!(data["id"], "9");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(
            frames.try_recv().unwrap(),
            PeerFrame::Navigate {
                url: "https://makecode.microbit.org/?embed=1".to_string()
            }
        );
    }

    #[test]
    fn test_send_after_window_closed() {
        let (transport, _bus, frames) = transport();
        drop(frames);
        assert!(matches!(
            transport.send(&OutboundMessage::workspace_sync_reply("1")),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_frame_wire_shape() {
        let frame = PeerFrame::Post {
            target_origin: ORIGIN.to_string(),
            data: json!({"a": 1}),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"kind": "post", "targetOrigin": ORIGIN, "data": {"a": 1}})
        );
    }
}
