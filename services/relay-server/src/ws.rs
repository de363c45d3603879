//! WebSocket subscriber endpoint
//!
//! `GET /ws` upgrades without any handshake payload. The socket is split: the
//! sink becomes a `WsSubscriber` registered with the broadcaster, and the
//! stream half is drained here until the client goes away or the broadcaster
//! drops the subscriber. Inbound messages are logged and ignored.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use donation_relay::{Broadcaster, SendError, Subscriber, SubscriberId};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Outbound half of one WebSocket connection.
pub struct WsSubscriber {
    id: SubscriberId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    open: AtomicBool,
    /// Wakes the read loop when the broadcaster drops this subscriber
    dropped: Notify,
}

impl WsSubscriber {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id: SubscriberId::new(),
            sink: Mutex::new(sink),
            open: AtomicBool::new(true),
            dropped: Notify::new(),
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Stop accepting sends, end the read loop and tell the client.
    async fn shut_down(&self) {
        self.mark_closed();
        self.dropped.notify_one();
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(subscriber_id = %self.id, error = %e, "close frame not delivered");
        }
    }

    async fn send_text(&self, payload: &str) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(payload.to_owned().into()))
            .await
            .map_err(|e| {
                self.mark_closed();
                SendError::Transport(e.to_string())
            })
    }
}

impl Subscriber for WsSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn send<'a>(
        &'a self,
        payload: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>> {
        Box::pin(self.send_text(payload))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.shut_down())
    }
}

/// Build the router for the WebSocket endpoint.
pub fn build_ws_router(broadcaster: Arc<Broadcaster>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(broadcaster)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Arc<Broadcaster>>,
) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, broadcaster))
}

/// Register the connection and hold it until it ends.
async fn serve_subscriber(socket: WebSocket, broadcaster: Arc<Broadcaster>) {
    let (sink, stream) = socket.split();
    let subscriber = Arc::new(WsSubscriber::new(sink));
    drive_subscriber(subscriber, stream, broadcaster).await;
}

async fn drive_subscriber(
    subscriber: Arc<WsSubscriber>,
    mut stream: SplitStream<WebSocket>,
    broadcaster: Arc<Broadcaster>,
) {
    let id = broadcaster.register(subscriber.clone()).await;

    loop {
        let message = tokio::select! {
            message = stream.next() => message,
            _ = subscriber.dropped.notified() => {
                debug!(subscriber_id = %id, "subscriber dropped by broadcaster");
                break;
            }
        };
        let Some(message) = message else { break };

        match message {
            Ok(Message::Text(text)) => {
                debug!(subscriber_id = %id, message = %text.as_str(), "ignoring message from subscriber");
            }
            Ok(Message::Binary(bytes)) => {
                debug!(subscriber_id = %id, len = bytes.len(), "ignoring binary message from subscriber");
            }
            Ok(Message::Close(_)) => break,
            // Pings are answered by the WebSocket layer
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                debug!(subscriber_id = %id, error = %e, "subscriber read failed");
                break;
            }
        }
    }

    subscriber.mark_closed();
    broadcaster.unregister(id).await;
}
