/// Tokio-based WebSocket message broker for chat-call-session
///
/// This crate provides the `MessageTransport` interface consumed by the call
/// state machine, and a concrete implementation that keeps one WebSocket per
/// chat room and fans inbound frames out to subscribers by their broker type.
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Key stamped on every outbound frame and used to route inbound ones.
pub const BROKER_TYPE_KEY: &str = "brokertype";

/// Topic that receives frames carrying no broker type (plain chat text).
pub const DEFAULT_TOPIC: &str = "text";

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Callback invoked with every decoded frame published on a subscribed topic.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifies one subscription so it can be cancelled later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pub/sub transport shared by every feature of the chat client.
///
/// Delivery is at-least-once: subscribers must tolerate duplicates and must
/// not assume ordering between frames published by different peers.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Registers `handler` for frames whose broker type is `topic`.
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> SubscriptionId;

    /// Removes a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, topic: &str, id: &SubscriptionId);

    /// Publishes a JSON object under `topic` on the socket of `channel_id`.
    async fn publish(
        &self,
        topic: &str,
        message: Value,
        channel_id: &str,
    ) -> Result<(), anyhow::Error>;
}

/// Connection settings for [`WebSocketBroker`].
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Socket base URL; the room id and token are appended to it.
    pub socket_host: String,
    /// Session token of the logged-in user.
    pub token: String,
    /// Pause between a socket closing and the next connection attempt.
    pub reconnect_delay: Duration,
}

impl BrokerConfig {
    pub fn new(socket_host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            socket_host: socket_host.into(),
            token: token.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Reads `SOCKET_HOST` and `SOCKET_TOKEN`.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let host = lookup("SOCKET_HOST").ok_or_else(|| anyhow::anyhow!("SOCKET_HOST is not set"))?;
        let token =
            lookup("SOCKET_TOKEN").ok_or_else(|| anyhow::anyhow!("SOCKET_TOKEN is not set"))?;
        Ok(Self::new(host, token))
    }

    pub fn room_url(&self, room: &str) -> String {
        format!(
            "{}{}/?token={}",
            self.socket_host,
            room,
            urlencoding::encode(&self.token)
        )
    }
}

#[derive(Default)]
struct Subscriptions {
    by_topic: DashMap<String, Vec<(SubscriptionId, MessageHandler)>>,
}

impl Subscriptions {
    fn add(&self, topic: &str, handler: MessageHandler) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.by_topic
            .entry(topic.to_string())
            .or_default()
            .push((id.clone(), handler));
        id
    }

    fn remove(&self, topic: &str, id: &SubscriptionId) {
        if let Some(mut handlers) = self.by_topic.get_mut(topic) {
            handlers.retain(|(existing, _)| existing != id);
        }
    }

    fn dispatch(&self, raw: &str) {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(target: "Broker", "Dropping undecodable frame: {e}");
                return;
            }
        };

        let topic = value
            .get(BROKER_TYPE_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TOPIC)
            .to_string();

        // Handlers may subscribe or unsubscribe, so never call them under the map lock.
        let handlers: Vec<MessageHandler> = self
            .by_topic
            .get(&topic)
            .map(|subs| subs.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(target: "Broker", "No subscribers for topic {topic}");
            return;
        }

        for handler in handlers {
            handler(value.clone());
        }
    }
}

struct RoomConnection {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// WebSocket transport keeping one reconnecting socket per chat room.
pub struct WebSocketBroker {
    config: BrokerConfig,
    subscriptions: Arc<Subscriptions>,
    rooms: DashMap<String, RoomConnection>,
}

impl WebSocketBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            subscriptions: Arc::new(Subscriptions::default()),
            rooms: DashMap::new(),
        }
    }

    /// Opens sockets for every room that is not already connected.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_rooms<I, S>(&self, rooms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for room in rooms {
            self.outbound_for(room.as_ref());
        }
    }

    /// Closes the socket of `room` and stops reconnecting it.
    pub fn disconnect(&self, room: &str) {
        if let Some((_, connection)) = self.rooms.remove(room) {
            connection.task.abort();
            info!(target: "Broker", "Disconnected room {room}");
        }
    }

    /// Feeds a raw frame to subscribers as if it arrived on a socket.
    pub fn deliver_frame(&self, raw: &str) {
        self.subscriptions.dispatch(raw);
    }

    fn outbound_for(&self, room: &str) -> mpsc::UnboundedSender<String> {
        let mut connection = self
            .rooms
            .entry(room.to_string())
            .or_insert_with(|| self.spawn_room(room));
        if connection.task.is_finished() {
            *connection = self.spawn_room(room);
        }
        connection.outbound.clone()
    }

    fn spawn_room(&self, room: &str) -> RoomConnection {
        let (outbound, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_room(
            self.config.room_url(room),
            room.to_string(),
            rx,
            self.subscriptions.clone(),
            self.config.reconnect_delay,
        ));
        RoomConnection { outbound, task }
    }
}

impl Drop for WebSocketBroker {
    fn drop(&mut self) {
        for connection in self.rooms.iter() {
            connection.task.abort();
        }
    }
}

#[async_trait]
impl MessageTransport for WebSocketBroker {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> SubscriptionId {
        self.subscriptions.add(topic, handler)
    }

    fn unsubscribe(&self, topic: &str, id: &SubscriptionId) {
        self.subscriptions.remove(topic, id);
    }

    async fn publish(
        &self,
        topic: &str,
        message: Value,
        channel_id: &str,
    ) -> Result<(), anyhow::Error> {
        let Value::Object(mut fields) = message else {
            return Err(anyhow::anyhow!("only JSON objects can be published"));
        };
        fields.insert(BROKER_TYPE_KEY.to_string(), Value::String(topic.to_string()));
        let frame = Value::Object(fields).to_string();

        debug!(target: "Broker", "--> Queueing {} byte frame for room {channel_id}", frame.len());
        self.outbound_for(channel_id)
            .send(frame)
            .map_err(|_| anyhow::anyhow!("room {channel_id} is shutting down"))
    }
}

/// Owns the socket of one room: writes queued frames, dispatches inbound
/// frames and reconnects whenever the socket closes.
async fn run_room(
    url: String,
    room: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    subscriptions: Arc<Subscriptions>,
    reconnect_delay: Duration,
) {
    let mut unsent: Option<String> = None;

    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                info!(target: "Broker", "Connected room {room}");
                let (mut sink, mut stream) = socket.split();

                if let Some(frame) = unsent.take() {
                    if let Err(e) = sink.send(Message::text(frame.clone())).await {
                        warn!(target: "Broker", "Resend on room {room} failed: {e}");
                        unsent = Some(frame);
                    }
                }

                while unsent.is_none() {
                    tokio::select! {
                        frame = outbound.recv() => {
                            let Some(frame) = frame else {
                                debug!(target: "Broker", "Outbound queue of room {room} closed");
                                let _ = sink.close().await;
                                return;
                            };
                            if let Err(e) = sink.send(Message::text(frame.clone())).await {
                                warn!(target: "Broker", "Send on room {room} failed: {e}");
                                unsent = Some(frame);
                            }
                        }
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => subscriptions.dispatch(text.as_str()),
                            Some(Ok(Message::Close(_))) | None => {
                                info!(target: "Broker", "Socket of room {room} closed");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(target: "Broker", "Socket of room {room} failed: {e}");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => warn!(target: "Broker", "Failed to connect room {room}: {e}"),
        }

        debug!(target: "Broker", "Reconnecting room {room} in {reconnect_delay:?}");
        tokio::time::sleep(reconnect_delay).await;
    }
}
