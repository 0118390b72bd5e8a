//! Tokio/WebSocket driver for the client machine.
//!
//! [`SessionHandle::spawn`] starts a single driver task that owns the
//! [`Client`] machine and the WebSocket stream. The task is the session's
//! one logical event loop: inbound frames, control messages, the reconnect
//! timer, and the expiry tick are multiplexed into machine events, and the
//! actions the machine returns are executed in order. Room and message
//! state is therefore only ever mutated from this task.
//!
//! Renderers observe the session through [`SessionHandle::subscribe`],
//! which registers a notification channel and returns a [`Subscription`]
//! disposal handle; dropping (or cancelling) it deterministically
//! unregisters the channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use confab_proto::codec;

use crate::client::{Client, ClientAction, ClientConfig, ClientEvent, Notification};
use crate::dispatch::Intent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Registry = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Notification>>>>;

/// Interval between expiry ticks fed to the machine.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Control {
    Connect { token: String },
    Intent(Intent),
    Disconnect,
    Shutdown,
}

/// Handle to a running session driver task.
///
/// Dropping the handle closes the control channel, which stops the task.
#[derive(Debug)]
pub struct SessionHandle {
    control: mpsc::UnboundedSender<Control>,
    registry: Registry,
    next_subscriber: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawn the driver task for the chat service at `url`
    /// (e.g. `ws://127.0.0.1:8081`). Requires a tokio runtime.
    pub fn spawn(url: impl Into<String>, config: ClientConfig) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

        let driver = Driver {
            url: url.into(),
            client: Client::new(config),
            channel: None,
            control: control_rx,
            registry: Arc::clone(&registry),
            reconnect_at: None,
        };
        let task = tokio::spawn(driver.run());

        Self {
            control: control_tx,
            registry,
            next_subscriber: Arc::new(AtomicU64::new(0)),
            task,
        }
    }

    /// Begin connecting with this token.
    pub fn connect(&self, token: impl Into<String>) {
        let _ = self.control.send(Control::Connect { token: token.into() });
    }

    /// Submit a user intent; fire-and-forget.
    pub fn submit(&self, intent: Intent) {
        let _ = self.control.send(Control::Intent(intent));
    }

    /// Close the session; idempotent, cancels any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.control.send(Control::Disconnect);
    }

    /// Register a notification channel.
    ///
    /// Returns the disposal handle and the receiving end; dropping the
    /// handle unregisters the channel.
    pub fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<Notification>) {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.registry.lock() {
            subscribers.insert(id, tx);
        }
        (Subscription { id, registry: Arc::clone(&self.registry) }, rx)
    }

    /// Stop the driver task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.control.send(Control::Shutdown);
        let _ = self.task.await;
    }
}

/// Disposal handle for a notification subscription.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Registry,
}

impl Subscription {
    /// Unregister now; equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut subscribers) = self.registry.lock() {
            subscribers.remove(&self.id);
        }
    }
}

enum Step {
    Control(Option<Control>),
    Channel(Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>),
    ReconnectDue,
    Tick,
}

struct Driver {
    url: String,
    client: Client,
    channel: Option<WsStream>,
    control: mpsc::UnboundedReceiver<Control>,
    registry: Registry,
    reconnect_at: Option<tokio::time::Instant>,
}

impl Driver {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let reconnect_at = self.reconnect_at;
            let step = tokio::select! {
                control = self.control.recv() => Step::Control(control),
                message = async {
                    match self.channel.as_mut() {
                        Some(ws) => ws.next().await,
                        None => std::future::pending().await,
                    }
                } => Step::Channel(message),
                () = async {
                    match reconnect_at {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => Step::ReconnectDue,
                _ = ticker.tick() => Step::Tick,
            };

            match step {
                Step::Control(None | Some(Control::Shutdown)) => {
                    self.close_channel().await;
                    break;
                },
                Step::Control(Some(Control::Connect { token })) => {
                    match self.client.connect(token) {
                        Ok(actions) => self.execute(actions).await,
                        Err(error) => {
                            tracing::warn!(%error, "connect rejected");
                        },
                    }
                },
                Step::Control(Some(Control::Intent(intent))) => {
                    self.feed(ClientEvent::Intent(intent)).await;
                },
                Step::Control(Some(Control::Disconnect)) => {
                    let actions = self.client.disconnect();
                    self.execute(actions).await;
                },
                Step::Channel(Some(Ok(WsMessage::Text(text)))) => match codec::decode_event(&text) {
                    Ok(event) => self.feed(ClientEvent::EventReceived(event)).await,
                    Err(error) => {
                        // Unknown or malformed frames never crash the loop.
                        tracing::warn!(%error, "skipping undecodable frame");
                    },
                },
                Step::Channel(Some(Ok(WsMessage::Close(_))) | None) => {
                    self.channel = None;
                    self.feed(ClientEvent::ChannelClosed {
                        reason: "channel closed by server".to_string(),
                    })
                    .await;
                },
                Step::Channel(Some(Ok(_))) => {
                    // Ping/pong/binary frames carry no protocol objects.
                },
                Step::Channel(Some(Err(error))) => {
                    self.channel = None;
                    self.feed(ClientEvent::ChannelClosed { reason: error.to_string() }).await;
                },
                Step::ReconnectDue => {
                    self.reconnect_at = None;
                    self.feed(ClientEvent::ReconnectDue).await;
                },
                Step::Tick => self.feed(ClientEvent::Tick).await,
            }
        }
    }

    async fn feed(&mut self, event: ClientEvent) {
        match self.client.handle(event, Instant::now()) {
            Ok(actions) => self.execute(actions).await,
            Err(error) => {
                tracing::error!(%error, "client machine rejected event");
            },
        }
    }

    async fn execute(&mut self, actions: Vec<ClientAction>) {
        for action in actions {
            match action {
                ClientAction::OpenChannel => match connect_async(self.url.as_str()).await {
                    Ok((ws, _)) => {
                        self.channel = Some(ws);
                        Box::pin(self.feed(ClientEvent::ChannelOpened)).await;
                    },
                    Err(error) => {
                        Box::pin(
                            self.feed(ClientEvent::ChannelClosed { reason: error.to_string() }),
                        )
                        .await;
                    },
                },
                ClientAction::CloseChannel => self.close_channel().await,
                ClientAction::Send(command) => {
                    let text = match codec::encode_command(&command) {
                        Ok(text) => text,
                        Err(error) => {
                            tracing::error!(%error, "dropping unencodable command");
                            continue;
                        },
                    };
                    let Some(ws) = self.channel.as_mut() else {
                        tracing::warn!("dropping command: channel not open");
                        continue;
                    };
                    if let Err(error) = ws.send(WsMessage::Text(text)).await {
                        self.channel = None;
                        Box::pin(
                            self.feed(ClientEvent::ChannelClosed { reason: error.to_string() }),
                        )
                        .await;
                    }
                },
                ClientAction::ScheduleReconnect { delay } => {
                    self.reconnect_at = Some(tokio::time::Instant::now() + delay);
                },
                ClientAction::Publish(notification) => self.publish(&notification),
            }
        }
    }

    async fn close_channel(&mut self) {
        if let Some(mut ws) = self.channel.take() {
            let _ = ws.close(None).await;
        }
    }

    fn publish(&self, notification: &Notification) {
        if let Ok(mut subscribers) = self.registry.lock() {
            subscribers.retain(|_, tx| tx.send(notification.clone()).is_ok());
        }
    }
}
