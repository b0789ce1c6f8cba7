//! Relay Client
//!
//! WebSocket client for the relay server. Connection problems never
//! surface as errors to the caller; they arrive as
//! [`ClientEvent::Status`] updates while the client retries with a
//! linear backoff.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, debug};

use crate::game::input::Direction;
use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, MoveRequest, ServerMessage};

/// Event queue length between the connection task and the caller.
const EVENT_QUEUE: usize = 256;

/// How hard to try after a connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Delay unit; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Wait before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Attempt counter. Reset by every successful connection.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Attempts used since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Claim the next attempt, or `None` once the policy is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, self.policy.delay_for(self.attempts)))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Socket is open.
    Connected,
    /// Socket is closed; a retry may follow.
    Disconnected,
    /// Waiting `delay` before attempt `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Out of attempts. The client is done.
    GaveUp,
}

/// What the client reports to its owner.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connection status changed.
    Status(ConnectionStatus),
    /// Message from the server.
    Message(ServerMessage),
}

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Not connected right now; the message was dropped.
    #[error("Not connected")]
    NotConnected,

    /// The client was shut down or gave up.
    #[error("Client closed")]
    Closed,
}

/// Handle to a running relay connection.
pub struct RelayClient {
    outbound: mpsc::Sender<ClientMessage>,
    status: watch::Receiver<ConnectionStatus>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayClient {
    /// Start connecting to `url`. Must be called inside a tokio runtime.
    ///
    /// Events arrive on the returned receiver until the client gives up
    /// or is shut down.
    pub fn connect(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let url = url.into();
        let (outbound_tx, outbound_rx) = mpsc::channel(EVENT_QUEUE);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (shutdown_tx, _) = broadcast::channel(1);

        let connection = Connection {
            url,
            policy,
            outbound: outbound_rx,
            events: events_tx,
            status: status_tx,
            shutdown_rx: shutdown_tx.subscribe(),
        };
        let task = tokio::spawn(connection.run());

        let client = Self {
            outbound: outbound_tx,
            status: status_rx,
            shutdown_tx,
            task,
        };
        (client, events_rx)
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Queue a message for the server.
    ///
    /// Messages sent while disconnected are dropped, not buffered.
    pub async fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        match self.status() {
            ConnectionStatus::Connected => {}
            ConnectionStatus::GaveUp => return Err(ClientError::Closed),
            _ => return Err(ClientError::NotConnected),
        }
        self.outbound.send(message).await.map_err(|_| ClientError::Closed)
    }

    /// Send a move intent for `player_id`.
    pub async fn send_move(&self, player_id: PlayerId, direction: Direction) -> Result<(), ClientError> {
        let request = MoveRequest::new(player_id.get(), direction.dx().into(), direction.dy().into());
        self.send(ClientMessage::Move(request)).await
    }

    /// Close the connection and stop reconnecting.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

/// Why a live connection ended.
enum Ended {
    /// Owner asked to stop.
    Shutdown,
    /// Server closed or the socket failed.
    Dropped,
}

/// State owned by the connection task.
struct Connection {
    url: String,
    policy: ReconnectPolicy,
    outbound: mpsc::Receiver<ClientMessage>,
    events: mpsc::Sender<ClientEvent>,
    status: watch::Sender<ConnectionStatus>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Connection {
    async fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
        let _ = self.events.send(ClientEvent::Status(status)).await;
    }

    async fn run(mut self) {
        let mut reconnect = ReconnectState::new(self.policy);

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    info!(url = %self.url, "connected to relay");
                    reconnect.reset();
                    self.set_status(ConnectionStatus::Connected).await;

                    let ended = self.pump(ws).await;
                    self.set_status(ConnectionStatus::Disconnected).await;
                    if let Ended::Shutdown = ended {
                        return;
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, "connection failed: {}", e);
                }
            }

            let Some((attempt, delay)) = reconnect.next_attempt() else {
                warn!(attempts = reconnect.attempts(), "giving up on relay");
                self.set_status(ConnectionStatus::GaveUp).await;
                return;
            };
            info!(attempt, max = self.policy.max_attempts, "reconnecting in {:?}", delay);
            self.set_status(ConnectionStatus::Reconnecting { attempt, delay }).await;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.recv() => {
                    self.set_status(ConnectionStatus::Disconnected).await;
                    return;
                }
            }
        }
    }

    /// Move messages both ways until the socket ends.
    async fn pump<S>(&mut self, ws: tokio_tungstenite::WebSocketStream<S>) -> Ended
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut ws_sender, mut ws_receiver) = ws.split();

        loop {
            tokio::select! {
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                        Ok(msg) => {
                            let _ = self.events.send(ClientEvent::Message(msg)).await;
                        }
                        Err(e) => debug!("Unreadable server message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => return Ended::Dropped,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return Ended::Dropped;
                    }
                    Some(Ok(_)) => {}
                },
                outgoing = self.outbound.recv() => {
                    let Some(msg) = outgoing else {
                        let _ = ws_sender.close().await;
                        return Ended::Shutdown;
                    };
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            warn!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        return Ended::Dropped;
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    let _ = ws_sender.close().await;
                    return Ended::Shutdown;
                }
            }
        }
    }
}
