//! WebSocket Relay Server
//!
//! Async WebSocket server for one arena. Clients send move intents and
//! lobby commands; the server applies them to the shared session and
//! relays snapshots back out.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify, RwLock, broadcast};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::config::ServerConfig;
use crate::game::events::GameEvent;
use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ErrorCode, MoveFrame, ServerMessage};
use crate::network::session::{ArenaSession, SessionError};

/// Outbound queue length per connection.
const CLIENT_QUEUE: usize = 64;

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Listener could not be opened.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// A seated connection.
struct ConnectedClient {
    /// Seat in the arena.
    player_id: PlayerId,
    /// Connection time.
    connected_at: Instant,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;
type SharedSession = Arc<RwLock<ArenaSession>>;

/// The relay server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The arena. Every transition takes the write lock.
    session: SharedSession,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
    /// Restarts the clock phase when a round begins.
    round_started: Arc<Notify>,
}

impl GameServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let session = ArenaSession::new(config.session.clone());

        Self {
            config,
            session: Arc::new(RwLock::new(session)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
            round_started: Arc::new(Notify::new()),
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            addr = %listener.local_addr()?,
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "orb rush server listening"
        );

        let clock_handle = tokio::spawn(Self::run_clock_loop(
            self.session.clone(),
            self.config.tick_interval,
            self.round_started.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count().await >= self.config.max_connections {
                                warn!(%addr, "connection limit reached");
                                tokio::spawn(Self::reject_connection(stream, addr, "Game is full".to_string()));
                                continue;
                            }

                            debug!(%addr, "tcp connection");
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("accept failed: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("stopping listener");
                    break;
                }
            }
        }

        clock_handle.abort();
        Ok(())
    }

    /// Complete the handshake only to say no.
    async fn reject_connection(stream: TcpStream, addr: SocketAddr, message: String) {
        let mut ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!(%addr, "handshake failed: {}", e);
                return;
            }
        };
        if let Ok(text) = (ServerMessage::ConnectionRejected { message }).to_json() {
            let _ = ws_stream.send(Message::Text(text)).await;
        }
        let _ = ws_stream.close(None).await;
    }

    /// Seat a new connection and pump its messages until it closes.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let session = self.session.clone();
        let round_started = self.round_started.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(%addr, "handshake failed: {}", e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(CLIENT_QUEUE);

            // Outbound: queue -> socket
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("cannot encode server message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Take a seat
            let joined = {
                let mut session = session.write().await;
                let joined = session.join(msg_tx.clone());
                if let Ok(player_id) = joined {
                    // Fresh queue, so this cannot be full
                    let now = session.now();
                    let _ = msg_tx.try_send(ServerMessage::ConnectionAccepted {
                        player_id: player_id.get(),
                        game_state: session.snapshot(now),
                    });
                    session.broadcast_state();
                }
                joined
            };
            let player_id = match joined {
                Ok(player_id) => player_id,
                Err(e) => {
                    info!(%addr, "rejected: {}", e);
                    let _ = msg_tx
                        .send(ServerMessage::ConnectionRejected { message: e.to_string() })
                        .await;
                    drop(msg_tx);
                    let _ = sender_task.await;
                    return;
                }
            };

            clients.write().await.insert(addr, ConnectedClient {
                player_id,
                connected_at: Instant::now(),
            });

            // Inbound: socket -> session
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        let client_msg = match msg {
                            Some(Ok(Message::Text(text))) => match ClientMessage::from_json(&text) {
                                Ok(m) => m,
                                Err(e) => {
                                    debug!(%addr, "bad json: {}", e);
                                    let _ = msg_tx
                                        .send(ServerMessage::error(ErrorCode::InvalidMessage, "Invalid message format"))
                                        .await;
                                    continue;
                                }
                            },
                            Some(Ok(Message::Binary(data))) => match MoveFrame::from_bytes(&data) {
                                Ok(frame) => ClientMessage::Move(frame.to_request()),
                                Err(e) => {
                                    debug!(%addr, "bad move frame: {}", e);
                                    let _ = msg_tx
                                        .send(ServerMessage::error(ErrorCode::InvalidMessage, "Invalid move frame"))
                                        .await;
                                    continue;
                                }
                            },
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%addr, "client closed");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!(%addr, "socket error: {}", e);
                                break;
                            }
                            _ => continue,
                        };

                        if !Self::handle_client_message(player_id, client_msg, &session, &round_started, &msg_tx).await {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "server stopping".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            {
                let mut session = session.write().await;
                if session.leave(player_id) {
                    session.broadcast_state();
                }
            }
            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    player = %client.player_id,
                    secs = client.connected_at.elapsed().as_secs(),
                    %addr, "player disconnected"
                );
            }

            drop(msg_tx);
            let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;
        });
    }

    /// Handle a client message. Returns false when the client is leaving.
    ///
    /// Replies to the sender are queued after the session lock is released.
    async fn handle_client_message(
        player_id: PlayerId,
        msg: ClientMessage,
        session: &SharedSession,
        round_started: &Notify,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> bool {
        let reply = match msg {
            ClientMessage::Move(request) => {
                let mut session = session.write().await;
                let now = session.now();
                match session.handle_move(player_id, &request, now) {
                    Ok(events) => {
                        Self::broadcast_events(&session, events);
                        if session.state().started() {
                            session.broadcast_state();
                        }
                        None
                    }
                    Err(e) => {
                        debug!(player = %player_id, "move rejected: {}", e);
                        Some(e.to_message())
                    }
                }
            }
            ClientMessage::StartGame => {
                let mut session = session.write().await;
                match session.start_round(player_id) {
                    Ok(event) => {
                        session.broadcast(ServerMessage::Event(event));
                        session.broadcast_state();
                        round_started.notify_one();
                        None
                    }
                    Err(e) => {
                        if let SessionError::WorldGen(ref cause) = e {
                            error!("Round start failed: {}", cause);
                        }
                        Some(e.to_message())
                    }
                }
            }
            ClientMessage::Ping { timestamp } => {
                let server_time = session.read().await.now();
                Some(ServerMessage::Pong { timestamp, server_time })
            }
            ClientMessage::Leave => return false,
        };

        if let Some(reply) = reply {
            let _ = sender.send(reply).await;
        }
        true
    }

    fn broadcast_events(session: &ArenaSession, events: Vec<GameEvent>) {
        for event in events.into_iter().filter(GameEvent::is_broadcast) {
            session.broadcast(ServerMessage::Event(event));
        }
    }

    /// Drive the round clock.
    ///
    /// A round start resets the period, so its first step lands one full
    /// period after the start.
    async fn run_clock_loop(
        session: SharedSession,
        period: Duration,
        round_started: Arc<Notify>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut tick_interval = interval(period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        tick_interval.tick().await;

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                _ = round_started.notified() => {
                    tick_interval.reset();
                    continue;
                }
                _ = shutdown_rx.recv() => break,
            }

            let mut s = session.write().await;
            let now = s.now();
            let outcome = s.tick(now);
            if !outcome.advanced {
                continue;
            }

            Self::broadcast_events(&s, outcome.events);
            s.broadcast_state();

            if outcome.round_ended {
                info!(winner = ?outcome.winner.map(|id| id.get()), "round over");
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Seated connections.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Shared arena session.
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }
}
