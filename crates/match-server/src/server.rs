//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, ServerMessage, SessionInfo};
use crate::session::{GameSession, LevelResult};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use match_core::{Position, ProgressStore};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active sessions. Holding an entry's write guard is what
    /// serializes moves on that session.
    pub sessions: DashMap<Uuid, GameSession>,
    /// Mapping from player ID to the session they own or watch
    pub player_sessions: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Completed levels
    pub progress: Mutex<ProgressStore>,
}

impl ServerState {
    pub fn new(progress: ProgressStore) -> Self {
        Self {
            sessions: DashMap::new(),
            player_sessions: DashMap::new(),
            player_senders: DashMap::new(),
            progress: Mutex::new(progress),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Send a message to each listed player.
    pub fn send_to_all(&self, players: &[Uuid], msg: ServerMessage) {
        for player_id in players {
            self.send_to_player(*player_id, msg.clone());
        }
    }

    /// Broadcast a message to everyone in a session.
    ///
    /// Must not be called while holding a guard on that session.
    pub fn broadcast_to_session(&self, session_id: Uuid, msg: ServerMessage) {
        let members: Vec<Uuid> = match self.sessions.get(&session_id) {
            Some(session) => session.members().collect(),
            None => return,
        };
        self.send_to_all(&members, msg);
    }

    /// Get list of active sessions.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|s| s.to_info()).collect()
    }

    /// Record a completed level in the progress store.
    ///
    /// Writes the progress file while holding the store lock; async callers
    /// go through [`spawn_record_completion`].
    pub fn record_completion(&self, result: LevelResult) {
        let Ok(mut store) = self.progress.lock() else {
            error!("Progress store lock poisoned; dropping result for level {}", result.level);
            return;
        };
        if let Err(e) =
            store.register_level_completion(result.level, result.stars as i32, i64::from(result.score))
        {
            error!("Failed to save progress: {}", e);
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ProgressStore::in_memory())
    }
}

/// Record a completion on the blocking pool so the file write stays off the
/// async workers.
pub fn spawn_record_completion(state: &Arc<ServerState>, result: LevelResult) -> JoinHandle<()> {
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || state.record_completion(result))
}

fn board_state(session: &GameSession) -> ServerMessage {
    ServerMessage::BoardState {
        session_id: session.id,
        state: session.snapshot(),
        bonus_score: session.bonus_score(),
    }
}

fn error_message(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Fruit Match server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a player ID
    let player_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    // Send welcome message
    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_to_player(player_id, error_message("Malformed message"));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    leave_session(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::StartSession {
            player_name,
            level,
            seed,
        } => {
            leave_session(player_id, state);

            let session_id = Uuid::new_v4();
            let session = GameSession::new(session_id, player_id, player_name, level, seed);
            let info = session.to_info();
            let board = board_state(&session);
            let stuck = info.status == crate::protocol::SessionStatus::Stuck;

            state.sessions.insert(session_id, session);
            state.player_sessions.insert(player_id, session_id);
            info!("Player {} started session {} at level {}", player_id, session_id, level);

            state.send_to_player(player_id, ServerMessage::SessionStarted { session: info });
            state.send_to_player(player_id, board);
            if stuck {
                state.send_to_player(player_id, ServerMessage::NoMovesLeft);
            }
        }

        ClientMessage::WatchSession { session_id } => {
            if state.player_sessions.get(&player_id).as_deref() == Some(&session_id) {
                state.send_to_player(player_id, error_message("Already in this session"));
                return;
            }
            leave_session(player_id, state);

            let Some(mut session) = state.sessions.get_mut(&session_id) else {
                state.send_to_player(player_id, error_message("Session not found"));
                return;
            };

            match session.add_spectator(player_id) {
                Ok(()) => {
                    let info = session.to_info();
                    let board = board_state(&session);
                    let others: Vec<Uuid> = session.members().filter(|&id| id != player_id).collect();
                    drop(session); // Release lock before sending

                    state.player_sessions.insert(player_id, session_id);
                    state.send_to_player(player_id, ServerMessage::Watching { session: info.clone() });
                    state.send_to_player(player_id, board);
                    state.send_to_all(&others, ServerMessage::SessionUpdated { session: info });
                }
                Err(e) => {
                    drop(session);
                    state.send_to_player(player_id, error_message(e.to_string()));
                }
            }
        }

        ClientMessage::LeaveSession => {
            if leave_session(player_id, state) {
                state.send_to_player(player_id, ServerMessage::LeftSession);
            } else {
                state.send_to_player(player_id, error_message("Not in a session"));
            }
        }

        ClientMessage::Move { from, to } => handle_move(player_id, from, to, state),

        ClientMessage::RequestHint => {
            let Some(session_id) = current_session(player_id, state) else {
                state.send_to_player(player_id, error_message("Not in a session"));
                return;
            };
            let hint = state.sessions.get(&session_id).map(|s| s.hint(player_id));
            match hint {
                Some(Ok(suggestion)) => {
                    state.send_to_player(player_id, ServerMessage::Hint { suggestion });
                }
                Some(Err(e)) => state.send_to_player(player_id, error_message(e.to_string())),
                None => state.send_to_player(player_id, error_message("Session not found")),
            }
        }

        ClientMessage::RestartLevel => {
            let Some(session_id) = current_session(player_id, state) else {
                state.send_to_player(player_id, error_message("Not in a session"));
                return;
            };
            let Some(mut session) = state.sessions.get_mut(&session_id) else {
                return;
            };

            match session.restart(player_id) {
                Ok(()) => {
                    let info = session.to_info();
                    let board = board_state(&session);
                    let members: Vec<Uuid> = session.members().collect();
                    drop(session);

                    info!("Session {} restarted", session_id);
                    state.send_to_all(&members, ServerMessage::SessionUpdated { session: info });
                    state.send_to_all(&members, board);
                }
                Err(e) => {
                    drop(session);
                    state.send_to_player(player_id, error_message(e.to_string()));
                }
            }
        }

        ClientMessage::ListSessions => {
            let sessions = state.list_sessions();
            state.send_to_player(player_id, ServerMessage::SessionList { sessions });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Apply a move while holding the session's write guard.
fn handle_move(player_id: Uuid, from: Position, to: Position, state: &Arc<ServerState>) {
    let Some(session_id) = current_session(player_id, state) else {
        state.send_to_player(player_id, error_message("Not in a session"));
        return;
    };
    let Some(mut session) = state.sessions.get_mut(&session_id) else {
        state.send_to_player(player_id, error_message("Session not found"));
        return;
    };

    match session.apply_move(player_id, from, to) {
        Ok(report) => {
            let board = board_state(&session);
            let info = session.to_info();
            let members: Vec<Uuid> = session.members().collect();
            drop(session);

            debug!(
                "Session {}: move {} -> {} scored {}",
                session_id, from, to, report.outcome.points
            );

            state.send_to_player(
                player_id,
                ServerMessage::MoveResult {
                    accepted: true,
                    points: report.outcome.points,
                    events: report.outcome.events,
                    error: None,
                },
            );
            state.send_to_all(&members, board);

            if let Some(result) = report.completed {
                info!(
                    "Session {} completed level {} with {} stars",
                    session_id, result.level, result.stars
                );
                spawn_record_completion(state, result);
                state.send_to_all(
                    &members,
                    ServerMessage::LevelComplete {
                        level: result.level,
                        stars: result.stars,
                        score: result.score,
                    },
                );
                state.send_to_all(&members, ServerMessage::SessionUpdated { session: info });
            } else if report.stuck {
                state.send_to_all(&members, ServerMessage::NoMovesLeft);
                state.send_to_all(&members, ServerMessage::SessionUpdated { session: info });
            }
        }
        Err(e) => {
            drop(session);
            state.send_to_player(
                player_id,
                ServerMessage::MoveResult {
                    accepted: false,
                    points: 0,
                    events: vec![],
                    error: Some(e.to_string()),
                },
            );
        }
    }
}

fn current_session(player_id: Uuid, state: &ServerState) -> Option<Uuid> {
    state.player_sessions.get(&player_id).map(|entry| *entry)
}

/// Take a player out of whatever session they are in.
///
/// An owner leaving closes the session for everyone. Returns false if the
/// player was not in a session.
fn leave_session(player_id: Uuid, state: &ServerState) -> bool {
    let Some((_, session_id)) = state.player_sessions.remove(&player_id) else {
        return false;
    };
    let Some(mut session) = state.sessions.get_mut(&session_id) else {
        return true;
    };

    match session.remove_player(player_id) {
        Ok(true) => {
            let spectators: Vec<Uuid> = session.spectators.iter().copied().collect();
            drop(session);
            state.sessions.remove(&session_id);

            for spectator in &spectators {
                state.player_sessions.remove(spectator);
            }
            state.send_to_all(&spectators, error_message("Session closed by owner"));
            state.send_to_all(&spectators, ServerMessage::LeftSession);
            info!("Session {} closed", session_id);
        }
        Ok(false) => {
            let info = session.to_info();
            drop(session);
            state.broadcast_to_session(session_id, ServerMessage::SessionUpdated { session: info });
        }
        Err(e) => {
            drop(session);
            warn!("Player {} leaving session {}: {}", player_id, session_id, e);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionStatus;

    fn connect(state: &ServerState) -> (Uuid, mpsc::UnboundedReceiver<ServerMessage>) {
        let player_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.player_senders.insert(player_id, tx);
        (player_id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn start(state: &Arc<ServerState>, player_id: Uuid, seed: u64) -> Uuid {
        handle_message(
            player_id,
            ClientMessage::StartSession {
                player_name: "Ana".to_string(),
                level: 1,
                seed: Some(seed),
            },
            state,
        );
        current_session(player_id, state).expect("session should be registered")
    }

    #[tokio::test]
    async fn test_start_session_sends_board() {
        let state = Arc::new(ServerState::default());
        let (player, mut rx) = connect(&state);

        let session_id = start(&state, player, 1);

        let messages = drain(&mut rx);
        assert!(matches!(messages[0], ServerMessage::SessionStarted { .. }));
        assert!(matches!(
            &messages[1],
            ServerMessage::BoardState { session_id: id, .. } if *id == session_id
        ));
        assert_eq!(state.list_sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_move_is_broadcast_to_spectators() {
        let state = Arc::new(ServerState::default());
        let (owner, mut owner_rx) = connect(&state);
        let (watcher, mut watcher_rx) = connect(&state);

        let session_id = (0..100)
            .map(|seed| start(&state, owner, seed))
            .find(|id| state.sessions.get(id).unwrap().status == SessionStatus::Playing)
            .expect("a playable seed");
        handle_message(watcher, ClientMessage::WatchSession { session_id }, &state);
        drain(&mut owner_rx);
        drain(&mut watcher_rx);

        let hint = state.sessions.get(&session_id).unwrap().hint(owner).unwrap().unwrap();
        handle_message(owner, ClientMessage::Move { from: hint.from, to: hint.to }, &state);

        let owner_msgs = drain(&mut owner_rx);
        assert!(matches!(
            owner_msgs[0],
            ServerMessage::MoveResult { accepted: true, .. }
        ));
        let watcher_msgs = drain(&mut watcher_rx);
        assert!(watcher_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::BoardState { .. })));
    }

    #[tokio::test]
    async fn test_spectator_cannot_move() {
        let state = Arc::new(ServerState::default());
        let (owner, _owner_rx) = connect(&state);
        let (watcher, mut watcher_rx) = connect(&state);

        let session_id = start(&state, owner, 5);
        handle_message(watcher, ClientMessage::WatchSession { session_id }, &state);
        drain(&mut watcher_rx);

        handle_message(
            watcher,
            ClientMessage::Move {
                from: Position::new(0, 0),
                to: Position::new(0, 1),
            },
            &state,
        );

        let msgs = drain(&mut watcher_rx);
        assert!(matches!(
            msgs[0],
            ServerMessage::MoveResult { accepted: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_owner_leaving_closes_session() {
        let state = Arc::new(ServerState::default());
        let (owner, _owner_rx) = connect(&state);
        let (watcher, mut watcher_rx) = connect(&state);

        let session_id = start(&state, owner, 9);
        handle_message(watcher, ClientMessage::WatchSession { session_id }, &state);
        drain(&mut watcher_rx);

        handle_message(owner, ClientMessage::LeaveSession, &state);

        assert!(state.sessions.get(&session_id).is_none());
        assert!(current_session(watcher, &state).is_none());
        let msgs = drain(&mut watcher_rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::LeftSession)));
    }

    #[test]
    fn test_completion_is_recorded() {
        let state = ServerState::default();
        state.record_completion(LevelResult {
            level: 7,
            stars: 2,
            score: 480,
        });

        let store = state.progress.lock().unwrap();
        assert_eq!(store.progress().highest_level, 7);
        assert_eq!(store.progress().total_stars, 2);
        assert_eq!(store.progress().total_score, 480);
    }

    #[tokio::test]
    async fn test_completion_is_recorded_on_blocking_pool() {
        let state = Arc::new(ServerState::default());
        spawn_record_completion(
            &state,
            LevelResult {
                level: 12,
                stars: 3,
                score: 1300,
            },
        )
        .await
        .unwrap();

        let store = state.progress.lock().unwrap();
        assert_eq!(store.progress().highest_level, 12);
        assert_eq!(store.progress().total_stars, 3);
    }
}
