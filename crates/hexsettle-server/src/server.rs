//! WebSocket transport: one task per connection, rooms shared through `DashMap`s.

use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::GameRoom;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hexsettle_core::{GameCommand, GameConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared by every connection task.
pub struct ServerState {
    /// All rooms; a room's engine is only touched under its entry lock
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Room each connection sits in
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Outgoing queue of each connection
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Rules for games whose host sends no configuration
    pub default_config: Option<GameConfig>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
            default_config: None,
        }
    }

    pub fn with_default_config(config: GameConfig) -> Self {
        Self {
            default_config: Some(config),
            ..Self::new()
        }
    }

    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    fn send_error(&self, player_id: Uuid, message: impl Into<String>) {
        self.send_to_player(
            player_id,
            ServerMessage::Error {
                message: message.into(),
            },
        );
    }

    /// Send to everyone in a room. The room entry is released before sending.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        let members: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.players.keys().copied().collect(),
            None => return,
        };
        for player_id in members {
            self.send_to_player(player_id, msg.clone());
        }
    }

    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        let members: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.players.keys().copied().filter(|id| *id != except).collect(),
            None => return,
        };
        for player_id in members {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Rooms still open for joining
    pub fn get_waiting_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }

    fn room_of(&self, player_id: Uuid) -> Option<Uuid> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept connections until the listener fails.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Hexsettle server listening on {}", addr);

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

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let player_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = serde_json::to_string(&ServerMessage::Welcome { player_id })?;
    ws_sender.send(Message::Text(welcome)).await?;

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode message: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_error(player_id, format!("Invalid message: {e}"));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => state.send_to_player(player_id, ServerMessage::Pong),
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

fn handle_message(player_id: Uuid, msg: ClientMessage, state: &ServerState) {
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            max_players,
        } => {
            if state.room_of(player_id).is_some() {
                state.send_error(player_id, "Already in a room");
                return;
            }
            let room_id = Uuid::new_v4();
            let room = GameRoom::new(room_id, player_id, player_name, max_players);
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);
            info!(room = %room_id, host = %player_id, "room created");

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info });
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => join_room(player_id, room_id, player_name, state),

        ClientMessage::LeaveRoom => leave_room(player_id, state),

        ClientMessage::StartGame { config } => start_game(player_id, config, state),

        ClientMessage::Command { command } => apply_command(player_id, command, state),

        ClientMessage::Chat { message } => {
            if let Some(room_id) = state.room_of(player_id) {
                let player_name = state
                    .rooms
                    .get(&room_id)
                    .and_then(|r| r.players.get(&player_id).map(|p| p.name.clone()))
                    .unwrap_or_else(|| "Unknown".to_string());

                state.broadcast_to_room(
                    room_id,
                    ServerMessage::ChatMessage {
                        player_name,
                        message,
                    },
                );
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => state.send_to_player(player_id, ServerMessage::Pong),
    }
}

fn join_room(player_id: Uuid, room_id: Uuid, player_name: String, state: &ServerState) {
    if state.room_of(player_id).is_some() {
        state.send_error(player_id, "Already in a room");
        return;
    }
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        state.send_error(player_id, "Room not found");
        return;
    };

    match room.add_player(player_id, player_name) {
        Ok(()) => {
            let room_info = room.to_info();
            // Release the entry before broadcasting
            drop(room);
            state.player_rooms.insert(player_id, room_id);
            info!(room = %room_id, player = %player_id, "player joined");

            state.send_to_player(
                player_id,
                ServerMessage::JoinedRoom {
                    room: room_info.clone(),
                },
            );
            state.broadcast_to_room_except(
                room_id,
                player_id,
                ServerMessage::RoomUpdated { room: room_info },
            );
        }
        Err(e) => state.send_error(player_id, e.to_string()),
    }
}

fn leave_room(player_id: Uuid, state: &ServerState) {
    let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
        state.send_error(player_id, "Not in a room");
        return;
    };
    release_seat(player_id, room_id, state);
    state.send_to_player(player_id, ServerMessage::LeftRoom);
}

fn start_game(player_id: Uuid, config: Option<GameConfig>, state: &ServerState) {
    let Some(room_id) = state.room_of(player_id) else {
        state.send_error(player_id, "Not in a room");
        return;
    };
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return;
    };

    let config = config.or_else(|| {
        state
            .default_config
            .clone()
            .map(|c| c.with_seed(Uuid::new_v4().as_u64_pair().0))
    });
    match room.start_game(player_id, config) {
        Ok(events) => {
            let game_state = room.game_state();
            let commands = room.valid_commands().unwrap_or_default();
            let current = room.current_player();
            drop(room);

            if let Some(game_state) = game_state {
                state.broadcast_to_room(
                    room_id,
                    ServerMessage::GameStarted {
                        state: Box::new(game_state),
                        events,
                    },
                );
            }
            state.broadcast_to_room(room_id, ServerMessage::ValidCommands { commands });
            if let Some(player) = current {
                state.broadcast_to_room(room_id, ServerMessage::TurnChanged { player });
            }
        }
        Err(e) => {
            warn!(room = %room_id, "failed to start game: {}", e);
            state.send_error(player_id, e.to_string());
        }
    }
}

fn apply_command(player_id: Uuid, command: GameCommand, state: &ServerState) {
    let Some(room_id) = state.room_of(player_id) else {
        state.send_error(player_id, "Not in a room");
        return;
    };
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return;
    };

    let previous = room.current_player();
    match room.apply_command(player_id, command) {
        Ok(events) => {
            let game_state = room.game_state();
            let commands = room.valid_commands().unwrap_or_default();
            let current = room.current_player();
            let winner = room.winner();
            drop(room);

            state.send_to_player(
                player_id,
                ServerMessage::CommandResult {
                    success: true,
                    events,
                    error: None,
                    reason: None,
                },
            );
            if let Some(game_state) = game_state {
                state.broadcast_to_room(
                    room_id,
                    ServerMessage::GameState {
                        state: Box::new(game_state),
                    },
                );
            }
            state.broadcast_to_room(room_id, ServerMessage::ValidCommands { commands });
            if let Some(player) = current.filter(|p| Some(*p) != previous) {
                state.broadcast_to_room(room_id, ServerMessage::TurnChanged { player });
            }
            if let Some((winner, winner_name)) = winner {
                info!(room = %room_id, winner, "game over");
                state.broadcast_to_room(room_id, ServerMessage::GameOver { winner, winner_name });
            }
        }
        Err(e) => {
            drop(room);
            state.send_to_player(
                player_id,
                ServerMessage::CommandResult {
                    success: false,
                    events: Vec::new(),
                    error: Some(e.to_string()),
                    reason: e.game_error().cloned(),
                },
            );
        }
    }
}

/// Leave the room. In a running game the seat stays, resigned and
/// disconnected, and the room closes once no seat is connected.
fn release_seat(player_id: Uuid, room_id: Uuid, state: &ServerState) {
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return;
    };

    if room.status == RoomStatus::InGame {
        let previous = room.current_player();
        if let Err(e) = room.apply_command(player_id, GameCommand::Resign) {
            warn!(room = %room_id, player = %player_id, "resign on leave failed: {}", e);
        }
        room.set_player_connected(player_id, false);
        if room.connected_count() == 0 {
            drop(room);
            state.rooms.remove(&room_id);
            info!(room = %room_id, "room closed, every seat left");
            return;
        }

        let room_info = room.to_info();
        let game_state = room.game_state();
        let commands = room.valid_commands().unwrap_or_default();
        let current = room.current_player();
        let winner = room.winner();
        drop(room);

        state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
        if let Some(game_state) = game_state {
            state.broadcast_to_room(
                room_id,
                ServerMessage::GameState {
                    state: Box::new(game_state),
                },
            );
        }
        state.broadcast_to_room(room_id, ServerMessage::ValidCommands { commands });
        if let Some(player) = current.filter(|p| Some(*p) != previous) {
            state.broadcast_to_room(room_id, ServerMessage::TurnChanged { player });
        }
        if let Some((winner, winner_name)) = winner {
            state.broadcast_to_room(room_id, ServerMessage::GameOver { winner, winner_name });
        }
        return;
    }

    // Seats of a finished game stay listed after their players leave
    let is_empty = room.remove_player(player_id).unwrap_or(false) || room.connected_count() == 0;
    if is_empty {
        drop(room);
        state.rooms.remove(&room_id);
        info!(room = %room_id, "room closed");
    } else {
        let room_info = room.to_info();
        drop(room);
        state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    }
}

/// Connection lost without a `LeaveRoom`. Connections never come back under
/// the same id, so this is a leave.
fn handle_disconnect(player_id: Uuid, state: &ServerState) {
    if let Some((_, room_id)) = state.player_rooms.remove(&player_id) {
        release_seat(player_id, room_id, state);
    }
}
