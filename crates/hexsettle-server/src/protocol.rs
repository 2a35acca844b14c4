//! WebSocket protocol messages for Hexsettle multiplayer.

use hexsettle_core::{GameCommand, GameConfig, GameError, GameEvent, GameState, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game room
    CreateRoom { player_name: String, max_players: u8 },

    /// Join an existing room
    JoinRoom { room_id: Uuid, player_name: String },

    /// Leave current room
    LeaveRoom,

    /// Start the game (host only). Seats replace the configured player list.
    StartGame {
        #[serde(default)]
        config: Option<GameConfig>,
    },

    /// Submit a game command
    Command { command: GameCommand },

    /// Send chat message
    Chat { message: String },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned connection ID
    Welcome { player_id: Uuid },

    RoomCreated { room_id: Uuid },

    JoinedRoom { room: RoomInfo },

    LeftRoom,

    /// Room state updated (player joined/left/disconnected)
    RoomUpdated { room: RoomInfo },

    /// Game started, with the events of its creation
    GameStarted {
        state: Box<GameState>,
        events: Vec<GameEvent>,
    },

    /// Game state updated
    GameState { state: Box<GameState> },

    /// Outcome of the sender's command
    CommandResult {
        success: bool,
        events: Vec<GameEvent>,
        error: Option<String>,
        /// Structured engine error when the engine rejected the command
        reason: Option<GameError>,
    },

    /// Valid commands for the current player
    ValidCommands { commands: Vec<GameCommand> },

    /// Current player changed
    TurnChanged { player: PlayerId },

    ChatMessage { player_name: String, message: String },

    /// List of rooms waiting for players
    RoomList { rooms: Vec<RoomInfo> },

    Error { message: String },

    Pong,

    GameOver { winner: PlayerId, winner_name: String },
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
    /// Seat in the running game
    pub seat: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}
