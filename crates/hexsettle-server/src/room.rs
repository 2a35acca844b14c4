//! Game room management.

use hexsettle_core::config::{MAX_PLAYERS, MIN_PLAYERS};
use hexsettle_core::{
    Game, GameCommand, GameConfig, GameError, GameEvent, GameState, PlayerId, PlayerSetup,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Dice totals cannot be chosen by clients")]
    ForcedRoll,

    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    /// Engine error behind this failure, if any
    pub fn game_error(&self) -> Option<&GameError> {
        match self {
            RoomError::Game(e) => Some(e),
            _ => None,
        }
    }
}

/// A player in a game room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
    /// Seat in the game, assigned when the game starts
    pub seat: Option<PlayerId>,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            connected: true,
            seat: None,
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            connected: self.connected,
            seat: self.seat,
        }
    }
}

/// A game room that can hold multiple players.
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Order of players; becomes the seat order
    pub player_order: Vec<Uuid>,
    /// The engine (once started)
    pub game: Option<Game>,
}

impl GameRoom {
    pub fn new(id: Uuid, host_id: Uuid, host_name: String, max_players: u8) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone()));

        Self {
            id,
            name: format!("{}'s Game", host_name),
            max_players: max_players.clamp(MIN_PLAYERS as u8, MAX_PLAYERS as u8),
            host_id,
            status: RoomStatus::Waiting,
            players,
            player_order: vec![host_id],
            game: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players whose connection is still open
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.players.insert(player_id, RoomPlayer::new(player_id, name));
        self.player_order.push(player_id);
        Ok(())
    }

    /// Remove a player; returns whether the room is now empty
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if self.players.remove(&player_id).is_none() {
            return Err(RoomError::PlayerNotInRoom);
        }
        self.player_order.retain(|&id| id != player_id);

        if player_id == self.host_id {
            if let Some(&next) = self.player_order.first() {
                self.host_id = next;
            }
        }
        Ok(self.players.is_empty())
    }

    pub fn set_player_connected(&mut self, player_id: Uuid, connected: bool) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.connected = connected;
        }
    }

    /// Start the game with `config`, seating the room's players in join
    /// order. Returns the engine's start events.
    pub fn start_game(
        &mut self,
        requester_id: Uuid,
        config: Option<GameConfig>,
    ) -> Result<Vec<GameEvent>, RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }

        let mut config = config.unwrap_or_else(|| {
            // Fresh seed for every unconfigured game
            let (high, low) = Uuid::new_v4().as_u64_pair();
            GameConfig::default().with_seed(high ^ low)
        });
        config.players = self
            .player_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|p| PlayerSetup::human(p.name.clone()))
            .collect();

        let (game, events) = Game::start(config)?;

        for (seat, id) in self.player_order.iter().enumerate() {
            if let Some(player) = self.players.get_mut(id) {
                player.seat = Some(seat as PlayerId);
            }
        }
        info!(room = %self.id, seats = self.player_order.len(), "game started");
        self.game = Some(game);
        self.status = RoomStatus::InGame;

        Ok(events)
    }

    /// Apply a command on behalf of a connected player
    pub fn apply_command(
        &mut self,
        player_id: Uuid,
        command: GameCommand,
    ) -> Result<Vec<GameEvent>, RoomError> {
        if let GameCommand::RollDice { forced: Some(_) } = command {
            return Err(RoomError::ForcedRoll);
        }
        let seat = self
            .players
            .get(&player_id)
            .and_then(|p| p.seat)
            .ok_or(RoomError::PlayerNotInRoom)?;
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;

        let events = game.apply(seat, command)?;
        debug!(room = %self.id, seat, events = events.len(), "command applied");

        if game.is_over() {
            self.status = RoomStatus::Finished;
        }
        Ok(events)
    }

    pub fn game_state(&self) -> Option<GameState> {
        self.game.as_ref().map(Game::snapshot)
    }

    pub fn valid_commands(&self) -> Option<Vec<GameCommand>> {
        self.game
            .as_ref()
            .map(|g| g.valid_commands(g.current_player()))
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.game.as_ref().map(Game::current_player)
    }

    pub fn winner(&self) -> Option<(PlayerId, String)> {
        let winner = self.game.as_ref()?.winner()?;
        let id = self.player_order.get(winner as usize)?;
        let name = self.players.get(id)?.name.clone();
        Some((winner, name))
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self
                .player_order
                .iter()
                .filter_map(|id| self.players.get(id).map(|p| p.to_info()))
                .collect(),
            max_players: self.max_players,
            host_id: self.host_id,
            status: self.status,
        }
    }
}
