//! Game commands that players can issue.
//!
//! This module defines every command the engine accepts and the events
//! that result from those commands.

use crate::board::{BuildingKind, EdgeId, IntersectionId, PlayerId, Resource};
use crate::phase::Phase;
use crate::player::ResourceHand;
use crate::production::Production;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All possible commands a player can issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameCommand {
    /// Roll the dice. A forced total skips the random draw.
    RollDice { forced: Option<u8> },

    // ==================== Building ====================
    /// Put a settlement on an intersection (free during setup)
    PlaceBuilding(IntersectionId),
    /// Lay a road on an edge (free during setup)
    PlaceRoad(EdgeId),
    /// Turn an own settlement into a city
    UpgradeCity(IntersectionId),

    // ==================== Trading ====================
    /// Exchange with another player; completes immediately or not at all
    ProposeTrade {
        to: PlayerId,
        offer: ResourceHand,
        request: ResourceHand,
    },
    /// Give the bank its ratio of one resource for one unit of another
    BankTrade { give: Resource, receive: Resource },

    // ==================== Turn Management ====================
    EndTurn,
    /// Leave the game; the seat stays in turn order as inactive
    Resign,
}

impl GameCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            GameCommand::RollDice { .. } => CommandKind::RollDice,
            GameCommand::PlaceBuilding(_) => CommandKind::PlaceBuilding,
            GameCommand::PlaceRoad(_) => CommandKind::PlaceRoad,
            GameCommand::UpgradeCity(_) => CommandKind::UpgradeCity,
            GameCommand::ProposeTrade { .. } => CommandKind::ProposeTrade,
            GameCommand::BankTrade { .. } => CommandKind::BankTrade,
            GameCommand::EndTurn => CommandKind::EndTurn,
            GameCommand::Resign => CommandKind::Resign,
        }
    }
}

/// Command names without payloads, used for authorization and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    RollDice,
    PlaceBuilding,
    PlaceRoad,
    UpgradeCity,
    ProposeTrade,
    BankTrade,
    EndTurn,
    Resign,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::RollDice,
        CommandKind::PlaceBuilding,
        CommandKind::PlaceRoad,
        CommandKind::UpgradeCity,
        CommandKind::ProposeTrade,
        CommandKind::BankTrade,
        CommandKind::EndTurn,
        CommandKind::Resign,
    ];
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::RollDice => "rolling the dice",
            CommandKind::PlaceBuilding => "placing a building",
            CommandKind::PlaceRoad => "placing a road",
            CommandKind::UpgradeCity => "upgrading to a city",
            CommandKind::ProposeTrade => "trading with a player",
            CommandKind::BankTrade => "trading with the bank",
            CommandKind::EndTurn => "ending the turn",
            CommandKind::Resign => "resigning",
        })
    }
}

/// Events that occur as a result of commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A game was created
    GameStarted {
        players: Vec<String>,
        first_player: PlayerId,
        seed: u64,
    },

    /// The phase machine moved
    PhaseChanged { phase: Phase, player: PlayerId },

    /// Dice were rolled (`faces` is empty for a forced total)
    DiceRolled {
        player: PlayerId,
        faces: Vec<u8>,
        total: u8,
    },

    /// Production was paid out after a roll, possibly to nobody
    ResourcesProduced {
        roll: u8,
        granted: Production,
        withheld: ResourceHand,
    },

    /// A setup settlement collected its neighbouring tiles' resources
    SetupResourcesGranted {
        player: PlayerId,
        resources: ResourceHand,
    },

    BuildingPlaced {
        player: PlayerId,
        intersection: IntersectionId,
        kind: BuildingKind,
    },

    CityUpgraded {
        player: PlayerId,
        intersection: IntersectionId,
    },

    RoadPlaced { player: PlayerId, edge: EdgeId },

    /// Two players exchanged resources
    TradeCompleted {
        from: PlayerId,
        to: PlayerId,
        offered: ResourceHand,
        requested: ResourceHand,
    },

    BankTradeCompleted {
        player: PlayerId,
        gave: Resource,
        gave_count: u32,
        received: Resource,
    },

    /// Longest road changed hands
    LongestRoadChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        length: u32,
    },

    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    PlayerResigned { player: PlayerId },

    /// A player won the game
    GameWon {
        player: PlayerId,
        victory_points: u32,
    },
}
