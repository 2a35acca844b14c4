//! Errors returned by engine commands.

use crate::actions::CommandKind;
use crate::board::{PlayerId, Resource};
use crate::config::ConfigError;
use crate::phase::Phase;
use crate::placement::PlacementViolation;
use crate::player::PieceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a command was rejected. A rejected command never changes the game.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("{command} is not allowed during {phase}")]
    IllegalStateTransition { command: CommandKind, phase: Phase },

    #[error("it is player {current}'s turn, not player {player}'s")]
    NotYourTurn { player: PlayerId, current: PlayerId },

    #[error("illegal placement: {0}")]
    IllegalPlacement(#[from] PlacementViolation),

    #[error("player {player} needs {needed} {resource} but has {available}")]
    InsufficientResources {
        player: PlayerId,
        resource: Resource,
        needed: u32,
        available: u32,
    },

    #[error("the bank has {available} {resource}, {needed} needed")]
    BankDepleted {
        resource: Resource,
        needed: u32,
        available: u32,
    },

    #[error("there is no player {0}")]
    UnknownPlayer(PlayerId),

    #[error("player {0} has resigned")]
    InactivePlayer(PlayerId),

    #[error("invalid trade: {0}")]
    InvalidTrade(String),

    #[error("roll {value} is outside {min}..={max}")]
    InvalidRoll { value: u8, min: u8, max: u8 },

    #[error("player {player} has no {piece} pieces left")]
    NoPiecesRemaining { player: PlayerId, piece: PieceKind },

    #[error("snapshot rejected: {0}")]
    Snapshot(String),
}
