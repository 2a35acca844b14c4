//! Hexsettle - a configurable settlement-and-road hex board game engine
//!
//! This crate provides the core game logic for Hexsettle, including:
//! - Hex coordinate system for the game board
//! - An index-based board graph of tiles, intersections and edges
//! - Player inventories, the bank and resource production
//! - Placement rules and a turn/phase state machine
//! - A rule engine that validates and applies every command
//!
//! # Architecture
//!
//! The engine is pure and synchronous. All randomness comes from the game
//! seed, so a seed plus a command log reproduces a game exactly. The server
//! crate hosts games over WebSockets on top of it.
//!
//! # Modules
//!
//! - [`hex`]: Coordinate system for hex tiles, vertices, and edges
//! - [`board`]: Board graph, generation and graph queries
//! - [`config`]: Game configuration and its validation
//! - [`dice`]: Injected dice sources
//! - [`player`]: Player state and resources
//! - [`production`]: Resource production and the bank
//! - [`placement`]: Building and road placement rules
//! - [`phase`]: Turn and phase state machine
//! - [`game`]: The rule engine
//! - [`bot`]: Computer players

pub mod actions;
pub mod board;
pub mod bot;
pub mod config;
pub mod dice;
pub mod error;
pub mod game;
pub mod hex;
pub mod phase;
pub mod placement;
pub mod player;
pub mod production;

// Re-export commonly used types
pub use actions::{CommandKind, GameCommand, GameEvent};
pub use board::{
    Board, Building, BuildingKind, Edge, EdgeId, Intersection, IntersectionId, NodeId, PlayerId,
    Resource, Road, Terrain, Tile, TileId,
};
pub use bot::{Bot, BotDifficulty};
pub use config::{BoardShape, ConfigError, DiceConfig, GameConfig, PlayerSetup};
pub use dice::{DiceSource, SeededDice};
pub use error::GameError;
pub use game::{Game, GameState};
pub use hex::{EdgeCoord, EdgeDirection, HexCoord, VertexCoord, VertexDirection};
pub use phase::{Phase, SetupPiece, SetupStep};
pub use placement::{PlacementContext, PlacementViolation, Verdict};
pub use player::{PieceKind, Player, PlayerColor, ResourceHand};
pub use production::{Bank, Production, ScarcityPolicy};
