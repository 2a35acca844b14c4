//! Game configuration.
//!
//! Every rule constant lives here with a default, so a game can be described
//! entirely by a [`GameConfig`] value (or a JSON document deserialized into
//! one). The configuration is checked once by [`GameConfig::validate`] and is
//! immutable after the game starts.

use crate::board::{PlayerId, Resource, Terrain};
use crate::hex::HexCoord;
use crate::player::{PlayerColor, ResourceHand};
use crate::production::ScarcityPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fewest seats a game can have
pub const MIN_PLAYERS: usize = 2;
/// Most seats a game can have
pub const MAX_PLAYERS: usize = 6;
/// Most dice that can be rolled at once
pub const MAX_DICE: u8 = 4;
/// Largest supported die
pub const MAX_DIE_SIDES: u8 = 9;

/// A configuration fault detected before the game starts
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("need between {min} and {max} players, got {actual}")]
    PlayerCount { min: usize, max: usize, actual: usize },

    #[error("first player {first} is not one of the {players} seats")]
    FirstPlayer { first: PlayerId, players: usize },

    #[error("dice must be 1-{max_count} dice with 2-{max_sides} sides, got {count}d{sides}")]
    Dice {
        count: u8,
        sides: u8,
        max_count: u8,
        max_sides: u8,
    },

    #[error("board layout is empty")]
    EmptyLayout,

    #[error("board layout lists tile {0:?} more than once")]
    DuplicateTile(HexCoord),

    #[error("board layout is not connected: tile {0:?} is unreachable")]
    DisconnectedLayout(HexCoord),

    #[error("{deserts} deserts requested for {tiles} tiles")]
    TooManyDeserts { deserts: usize, tiles: usize },

    #[error("terrain list has {actual} entries for {expected} tiles")]
    TerrainCount { expected: usize, actual: usize },

    #[error("number list has {actual} entries for {expected} producing tiles")]
    NumberCount { expected: usize, actual: usize },

    #[error("production number {value} cannot be rolled with {count}d{sides}")]
    UnrollableNumber { value: u8, count: u8, sides: u8 },

    #[error("{tiles} tiles are too few for {players} players (need {required})")]
    TooFewTiles {
        tiles: usize,
        players: usize,
        required: usize,
    },

    #[error("board fits {available} separated settlements, setup needs {required}")]
    NotEnoughSites { available: usize, required: usize },

    #[error("setup needs at least one round")]
    NoSetupRounds,

    #[error("resources granted in setup round {grant_round}, but setup has {rounds} rounds")]
    GrantRound { grant_round: u32, rounds: u32 },

    #[error("piece limits must cover the {required} settlements and roads placed in setup")]
    PieceLimits { required: u32 },

    #[error("victory point target must be positive")]
    VictoryTarget,

    #[error("bank trade ratio must be positive")]
    TradeRatio,

    #[error("placement distance must be at least 1")]
    PlacementDistance,

    #[error("longest road bonus needs a minimum length of at least 1")]
    LongestRoadLength,

    #[error("invalid configuration document: {0}")]
    Parse(String),
}

/// One seat at the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlayerSetup {
    pub name: String,
    /// Seat played by a [`Bot`](crate::bot::Bot)
    pub is_ai: bool,
    /// Defaults to the seat's colour
    pub color: Option<PlayerColor>,
}

impl PlayerSetup {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn ai(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_ai: true,
            color: None,
        }
    }
}

/// Layout of the land tiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardShape {
    /// All tiles within `radius` steps of the centre
    Hexagon { radius: u32 },
    /// An explicit list of tile coordinates, in id order
    Custom(Vec<HexCoord>),
}

impl BoardShape {
    pub fn coords(&self) -> Vec<HexCoord> {
        match self {
            BoardShape::Hexagon { radius } => HexCoord::hexagon(*radius),
            BoardShape::Custom(coords) => coords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub shape: BoardShape,
    /// Terrain per tile in layout order; generated when absent
    pub terrain: Option<Vec<Terrain>>,
    /// Production numbers per producing tile in layout order; generated when absent
    pub numbers: Option<Vec<u8>>,
    /// Desert count used when terrain is generated
    pub deserts: usize,
    /// Shuffle terrain and numbers with the seeded RNG
    pub shuffle: bool,
    pub min_tiles_per_player: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            shape: BoardShape::Hexagon { radius: 2 },
            terrain: None,
            numbers: None,
            deserts: 1,
            shuffle: true,
            min_tiles_per_player: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiceConfig {
    pub count: u8,
    pub sides: u8,
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self { count: 2, sides: 6 }
    }
}

impl DiceConfig {
    pub fn min_total(&self) -> u8 {
        self.count
    }

    pub fn max_total(&self) -> u8 {
        self.count * self.sides
    }

    pub fn can_roll(&self, total: u8) -> bool {
        (self.min_total()..=self.max_total()).contains(&total)
    }

    /// Number of ways the dice can show `total`
    pub fn ways(&self, total: u8) -> u64 {
        if !self.can_roll(total) {
            return 0;
        }
        let max = self.max_total() as usize;
        let mut ways = vec![0u64; max + 1];
        ways[0] = 1;
        for _ in 0..self.count {
            let mut next = vec![0u64; max + 1];
            for (sum, &w) in ways.iter().enumerate().filter(|(_, w)| **w > 0) {
                for face in 1..=self.sides as usize {
                    if sum + face <= max {
                        next[sum + face] += w;
                    }
                }
            }
            ways = next;
        }
        ways[total as usize]
    }

    /// Totals dealt to tiles, most likely first. A single most likely total
    /// is left out so that it never produces.
    pub fn production_values(&self) -> Vec<u8> {
        let totals: Vec<u8> = (self.min_total()..=self.max_total()).collect();
        let best = totals.iter().map(|t| self.ways(*t)).max().unwrap_or(0);
        let modes = totals.iter().filter(|t| self.ways(**t) == best).count();

        let mut values: Vec<u8> = totals
            .into_iter()
            .filter(|t| modes > 1 || self.ways(*t) != best)
            .collect();
        values.sort_by_key(|t| (std::cmp::Reverse(self.ways(*t)), *t));
        values
    }

    /// The most likely production values, kept apart on the board. Empty when
    /// every value is equally likely.
    pub fn hot_values(&self) -> Vec<u8> {
        let values = self.production_values();
        let best = values.iter().map(|v| self.ways(*v)).max().unwrap_or(0);
        let hot: Vec<u8> = values
            .iter()
            .copied()
            .filter(|v| self.ways(*v) == best)
            .collect();
        if hot.len() == values.len() {
            Vec::new()
        } else {
            hot
        }
    }
}

/// Resource supply held by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    /// Units of each resource kind; `None` for an unlimited bank
    pub limit: Option<u32>,
    pub policy: ScarcityPolicy,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            limit: Some(19),
            policy: ScarcityPolicy::Proportional,
        }
    }
}

/// Building costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub road: ResourceHand,
    pub settlement: ResourceHand,
    pub city: ResourceHand,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            road: ResourceHand::with_amounts(1, 1, 0, 0, 0),
            settlement: ResourceHand::with_amounts(1, 1, 0, 1, 1),
            city: ResourceHand::with_amounts(0, 0, 3, 2, 0),
        }
    }
}

/// Pieces each player owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceLimits {
    pub roads: u32,
    pub settlements: u32,
    pub cities: u32,
}

impl Default for PieceLimits {
    fn default() -> Self {
        Self {
            roads: 15,
            settlements: 5,
            cities: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    /// No two buildings may be this many edges apart or closer
    pub distance: u8,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self { distance: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupRules {
    /// Settlement-and-road steps per player
    pub rounds: u32,
    /// Reverse seat order on even rounds
    pub snake: bool,
    /// Round whose settlements collect their adjacent tiles' resources
    pub grant_round: Option<u32>,
    /// A setup road must touch the settlement placed just before it
    pub road_touches_new_settlement: bool,
}

impl Default for SetupRules {
    fn default() -> Self {
        Self {
            rounds: 2,
            snake: true,
            grant_round: Some(2),
            road_touches_new_settlement: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeRules {
    /// Units given to the bank for one unit back
    pub bank_ratio: u32,
}

impl Default for TradeRules {
    fn default() -> Self {
        Self { bank_ratio: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongestRoadRule {
    pub min_length: u32,
    pub points: u32,
}

impl Default for LongestRoadRule {
    fn default() -> Self {
        Self {
            min_length: 5,
            points: 2,
        }
    }
}

/// Complete description of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub players: Vec<PlayerSetup>,
    pub first_player: PlayerId,
    pub board: BoardConfig,
    pub dice: DiceConfig,
    pub supply: SupplyConfig,
    pub costs: CostTable,
    pub pieces: PieceLimits,
    pub placement: PlacementRules,
    pub setup: SetupRules,
    pub trade: TradeRules,
    pub longest_road: Option<LongestRoadRule>,
    pub victory_points_to_win: u32,
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: (1..=4).map(|n| PlayerSetup::human(format!("Player {n}"))).collect(),
            first_player: 0,
            board: BoardConfig::default(),
            dice: DiceConfig::default(),
            supply: SupplyConfig::default(),
            costs: CostTable::default(),
            pieces: PieceLimits::default(),
            placement: PlacementRules::default(),
            setup: SetupRules::default(),
            trade: TradeRules::default(),
            longest_road: Some(LongestRoadRule::default()),
            victory_points_to_win: 10,
            seed: 0,
        }
    }
}

impl GameConfig {
    /// Default rules for the named human players
    pub fn with_players<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            players: names.into_iter().map(PlayerSetup::human).collect(),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse a JSON document; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Display name of a seat, falling back to `Player N` for blank names
    pub fn player_name(&self, seat: usize) -> String {
        match self.players.get(seat) {
            Some(setup) if !setup.name.trim().is_empty() => setup.name.trim().to_string(),
            _ => format!("Player {}", seat + 1),
        }
    }

    /// Check everything that does not need a generated board
    pub fn validate(&self) -> Result<(), ConfigError> {
        let players = self.players.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
            return Err(ConfigError::PlayerCount {
                min: MIN_PLAYERS,
                max: MAX_PLAYERS,
                actual: players,
            });
        }
        if self.first_player as usize >= players {
            return Err(ConfigError::FirstPlayer {
                first: self.first_player,
                players,
            });
        }

        let dice = self.dice;
        if !(1..=MAX_DICE).contains(&dice.count) || !(2..=MAX_DIE_SIDES).contains(&dice.sides) {
            return Err(ConfigError::Dice {
                count: dice.count,
                sides: dice.sides,
                max_count: MAX_DICE,
                max_sides: MAX_DIE_SIDES,
            });
        }

        let setup = self.setup;
        if setup.rounds == 0 {
            return Err(ConfigError::NoSetupRounds);
        }
        if let Some(grant_round) = setup.grant_round {
            if grant_round == 0 || grant_round > setup.rounds {
                return Err(ConfigError::GrantRound {
                    grant_round,
                    rounds: setup.rounds,
                });
            }
        }
        if self.pieces.settlements < setup.rounds || self.pieces.roads < setup.rounds {
            return Err(ConfigError::PieceLimits {
                required: setup.rounds,
            });
        }

        if self.placement.distance == 0 {
            return Err(ConfigError::PlacementDistance);
        }
        if self.victory_points_to_win == 0 {
            return Err(ConfigError::VictoryTarget);
        }
        if self.trade.bank_ratio == 0 {
            return Err(ConfigError::TradeRatio);
        }
        if self.longest_road.is_some_and(|rule| rule.min_length == 0) {
            return Err(ConfigError::LongestRoadLength);
        }

        Ok(())
    }

    /// Initial bank stock per resource kind
    pub fn initial_supply(&self) -> Option<ResourceHand> {
        self.supply.limit.map(|n| {
            let mut hand = ResourceHand::new();
            for r in Resource::ALL {
                hand.set(r, n);
            }
            hand
        })
    }
}
