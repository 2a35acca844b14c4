//! Players, their resource holdings and the pieces they own.

use crate::board::{EdgeId, IntersectionId, PlayerId, Resource};
use crate::config::PieceLimits;
use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Seat colour shown by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Orange,
    White,
    Green,
    Brown,
}

impl PlayerColor {
    /// Get color for a seat index
    pub fn for_player(id: PlayerId) -> Self {
        match id % 6 {
            0 => PlayerColor::Red,
            1 => PlayerColor::Blue,
            2 => PlayerColor::Orange,
            3 => PlayerColor::White,
            4 => PlayerColor::Green,
            _ => PlayerColor::Brown,
        }
    }

    /// `0xRRGGBB`
    pub fn hex_code(&self) -> u32 {
        match self {
            PlayerColor::Red => 0xE74C3C,
            PlayerColor::Blue => 0x3498DB,
            PlayerColor::Orange => 0xE67E22,
            PlayerColor::White => 0xECF0F1,
            PlayerColor::Green => 0x27AE60,
            PlayerColor::Brown => 0x8E5B3A,
        }
    }
}

/// The kinds of piece a player places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Road,
    Settlement,
    City,
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PieceKind::Road => "road",
            PieceKind::Settlement => "settlement",
            PieceKind::City => "city",
        })
    }
}

/// Counts of each resource, used for holdings, costs and trades alike
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHand {
    pub brick: u32,
    pub lumber: u32,
    pub ore: u32,
    pub grain: u32,
    pub wool: u32,
}

impl ResourceHand {
    /// Create an empty hand
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amounts(brick: u32, lumber: u32, ore: u32, grain: u32, wool: u32) -> Self {
        Self {
            brick,
            lumber,
            ore,
            grain,
            wool,
        }
    }

    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    /// Number of cards in the hand, saturating at `u32::MAX`
    pub fn total(&self) -> u32 {
        Resource::ALL
            .into_iter()
            .fold(0u32, |sum, r| sum.saturating_add(self.get(r)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Brick => self.brick,
            Resource::Lumber => self.lumber,
            Resource::Ore => self.ore,
            Resource::Grain => self.grain,
            Resource::Wool => self.wool,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Brick => &mut self.brick,
            Resource::Lumber => &mut self.lumber,
            Resource::Ore => &mut self.ore,
            Resource::Grain => &mut self.grain,
            Resource::Wool => &mut self.wool,
        }
    }

    pub fn set(&mut self, resource: Resource, count: u32) {
        *self.slot(resource) = count;
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        *self.slot(resource) += amount;
    }

    pub fn add_hand(&mut self, other: &ResourceHand) {
        for (resource, amount) in other.iter() {
            self.add(resource, amount);
        }
    }

    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        self.shortfall(cost).is_none()
    }

    /// First resource the hand lacks for `cost`, as `(resource, needed, available)`
    pub fn shortfall(&self, cost: &ResourceHand) -> Option<(Resource, u32, u32)> {
        Resource::ALL
            .into_iter()
            .find(|r| self.get(*r) < cost.get(*r))
            .map(|r| (r, cost.get(r), self.get(r)))
    }

    /// Subtract a cost, all or nothing. Returns false if the hand is short.
    pub fn subtract(&mut self, cost: &ResourceHand) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for (resource, amount) in cost.iter() {
            *self.slot(resource) -= amount;
        }
        true
    }

    /// Non-zero entries in [`Resource::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::ALL
            .into_iter()
            .map(|r| (r, self.get(r)))
            .filter(|(_, n)| *n > 0)
    }
}

impl fmt::Display for ResourceHand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }
        let parts: Vec<String> = self.iter().map(|(r, n)| format!("{n} {r}")).collect();
        f.write_str(&parts.join(", "))
    }
}

/// One seat at the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Seat index
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    /// Seat played by the computer
    pub is_ai: bool,
    /// False once the player resigns
    pub active: bool,
    pub resources: ResourceHand,
    /// Intersections holding this player's settlements
    pub settlements: BTreeSet<IntersectionId>,
    /// Intersections holding this player's cities
    pub cities: BTreeSet<IntersectionId>,
    /// Edges holding this player's roads
    pub roads: BTreeSet<EdgeId>,
    /// Whether this player holds the longest road bonus
    pub has_longest_road: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: PlayerColor, is_ai: bool) -> Self {
        Self {
            id,
            name,
            color,
            is_ai,
            active: true,
            resources: ResourceHand::new(),
            settlements: BTreeSet::new(),
            cities: BTreeSet::new(),
            roads: BTreeSet::new(),
            has_longest_road: false,
        }
    }

    // ==================== Holdings ====================

    pub fn credit(&mut self, resource: Resource, amount: u32) {
        self.resources.add(resource, amount);
    }

    /// Receive a whole hand
    pub fn receive(&mut self, hand: &ResourceHand) {
        self.resources.add_hand(hand);
    }

    /// Remove `amount` of one resource, failing without change if short
    pub fn debit(&mut self, resource: Resource, amount: u32) -> Result<(), GameError> {
        self.pay(&ResourceHand::single(resource, amount))
    }

    /// Remove a whole hand, failing without change if any resource is short
    pub fn pay(&mut self, cost: &ResourceHand) -> Result<(), GameError> {
        self.check_afford(cost)?;
        self.resources.subtract(cost);
        Ok(())
    }

    pub fn check_afford(&self, cost: &ResourceHand) -> Result<(), GameError> {
        match self.resources.shortfall(cost) {
            Some((resource, needed, available)) => Err(GameError::InsufficientResources {
                player: self.id,
                resource,
                needed,
                available,
            }),
            None => Ok(()),
        }
    }

    // ==================== Pieces ====================

    pub fn pieces_remaining(&self, piece: PieceKind, limits: &PieceLimits) -> u32 {
        let (limit, used) = match piece {
            PieceKind::Road => (limits.roads, self.roads.len()),
            PieceKind::Settlement => (limits.settlements, self.settlements.len()),
            PieceKind::City => (limits.cities, self.cities.len()),
        };
        limit.saturating_sub(used as u32)
    }

    pub fn check_piece(&self, piece: PieceKind, limits: &PieceLimits) -> Result<(), GameError> {
        if self.pieces_remaining(piece, limits) == 0 {
            return Err(GameError::NoPiecesRemaining {
                player: self.id,
                piece,
            });
        }
        Ok(())
    }

    /// Points from buildings plus the longest road bonus
    pub fn victory_points(&self, longest_road_points: u32) -> u32 {
        let mut vp = self.settlements.len() as u32 + 2 * self.cities.len() as u32;
        if self.has_longest_road {
            vp += longest_road_points;
        }
        vp
    }
}

/// Atomically move `offer` from `from` to `to` and `request` from `to` to
/// `from`. Both holdings are checked before either changes.
pub fn exchange(
    from: &mut Player,
    to: &mut Player,
    offer: &ResourceHand,
    request: &ResourceHand,
) -> Result<(), GameError> {
    from.check_afford(offer)?;
    to.check_afford(request)?;

    from.resources.subtract(offer);
    to.resources.subtract(request);
    from.receive(request);
    to.receive(offer);
    Ok(())
}
