//! Dice-driven production and the bank that pays it out.

use crate::board::{Board, IntersectionId, PlayerId, Resource};
use crate::player::ResourceHand;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Resources owed to each player for one roll
pub type Production = BTreeMap<PlayerId, ResourceHand>;

/// Raw production for `roll`: every building next to a tile showing `roll`
/// earns its yield multiplier of that tile's resource. Deserts never produce,
/// and a roll that matches no tile yields an empty map.
pub fn produce(board: &Board, roll: u8) -> Production {
    let mut production = Production::new();
    for tile in board.tiles().filter(|t| t.produces_on(roll)) {
        let Some(resource) = tile.resource() else {
            continue;
        };
        for &intersection in &tile.intersections {
            if let Some(building) = board.building_at(intersection) {
                production
                    .entry(building.owner)
                    .or_default()
                    .add(resource, building.kind.yield_multiplier());
            }
        }
    }
    production
}

/// One unit of each resource from the producing tiles around `intersection`
pub fn yield_around(board: &Board, intersection: IntersectionId) -> ResourceHand {
    let mut hand = ResourceHand::new();
    for tile in board.tiles_of(intersection).iter().filter_map(|t| board.tile(*t)) {
        if let Some(resource) = tile.resource() {
            hand.add(resource, 1);
        }
    }
    hand
}

/// How a short bank splits a production round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScarcityPolicy {
    /// Everyone gets `floor(demand * stock / total_demand)`
    #[default]
    Proportional,
    /// First come in turn order from the current player until stock runs out
    TurnOrder,
}

/// The shared resource supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// `None` means unlimited
    stock: Option<ResourceHand>,
}

impl Bank {
    pub fn new(stock: Option<ResourceHand>) -> Self {
        Self { stock }
    }

    pub fn unlimited() -> Self {
        Self { stock: None }
    }

    pub fn is_unlimited(&self) -> bool {
        self.stock.is_none()
    }

    pub fn stock(&self) -> Option<&ResourceHand> {
        self.stock.as_ref()
    }

    /// Units available, `None` when unlimited
    pub fn available(&self, resource: Resource) -> Option<u32> {
        self.stock.map(|s| s.get(resource))
    }

    /// First resource the bank cannot supply for `hand`
    pub fn shortfall(&self, hand: &ResourceHand) -> Option<(Resource, u32, u32)> {
        self.stock.and_then(|s| s.shortfall(hand))
    }

    /// Take `hand` out of the bank, all or nothing
    pub(crate) fn withdraw(&mut self, hand: &ResourceHand) -> bool {
        match &mut self.stock {
            Some(stock) => stock.subtract(hand),
            None => true,
        }
    }

    pub(crate) fn deposit(&mut self, hand: &ResourceHand) {
        if let Some(stock) = &mut self.stock {
            stock.add_hand(hand);
        }
    }

    /// Clip `hand` to what the bank holds
    pub fn clip(&self, hand: &ResourceHand) -> ResourceHand {
        let mut clipped = *hand;
        if let Some(stock) = &self.stock {
            for resource in Resource::ALL {
                clipped.set(resource, hand.get(resource).min(stock.get(resource)));
            }
        }
        clipped
    }
}

/// Outcome of running production through the bank
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Distribution {
    /// What each player actually receives (players with nothing are omitted)
    pub granted: Production,
    /// What the bank could not pay
    pub withheld: ResourceHand,
}

/// Resolve `raw` production against the bank's stock. Kinds the bank can
/// cover are paid in full; for the rest `policy` decides who gets what.
/// `turn_order` starts at the current player.
pub fn distribute(
    raw: &Production,
    bank: &Bank,
    policy: ScarcityPolicy,
    turn_order: &[PlayerId],
) -> Distribution {
    let mut granted = raw.clone();
    let mut withheld = ResourceHand::new();

    for resource in Resource::ALL {
        let Some(stock) = bank.available(resource) else {
            continue;
        };
        let demand: u32 = raw.values().map(|h| h.get(resource)).sum();
        if demand <= stock {
            continue;
        }

        match policy {
            ScarcityPolicy::Proportional => {
                for hand in granted.values_mut() {
                    let want = hand.get(resource) as u64;
                    hand.set(resource, (want * stock as u64 / demand as u64) as u32);
                }
            }
            ScarcityPolicy::TurnOrder => {
                let mut left = stock;
                let mut served = BTreeSet::new();
                for player in turn_order {
                    if let Some(hand) = granted.get_mut(player) {
                        let give = hand.get(resource).min(left);
                        hand.set(resource, give);
                        left -= give;
                        served.insert(*player);
                    }
                }
                for (_, hand) in granted.iter_mut().filter(|(p, _)| !served.contains(*p)) {
                    hand.set(resource, 0);
                }
            }
        }

        let paid: u32 = granted.values().map(|h| h.get(resource)).sum();
        withheld.add(resource, demand - paid);
    }

    granted.retain(|_, hand| !hand.is_empty());
    Distribution { granted, withheld }
}
