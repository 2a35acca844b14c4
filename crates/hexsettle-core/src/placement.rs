//! Placement legality.
//!
//! Every check here is a pure function of the board: it returns a
//! [`Verdict`] naming the violated rule and never changes anything. Turn
//! order, phase and cost are the engine's business.

use crate::board::{Board, BuildingKind, EdgeId, IntersectionId, NodeId, PlayerId};
use crate::config::PlacementRules;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The rule a placement breaks
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlacementViolation {
    #[error("there is no edge {0}")]
    UnknownEdge(EdgeId),

    #[error("there is no intersection {0}")]
    UnknownIntersection(IntersectionId),

    #[error("edge {edge} already holds player {owner}'s road")]
    EdgeOccupied { edge: EdgeId, owner: PlayerId },

    #[error("intersection {intersection} already holds player {owner}'s building")]
    IntersectionOccupied {
        intersection: IntersectionId,
        owner: PlayerId,
    },

    #[error("intersection {intersection} is too close to the building at {blocking}")]
    DistanceRule {
        intersection: IntersectionId,
        blocking: IntersectionId,
    },

    #[error("{0} is not connected to the player's roads or buildings")]
    NotConnected(NodeId),

    #[error("setup road {edge} does not touch the settlement just placed at {settlement}")]
    NotAtNewSettlement {
        edge: EdgeId,
        settlement: IntersectionId,
    },

    #[error("intersection {0} does not hold the player's own settlement")]
    NotOwnSettlement(IntersectionId),
}

/// Which connectivity rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementContext {
    /// Initial placement. With an anchor, a road must touch that settlement.
    Setup { anchor: Option<IntersectionId> },
    /// Regular play: pieces extend the player's network
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Legal,
    Illegal(PlacementViolation),
}

impl Verdict {
    pub fn is_legal(&self) -> bool {
        matches!(self, Verdict::Legal)
    }

    pub fn into_result(self) -> Result<(), PlacementViolation> {
        match self {
            Verdict::Legal => Ok(()),
            Verdict::Illegal(violation) => Err(violation),
        }
    }
}

impl From<Result<(), PlacementViolation>> for Verdict {
    fn from(result: Result<(), PlacementViolation>) -> Self {
        match result {
            Ok(()) => Verdict::Legal,
            Err(violation) => Verdict::Illegal(violation),
        }
    }
}

/// Can `player` lay a road on `edge`?
pub fn can_place_road(
    board: &Board,
    player: PlayerId,
    edge: EdgeId,
    context: &PlacementContext,
) -> Verdict {
    check_road(board, player, edge, context).into()
}

fn check_road(
    board: &Board,
    player: PlayerId,
    edge: EdgeId,
    context: &PlacementContext,
) -> Result<(), PlacementViolation> {
    let target = board.edge(edge).ok_or(PlacementViolation::UnknownEdge(edge))?;
    if let Some(road) = target.road {
        return Err(PlacementViolation::EdgeOccupied {
            edge,
            owner: road.owner,
        });
    }

    if let PlacementContext::Setup {
        anchor: Some(settlement),
    } = context
    {
        if !target.endpoints.contains(settlement) {
            return Err(PlacementViolation::NotAtNewSettlement {
                edge,
                settlement: *settlement,
            });
        }
        return Ok(());
    }

    if road_connects(board, player, edge) {
        Ok(())
    } else {
        Err(PlacementViolation::NotConnected(NodeId::Edge(edge)))
    }
}

/// An endpoint holds the player's building, or an endpoint free of opponent
/// buildings touches another of the player's roads.
fn road_connects(board: &Board, player: PlayerId, edge: EdgeId) -> bool {
    let Some(endpoints) = board.intersections_of(edge) else {
        return false;
    };
    endpoints.iter().any(|&end| match board.building_at(end) {
        Some(building) => building.owner == player,
        None => board
            .edges_of(end)
            .iter()
            .any(|&e| e != edge && board.road_at(e).is_some_and(|r| r.owner == player)),
    })
}

/// Can `player` put a settlement on `intersection`?
pub fn can_place_building(
    board: &Board,
    player: PlayerId,
    intersection: IntersectionId,
    context: &PlacementContext,
    rules: &PlacementRules,
) -> Verdict {
    check_building(board, player, intersection, context, rules).into()
}

fn check_building(
    board: &Board,
    player: PlayerId,
    intersection: IntersectionId,
    context: &PlacementContext,
    rules: &PlacementRules,
) -> Result<(), PlacementViolation> {
    let target = board
        .intersection(intersection)
        .ok_or(PlacementViolation::UnknownIntersection(intersection))?;
    if let Some(building) = target.building {
        return Err(PlacementViolation::IntersectionOccupied {
            intersection,
            owner: building.owner,
        });
    }

    if let Some(blocking) = board
        .within_distance(intersection, rules.distance)
        .into_iter()
        .find(|i| board.building_at(*i).is_some())
    {
        return Err(PlacementViolation::DistanceRule {
            intersection,
            blocking,
        });
    }

    if matches!(context, PlacementContext::Normal) {
        let touches_road = target
            .edges
            .iter()
            .any(|&e| board.road_at(e).is_some_and(|r| r.owner == player));
        if !touches_road {
            return Err(PlacementViolation::NotConnected(NodeId::Intersection(
                intersection,
            )));
        }
    }

    Ok(())
}

/// Can `player` turn the settlement on `intersection` into a city?
pub fn can_upgrade_to_city(board: &Board, player: PlayerId, intersection: IntersectionId) -> Verdict {
    let Some(target) = board.intersection(intersection) else {
        return Verdict::Illegal(PlacementViolation::UnknownIntersection(intersection));
    };
    match target.building {
        Some(b) if b.owner == player && b.kind == BuildingKind::Settlement => Verdict::Legal,
        _ => Verdict::Illegal(PlacementViolation::NotOwnSettlement(intersection)),
    }
}

/// Every edge where `player` may lay a road
pub fn legal_roads(board: &Board, player: PlayerId, context: &PlacementContext) -> Vec<EdgeId> {
    board
        .edges()
        .map(|e| e.id)
        .filter(|&e| can_place_road(board, player, e, context).is_legal())
        .collect()
}

/// Every intersection where `player` may put a settlement
pub fn legal_buildings(
    board: &Board,
    player: PlayerId,
    context: &PlacementContext,
    rules: &PlacementRules,
) -> Vec<IntersectionId> {
    board
        .intersections()
        .map(|i| i.id)
        .filter(|&i| can_place_building(board, player, i, context, rules).is_legal())
        .collect()
}

/// Every settlement of `player` that may become a city
pub fn legal_city_upgrades(board: &Board, player: PlayerId) -> Vec<IntersectionId> {
    board
        .intersections()
        .map(|i| i.id)
        .filter(|&i| can_upgrade_to_city(board, player, i).is_legal())
        .collect()
}
