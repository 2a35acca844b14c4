//! Axial hex coordinates for pointy-top grids.
//!
//! Coordinates only matter while a [`Board`](crate::board::Board) is being
//! generated:
//! - `HexCoord` names a tile
//! - `VertexCoord` names a tile corner (an intersection)
//! - `EdgeCoord` names a tile side (an edge)
//!
//! The generated board addresses everything by index and keeps coordinates
//! only as lookup keys.

use serde::{Deserialize, Serialize};

/// The two corners a vertex coordinate can be anchored to. Every corner of
/// the grid is the top or the bottom corner of exactly one hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexDirection {
    North,
    South,
}

/// Side of a pointy-top hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeDirection {
    NorthEast,
    East,
    SouthEast,
    SouthWest,
    West,
    NorthWest,
}

impl EdgeDirection {
    /// Clockwise from NorthEast
    pub const ALL: [EdgeDirection; 6] = [
        EdgeDirection::NorthEast,
        EdgeDirection::East,
        EdgeDirection::SouthEast,
        EdgeDirection::SouthWest,
        EdgeDirection::West,
        EdgeDirection::NorthWest,
    ];

    /// Step in `(q, r)` towards the hex across this side
    const fn offset(self) -> (i32, i32) {
        match self {
            EdgeDirection::NorthEast => (1, -1),
            EdgeDirection::East => (1, 0),
            EdgeDirection::SouthEast => (0, 1),
            EdgeDirection::SouthWest => (-1, 1),
            EdgeDirection::West => (-1, 0),
            EdgeDirection::NorthWest => (0, -1),
        }
    }

    /// The same side seen from the hex across it
    pub const fn opposite(self) -> Self {
        match self {
            EdgeDirection::NorthEast => EdgeDirection::SouthWest,
            EdgeDirection::East => EdgeDirection::West,
            EdgeDirection::SouthEast => EdgeDirection::NorthWest,
            EdgeDirection::SouthWest => EdgeDirection::NorthEast,
            EdgeDirection::West => EdgeDirection::East,
            EdgeDirection::NorthWest => EdgeDirection::SouthEast,
        }
    }
}

/// Axial tile coordinate; `q` grows eastwards, `r` grows south-eastwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    pub fn neighbor(&self, direction: EdgeDirection) -> HexCoord {
        let (dq, dr) = direction.offset();
        HexCoord::new(self.q + dq, self.r + dr)
    }

    /// Neighbouring hexes in [`EdgeDirection::ALL`] order
    pub fn neighbors(&self) -> [HexCoord; 6] {
        EdgeDirection::ALL.map(|dir| self.neighbor(dir))
    }

    /// Steps between two hexes
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        // Cube distance with the implicit third axis s = -q - r
        (dq.unsigned_abs() + dr.unsigned_abs() + (dq + dr).unsigned_abs()) / 2
    }

    /// Corners clockwise from the top. The side corners belong to the
    /// neighbours whose top or bottom corner they are.
    pub fn vertices(&self) -> [VertexCoord; 6] {
        use EdgeDirection::*;
        use VertexDirection::*;
        [
            VertexCoord::new(*self, North),
            VertexCoord::new(self.neighbor(NorthEast), South),
            VertexCoord::new(self.neighbor(SouthEast), North),
            VertexCoord::new(*self, South),
            VertexCoord::new(self.neighbor(SouthWest), North),
            VertexCoord::new(self.neighbor(NorthWest), South),
        ]
    }

    /// Sides in [`EdgeDirection::ALL`] order, canonicalized
    pub fn edges(&self) -> [EdgeCoord; 6] {
        EdgeDirection::ALL.map(|dir| EdgeCoord::new(*self, dir))
    }

    /// Every hex within `radius` steps of the origin, nearest rings first
    pub fn hexagon(radius: u32) -> Vec<HexCoord> {
        let n = radius as i32;
        let mut coords: Vec<HexCoord> = (-n..=n)
            .flat_map(|q| ((-n).max(-q - n)..=n.min(n - q)).map(move |r| HexCoord::new(q, r)))
            .collect();
        let origin = HexCoord::default();
        coords.sort_by_key(|c| (c.distance_to(&origin), c.q, c.r));
        coords
    }
}

/// A tile corner, where up to three hexes meet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexCoord {
    pub hex: HexCoord,
    pub direction: VertexDirection,
}

impl VertexCoord {
    pub const fn new(hex: HexCoord, direction: VertexDirection) -> Self {
        Self { hex, direction }
    }
}

/// A tile side, shared by at most two hexes.
///
/// `new` always stores the side from the hex with the smaller `(q, r)`, so
/// both descriptions of a side compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeCoord {
    pub hex: HexCoord,
    pub direction: EdgeDirection,
}

impl EdgeCoord {
    pub fn new(hex: HexCoord, direction: EdgeDirection) -> Self {
        let across = hex.neighbor(direction);
        if (hex.q, hex.r) <= (across.q, across.r) {
            Self { hex, direction }
        } else {
            Self {
                hex: across,
                direction: direction.opposite(),
            }
        }
    }

    /// Corners at either end, in clockwise order around `self.hex`
    pub fn endpoints(&self) -> [VertexCoord; 2] {
        let corners = self.hex.vertices();
        let i = EdgeDirection::ALL
            .iter()
            .position(|d| *d == self.direction)
            .unwrap_or(0);
        [corners[i], corners[(i + 1) % 6]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_neighbors_are_one_step_away() {
        let origin = HexCoord::new(3, -1);
        let around: HashSet<_> = origin.neighbors().into_iter().collect();
        assert_eq!(around.len(), 6);
        assert!(around.iter().all(|n| origin.distance_to(n) == 1));
    }

    #[test]
    fn test_distance() {
        let origin = HexCoord::default();
        assert_eq!(origin.distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(origin.distance_to(&HexCoord::new(-3, 3)), 3);
        assert_eq!(HexCoord::new(1, 1).distance_to(&HexCoord::new(-1, -1)), 4);
    }

    #[test]
    fn test_hexagon_sizes() {
        for (radius, tiles) in [(0, 1), (1, 7), (2, 19), (3, 37), (4, 61)] {
            assert_eq!(HexCoord::hexagon(radius).len(), tiles);
        }
        let rings = HexCoord::hexagon(2);
        assert_eq!(rings[0], HexCoord::default());
        assert!(rings[1..7].iter().all(|c| c.distance_to(&rings[0]) == 1));
    }

    #[test]
    fn test_three_hexes_share_one_corner() {
        let a = HexCoord::new(0, 0).vertices();
        let b = HexCoord::new(1, 0).vertices();
        let c = HexCoord::new(1, -1).vertices();
        let shared: Vec<_> = a.iter().filter(|v| b.contains(v) && c.contains(v)).collect();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_side_has_one_canonical_form() {
        for dir in EdgeDirection::ALL {
            let here = HexCoord::new(0, 0);
            let there = here.neighbor(dir);
            assert_eq!(EdgeCoord::new(here, dir), EdgeCoord::new(there, dir.opposite()));
        }
    }

    #[test]
    fn test_endpoints_are_corners_of_both_hexes() {
        for dir in EdgeDirection::ALL {
            let here = HexCoord::new(0, 0);
            let [a, b] = EdgeCoord::new(here, dir).endpoints();
            assert_ne!(a, b);
            for hex in [here, here.neighbor(dir)] {
                let corners = hex.vertices();
                assert!(corners.contains(&a) && corners.contains(&b), "{dir:?}");
            }
        }
    }

    #[test]
    fn test_sides_of_a_hex_are_distinct() {
        let sides: HashSet<_> = HexCoord::new(-2, 1).edges().into_iter().collect();
        assert_eq!(sides.len(), 6);
    }
}
