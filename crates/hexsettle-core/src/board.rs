//! Board graph: tiles, intersections and edges addressed by index.
//!
//! This module contains:
//! - Resource and terrain types
//! - Index newtypes for every structural element
//! - Buildings and roads (the only mutable part of a board)
//! - Board generation from a [`GameConfig`]
//! - Pure spatial queries (neighbours, paths, longest road, integrity)
//!
//! The board's structure is cyclic (a corner is shared by up to three tiles),
//! so nothing owns anything else: every cross reference is an index into one
//! of the three element tables, and the adjacency lists are computed once at
//! generation time.

use crate::config::{BoardConfig, ConfigError, DiceConfig, GameConfig};
use crate::hex::{EdgeCoord, HexCoord, VertexCoord};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;

/// Player identifier: the seat index in turn order
pub type PlayerId = u8;

/// Resource kinds produced by tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    Brick,
    Lumber,
    Ore,
    Grain,
    Wool,
}

impl Resource {
    /// All resource types
    pub const ALL: [Resource; 5] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Ore,
        Resource::Grain,
        Resource::Wool,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Brick => "brick",
            Resource::Lumber => "lumber",
            Resource::Ore => "ore",
            Resource::Grain => "grain",
            Resource::Wool => "wool",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a tile is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Produces a resource when its number is rolled
    Resource(Resource),
    /// Never produces
    Desert,
}

impl Terrain {
    /// Get the resource this terrain produces, if any
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Terrain::Resource(r) => Some(*r),
            Terrain::Desert => None,
        }
    }
}

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Position in the board's element table
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

index_id!(
    /// Identity of a tile
    TileId,
    "T"
);
index_id!(
    /// Identity of an intersection (tile corner)
    IntersectionId,
    "I"
);
index_id!(
    /// Identity of an edge (tile side)
    EdgeId,
    "E"
);

/// Any structural element of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Tile(TileId),
    Intersection(IntersectionId),
    Edge(EdgeId),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Tile(id) => id.fmt(f),
            NodeId::Intersection(id) => id.fmt(f),
            NodeId::Edge(id) => id.fmt(f),
        }
    }
}

/// The closed set of buildings that can occupy an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    Settlement,
    City,
}

impl BuildingKind {
    /// Units of resource produced per matching roll
    pub const fn yield_multiplier(&self) -> u32 {
        match self {
            BuildingKind::Settlement => 1,
            BuildingKind::City => 2,
        }
    }

    pub const fn victory_points(&self) -> u32 {
        match self {
            BuildingKind::Settlement => 1,
            BuildingKind::City => 2,
        }
    }
}

/// A building standing on an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub owner: PlayerId,
}

/// A road lying on an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    pub owner: PlayerId,
}

/// A single hex tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub coord: HexCoord,
    pub terrain: Terrain,
    /// Roll that triggers production (None for deserts)
    pub production: Option<u8>,
    /// The six corners, clockwise from the top
    pub intersections: Vec<IntersectionId>,
    /// The six sides, clockwise from the north-east
    pub edges: Vec<EdgeId>,
    /// Tiles sharing a side with this one
    pub neighbors: Vec<TileId>,
}

impl Tile {
    /// Get the resource this tile produces, if any
    pub fn resource(&self) -> Option<Resource> {
        self.terrain.resource()
    }

    /// Whether a roll of `roll` makes this tile produce
    pub fn produces_on(&self, roll: u8) -> bool {
        self.production == Some(roll) && self.resource().is_some()
    }

    /// A tile with fewer than six land neighbours lies on the coast
    pub fn is_at_coast(&self) -> bool {
        self.neighbors.len() < 6
    }
}

/// A tile corner, where buildings stand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intersection {
    pub id: IntersectionId,
    pub coord: VertexCoord,
    /// Tiles meeting here (at most 3)
    pub tiles: Vec<TileId>,
    /// Edges ending here (at most 3)
    pub edges: Vec<EdgeId>,
    /// Intersections one edge away
    pub neighbors: Vec<IntersectionId>,
    pub building: Option<Building>,
}

/// A tile side, where roads lie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub coord: EdgeCoord,
    pub endpoints: [IntersectionId; 2],
    /// Tiles on either side (1 on the coast, 2 inland)
    pub tiles: Vec<TileId>,
    /// Edges sharing an endpoint with this one
    pub neighbors: Vec<EdgeId>,
    pub road: Option<Road>,
}

impl Edge {
    /// The endpoint across from `end`, if `end` is an endpoint of this edge
    pub fn other_end(&self, end: IntersectionId) -> Option<IntersectionId> {
        match self.endpoints {
            [a, b] if a == end => Some(b),
            [a, b] if b == end => Some(a),
            _ => None,
        }
    }
}

/// Lazy iterator over a node's same-kind neighbours.
///
/// Cloning the iterator restarts nothing and shares nothing: it is a cursor
/// over the board's precomputed adjacency table.
#[derive(Debug, Clone)]
pub struct Neighbors<'a> {
    inner: NeighborsInner<'a>,
}

#[derive(Debug, Clone)]
enum NeighborsInner<'a> {
    Tiles(std::slice::Iter<'a, TileId>),
    Intersections(std::slice::Iter<'a, IntersectionId>),
    Edges(std::slice::Iter<'a, EdgeId>),
    Empty,
}

impl Iterator for Neighbors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match &mut self.inner {
            NeighborsInner::Tiles(it) => it.next().copied().map(NodeId::Tile),
            NeighborsInner::Intersections(it) => it.next().copied().map(NodeId::Intersection),
            NeighborsInner::Edges(it) => it.next().copied().map(NodeId::Edge),
            NeighborsInner::Empty => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = match &self.inner {
            NeighborsInner::Tiles(it) => it.len(),
            NeighborsInner::Intersections(it) => it.len(),
            NeighborsInner::Edges(it) => it.len(),
            NeighborsInner::Empty => 0,
        };
        (len, Some(len))
    }
}

impl ExactSizeIterator for Neighbors<'_> {}

/// A broken structural invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("{node} is stored at the wrong table position")]
    MisplacedId { node: NodeId },

    #[error("{node} references missing {missing}")]
    DanglingReference { node: NodeId, missing: NodeId },

    #[error("{edge} connects {intersection} to itself")]
    DegenerateEdge { edge: EdgeId, intersection: IntersectionId },

    #[error("{from} lists {to}, but {to} does not list {from}")]
    Asymmetric { from: NodeId, to: NodeId },

    #[error("{node} has {count} incident elements, more than allowed")]
    TooManyIncident { node: NodeId, count: usize },

    #[error("{tile} produces on {value}, which the dice cannot roll")]
    UnrollableProduction { tile: TileId, value: u8 },
}

#[derive(Debug, Clone, Default)]
struct CoordIndex {
    tiles: HashMap<HexCoord, TileId>,
    intersections: HashMap<VertexCoord, IntersectionId>,
    edges: HashMap<EdgeCoord, EdgeId>,
}

/// Serialized form of a board: the three element tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoardTables {
    tiles: Vec<Tile>,
    intersections: Vec<Intersection>,
    edges: Vec<Edge>,
}

/// The complete game board
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "BoardTables", into = "BoardTables")]
pub struct Board {
    tiles: Vec<Tile>,
    intersections: Vec<Intersection>,
    edges: Vec<Edge>,
    index: CoordIndex,
}

impl From<BoardTables> for Board {
    fn from(tables: BoardTables) -> Self {
        let mut board = Board {
            tiles: tables.tiles,
            intersections: tables.intersections,
            edges: tables.edges,
            index: CoordIndex::default(),
        };
        board.reindex();
        board
    }
}

impl From<Board> for BoardTables {
    fn from(board: Board) -> Self {
        BoardTables {
            tiles: board.tiles,
            intersections: board.intersections,
            edges: board.edges,
        }
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.tiles == other.tiles
            && self.intersections == other.intersections
            && self.edges == other.edges
    }
}

impl Eq for Board {}

/// Maximum shuffles spent keeping the most likely numbers apart
const MAX_NUMBER_SHUFFLES: usize = 100;

/// Order in which resource kinds are dealt when no terrain list is given
const TERRAIN_CYCLE: [Resource; 5] = [
    Resource::Lumber,
    Resource::Grain,
    Resource::Wool,
    Resource::Brick,
    Resource::Ore,
];

impl Board {
    /// Generate a board for `config`.
    ///
    /// Fails when the layout is malformed or disconnected, when explicit
    /// terrain or number lists do not fit it, or when it is too small for
    /// the configured players and setup rounds.
    pub fn generate<R: Rng + ?Sized>(config: &GameConfig, rng: &mut R) -> Result<Self, ConfigError> {
        let board_config = &config.board;
        let layout = board_config.shape.coords();
        validate_layout(&layout)?;

        let players = config.players.len();
        let required = players * board_config.min_tiles_per_player;
        if layout.len() < required {
            return Err(ConfigError::TooFewTiles {
                tiles: layout.len(),
                players,
                required,
            });
        }

        let terrain = assign_terrain(board_config, layout.len(), rng)?;
        let producing: Vec<HexCoord> = layout
            .iter()
            .zip(&terrain)
            .filter(|(_, t)| t.resource().is_some())
            .map(|(c, _)| *c)
            .collect();
        let numbers = assign_numbers(board_config, &config.dice, &producing, rng)?;

        let board = Self::build(&layout, &terrain, &numbers);

        let required_sites = players * config.setup.rounds as usize;
        let available = board.separated_sites(config.placement.distance);
        if available < required_sites {
            return Err(ConfigError::NotEnoughSites {
                available,
                required: required_sites,
            });
        }

        debug_assert!(board.check_integrity().is_ok());
        Ok(board)
    }

    /// Assemble the graph. `numbers` are handed out to producing tiles in layout order.
    fn build(layout: &[HexCoord], terrain: &[Terrain], numbers: &[u8]) -> Self {
        let mut board = Board {
            tiles: Vec::with_capacity(layout.len()),
            intersections: Vec::new(),
            edges: Vec::new(),
            index: CoordIndex::default(),
        };
        let mut numbers = numbers.iter().copied();

        for (i, (&coord, &terrain)) in layout.iter().zip(terrain).enumerate() {
            let id = TileId(i as u32);
            let production = terrain.resource().and_then(|_| numbers.next());

            let intersections: Vec<IntersectionId> = coord
                .vertices()
                .into_iter()
                .map(|v| board.intern_intersection(v))
                .collect();
            let edges: Vec<EdgeId> = coord
                .edges()
                .into_iter()
                .map(|e| board.intern_edge(e))
                .collect();

            for iid in &intersections {
                board.intersections[iid.index()].tiles.push(id);
            }
            for eid in &edges {
                board.edges[eid.index()].tiles.push(id);
            }

            board.index.tiles.insert(coord, id);
            board.tiles.push(Tile {
                id,
                coord,
                terrain,
                production,
                intersections,
                edges,
                neighbors: Vec::new(),
            });
        }

        board.link_neighbors();
        board
    }

    fn intern_intersection(&mut self, coord: VertexCoord) -> IntersectionId {
        if let Some(&id) = self.index.intersections.get(&coord) {
            return id;
        }
        let id = IntersectionId(self.intersections.len() as u32);
        self.intersections.push(Intersection {
            id,
            coord,
            tiles: Vec::new(),
            edges: Vec::new(),
            neighbors: Vec::new(),
            building: None,
        });
        self.index.intersections.insert(coord, id);
        id
    }

    fn intern_edge(&mut self, coord: EdgeCoord) -> EdgeId {
        if let Some(&id) = self.index.edges.get(&coord) {
            return id;
        }
        let endpoints = coord.endpoints().map(|v| self.intern_intersection(v));
        let id = EdgeId(self.edges.len() as u32);
        for end in endpoints {
            self.intersections[end.index()].edges.push(id);
        }
        self.edges.push(Edge {
            id,
            coord,
            endpoints,
            tiles: Vec::new(),
            neighbors: Vec::new(),
            road: None,
        });
        self.index.edges.insert(coord, id);
        id
    }

    fn link_neighbors(&mut self) {
        for t in 0..self.tiles.len() {
            let me = self.tiles[t].id;
            let mut neighbors: Vec<TileId> = self.tiles[t]
                .edges
                .iter()
                .flat_map(|e| self.edges[e.index()].tiles.iter().copied())
                .filter(|&other| other != me)
                .collect();
            neighbors.sort();
            neighbors.dedup();
            self.tiles[t].neighbors = neighbors;
        }

        for i in 0..self.intersections.len() {
            let me = self.intersections[i].id;
            let mut neighbors: Vec<IntersectionId> = self.intersections[i]
                .edges
                .iter()
                .filter_map(|e| self.edges[e.index()].other_end(me))
                .collect();
            neighbors.sort();
            self.intersections[i].neighbors = neighbors;
        }

        for e in 0..self.edges.len() {
            let me = self.edges[e].id;
            let mut neighbors: Vec<EdgeId> = self.edges[e]
                .endpoints
                .iter()
                .flat_map(|end| self.intersections[end.index()].edges.iter().copied())
                .filter(|&other| other != me)
                .collect();
            neighbors.sort();
            neighbors.dedup();
            self.edges[e].neighbors = neighbors;
        }
    }

    fn reindex(&mut self) {
        let mut index = CoordIndex::default();
        for tile in &self.tiles {
            index.tiles.insert(tile.coord, tile.id);
        }
        for intersection in &self.intersections {
            index.intersections.insert(intersection.coord, intersection.id);
        }
        for edge in &self.edges {
            index.edges.insert(edge.coord, edge.id);
        }
        self.index = index;
    }

    // ==================== Element Access ====================

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(id.index())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index())
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + Clone {
        self.tiles.iter()
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> + Clone {
        self.intersections.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + Clone {
        self.edges.iter()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn tile_at(&self, coord: &HexCoord) -> Option<TileId> {
        self.index.tiles.get(coord).copied()
    }

    pub fn intersection_at(&self, coord: &VertexCoord) -> Option<IntersectionId> {
        self.index.intersections.get(coord).copied()
    }

    pub fn edge_at(&self, coord: &EdgeCoord) -> Option<EdgeId> {
        self.index.edges.get(coord).copied()
    }

    // ==================== Graph Queries ====================

    /// Same-kind neighbours of `node`: tiles sharing a side, intersections one
    /// edge apart, or edges sharing an endpoint. Unknown ids have none.
    pub fn neighbors(&self, node: NodeId) -> Neighbors<'_> {
        let inner = match node {
            NodeId::Tile(id) => self
                .tile(id)
                .map_or(NeighborsInner::Empty, |t| NeighborsInner::Tiles(t.neighbors.iter())),
            NodeId::Intersection(id) => self.intersection(id).map_or(NeighborsInner::Empty, |i| {
                NeighborsInner::Intersections(i.neighbors.iter())
            }),
            NodeId::Edge(id) => self
                .edge(id)
                .map_or(NeighborsInner::Empty, |e| NeighborsInner::Edges(e.neighbors.iter())),
        };
        Neighbors { inner }
    }

    /// The two endpoints of an edge
    pub fn intersections_of(&self, edge: EdgeId) -> Option<[IntersectionId; 2]> {
        self.edge(edge).map(|e| e.endpoints)
    }

    /// Edges ending at an intersection (empty for unknown ids)
    pub fn edges_of(&self, intersection: IntersectionId) -> &[EdgeId] {
        self.intersection(intersection).map_or(&[], |i| &i.edges)
    }

    /// Tiles meeting at an intersection (empty for unknown ids)
    pub fn tiles_of(&self, intersection: IntersectionId) -> &[TileId] {
        self.intersection(intersection).map_or(&[], |i| &i.tiles)
    }

    pub fn building_at(&self, intersection: IntersectionId) -> Option<Building> {
        self.intersection(intersection).and_then(|i| i.building)
    }

    pub fn road_at(&self, edge: EdgeId) -> Option<Road> {
        self.edge(edge).and_then(|e| e.road)
    }

    /// Intersections at most `distance` edges away, excluding `start` itself
    pub fn within_distance(&self, start: IntersectionId, distance: u8) -> Vec<IntersectionId> {
        let Some(_) = self.intersection(start) else {
            return Vec::new();
        };
        let mut depth = vec![None; self.intersections.len()];
        depth[start.index()] = Some(0u8);
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let d = depth[current.index()].unwrap_or(0);
            if d == distance {
                continue;
            }
            for &next in &self.intersections[current.index()].neighbors {
                if depth[next.index()].is_none() {
                    depth[next.index()] = Some(d + 1);
                    found.push(next);
                    queue.push_back(next);
                }
            }
        }

        found.sort();
        found
    }

    /// Shortest sequence of edges leading from `from` to `to`
    pub fn find_path(&self, from: IntersectionId, to: IntersectionId) -> Option<Vec<EdgeId>> {
        self.find_path_where(from, to, |_| true)
    }

    /// Shortest sequence of edges from `from` to `to` using only edges for
    /// which `passable` holds.
    pub fn find_path_where<F>(
        &self,
        from: IntersectionId,
        to: IntersectionId,
        passable: F,
    ) -> Option<Vec<EdgeId>>
    where
        F: Fn(&Edge) -> bool,
    {
        self.intersection(from)?;
        self.intersection(to)?;
        if from == to {
            return Some(Vec::new());
        }

        let mut came_from: Vec<Option<(IntersectionId, EdgeId)>> =
            vec![None; self.intersections.len()];
        let mut seen = vec![false; self.intersections.len()];
        seen[from.index()] = true;
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for &eid in &self.intersections[current.index()].edges {
                let edge = &self.edges[eid.index()];
                if !passable(edge) {
                    continue;
                }
                let Some(next) = edge.other_end(current) else {
                    continue;
                };
                if seen[next.index()] {
                    continue;
                }
                seen[next.index()] = true;
                came_from[next.index()] = Some((current, eid));
                if next == to {
                    let mut path = Vec::new();
                    let mut at = to;
                    while let Some((prev, via)) = came_from[at.index()] {
                        path.push(via);
                        at = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Greedy count of intersections that can all hold buildings under a
    /// distance rule of `distance`. Used to reject boards too small for setup.
    pub(crate) fn separated_sites(&self, distance: u8) -> usize {
        let mut blocked = vec![false; self.intersections.len()];
        let mut count = 0;
        for intersection in &self.intersections {
            if blocked[intersection.id.index()] {
                continue;
            }
            count += 1;
            blocked[intersection.id.index()] = true;
            for near in self.within_distance(intersection.id, distance) {
                blocked[near.index()] = true;
            }
        }
        count
    }

    // ==================== Longest Road ====================

    /// Length of the player's longest trail of roads. A trail never reuses an
    /// edge and cannot pass through an opponent's building.
    pub fn longest_road(&self, player: PlayerId) -> u32 {
        let mut visited = vec![false; self.edges.len()];
        let mut best = 0;

        for edge in self.edges.iter().filter(|e| owns_road(e, player)) {
            visited[edge.id.index()] = true;
            for end in edge.endpoints {
                best = best.max(1 + self.extend_trail(player, end, &mut visited));
            }
            visited[edge.id.index()] = false;
        }

        best
    }

    /// Longest continuation of a trail that has just arrived at `at`
    fn extend_trail(&self, player: PlayerId, at: IntersectionId, visited: &mut [bool]) -> u32 {
        let blocked = self
            .building_at(at)
            .is_some_and(|building| building.owner != player);
        if blocked {
            return 0;
        }

        let mut best = 0;
        for &next in &self.intersections[at.index()].edges {
            let edge = &self.edges[next.index()];
            if visited[next.index()] || !owns_road(edge, player) {
                continue;
            }
            let Some(far) = edge.other_end(at) else {
                continue;
            };
            visited[next.index()] = true;
            best = best.max(1 + self.extend_trail(player, far, visited));
            visited[next.index()] = false;
        }
        best
    }

    // ==================== Integrity ====================

    /// Verify the structural invariants: ids match table positions, every
    /// reference resolves, edges join two distinct intersections, incidence
    /// and adjacency are symmetric, and no element exceeds its degree.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        for (pos, tile) in self.tiles.iter().enumerate() {
            let node = NodeId::Tile(tile.id);
            if tile.id.index() != pos {
                return Err(IntegrityError::MisplacedId { node });
            }
            for &iid in &tile.intersections {
                let intersection = self.intersection(iid).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Intersection(iid),
                })?;
                if !intersection.tiles.contains(&tile.id) {
                    return Err(asymmetric(node, NodeId::Intersection(iid)));
                }
            }
            for &eid in &tile.edges {
                let edge = self.edge(eid).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Edge(eid),
                })?;
                if !edge.tiles.contains(&tile.id) {
                    return Err(asymmetric(node, NodeId::Edge(eid)));
                }
            }
            for &other in &tile.neighbors {
                let neighbor = self.tile(other).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Tile(other),
                })?;
                if !neighbor.neighbors.contains(&tile.id) {
                    return Err(asymmetric(node, NodeId::Tile(other)));
                }
            }
        }

        for (pos, intersection) in self.intersections.iter().enumerate() {
            let node = NodeId::Intersection(intersection.id);
            if intersection.id.index() != pos {
                return Err(IntegrityError::MisplacedId { node });
            }
            for count in [intersection.edges.len(), intersection.tiles.len()] {
                if count > 3 {
                    return Err(IntegrityError::TooManyIncident { node, count });
                }
            }
            for &eid in &intersection.edges {
                let edge = self.edge(eid).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Edge(eid),
                })?;
                if !edge.endpoints.contains(&intersection.id) {
                    return Err(asymmetric(node, NodeId::Edge(eid)));
                }
            }
            for &tid in &intersection.tiles {
                let tile = self.tile(tid).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Tile(tid),
                })?;
                if !tile.intersections.contains(&intersection.id) {
                    return Err(asymmetric(node, NodeId::Tile(tid)));
                }
            }
            for &other in &intersection.neighbors {
                let neighbor = self.intersection(other).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Intersection(other),
                })?;
                if !neighbor.neighbors.contains(&intersection.id) {
                    return Err(asymmetric(node, NodeId::Intersection(other)));
                }
            }
        }

        for (pos, edge) in self.edges.iter().enumerate() {
            let node = NodeId::Edge(edge.id);
            if edge.id.index() != pos {
                return Err(IntegrityError::MisplacedId { node });
            }
            let [a, b] = edge.endpoints;
            if a == b {
                return Err(IntegrityError::DegenerateEdge {
                    edge: edge.id,
                    intersection: a,
                });
            }
            for end in edge.endpoints {
                let intersection = self.intersection(end).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Intersection(end),
                })?;
                if !intersection.edges.contains(&edge.id) {
                    return Err(asymmetric(node, NodeId::Intersection(end)));
                }
            }
            for &tid in &edge.tiles {
                let tile = self.tile(tid).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Tile(tid),
                })?;
                if !tile.edges.contains(&edge.id) {
                    return Err(asymmetric(node, NodeId::Tile(tid)));
                }
            }
            for &other in &edge.neighbors {
                let neighbor = self.edge(other).ok_or(IntegrityError::DanglingReference {
                    node,
                    missing: NodeId::Edge(other),
                })?;
                if !neighbor.neighbors.contains(&edge.id) {
                    return Err(asymmetric(node, NodeId::Edge(other)));
                }
            }
        }

        Ok(())
    }

    /// Every production number must be a total `dice` can roll
    pub fn check_production(&self, dice: &DiceConfig) -> Result<(), IntegrityError> {
        match self
            .tiles
            .iter()
            .find_map(|t| t.production.filter(|n| !dice.can_roll(*n)).map(|n| (t.id, n)))
        {
            Some((tile, value)) => Err(IntegrityError::UnrollableProduction { tile, value }),
            None => Ok(()),
        }
    }

    // ==================== Mutation Methods ====================
    // Callers validate first; these only record occupancy.

    pub(crate) fn place_road(&mut self, edge: EdgeId, owner: PlayerId) {
        if let Some(e) = self.edges.get_mut(edge.index()) {
            e.road = Some(Road { owner });
        }
    }

    pub(crate) fn place_building(&mut self, intersection: IntersectionId, building: Building) {
        if let Some(i) = self.intersections.get_mut(intersection.index()) {
            i.building = Some(building);
        }
    }

    pub(crate) fn upgrade_to_city(&mut self, intersection: IntersectionId) {
        if let Some(Building { kind, .. }) = self
            .intersections
            .get_mut(intersection.index())
            .and_then(|i| i.building.as_mut())
        {
            *kind = BuildingKind::City;
        }
    }
}

fn owns_road(edge: &Edge, player: PlayerId) -> bool {
    edge.road.is_some_and(|road| road.owner == player)
}

fn asymmetric(from: NodeId, to: NodeId) -> IntegrityError {
    IntegrityError::Asymmetric { from, to }
}

/// Reject empty, duplicated or disconnected layouts
fn validate_layout(layout: &[HexCoord]) -> Result<(), ConfigError> {
    let Some(&first) = layout.first() else {
        return Err(ConfigError::EmptyLayout);
    };

    let mut cells = HashSet::new();
    for coord in layout {
        if !cells.insert(*coord) {
            return Err(ConfigError::DuplicateTile(*coord));
        }
    }

    let mut reached = HashSet::from([first]);
    let mut queue = VecDeque::from([first]);
    while let Some(coord) = queue.pop_front() {
        for neighbor in coord.neighbors() {
            if cells.contains(&neighbor) && reached.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    match layout.iter().find(|c| !reached.contains(c)) {
        Some(unreached) => Err(ConfigError::DisconnectedLayout(*unreached)),
        None => Ok(()),
    }
}

fn assign_terrain<R: Rng + ?Sized>(
    config: &BoardConfig,
    tiles: usize,
    rng: &mut R,
) -> Result<Vec<Terrain>, ConfigError> {
    let mut terrain = match &config.terrain {
        Some(list) => {
            if list.len() != tiles {
                return Err(ConfigError::TerrainCount {
                    expected: tiles,
                    actual: list.len(),
                });
            }
            list.clone()
        }
        None => {
            if config.deserts > tiles {
                return Err(ConfigError::TooManyDeserts {
                    deserts: config.deserts,
                    tiles,
                });
            }
            let mut list = vec![Terrain::Desert; config.deserts];
            list.extend(
                TERRAIN_CYCLE
                    .iter()
                    .cycle()
                    .take(tiles - config.deserts)
                    .map(|r| Terrain::Resource(*r)),
            );
            list
        }
    };

    if config.shuffle {
        terrain.shuffle(rng);
    }
    Ok(terrain)
}

/// Production numbers for the producing tiles, in layout order
fn assign_numbers<R: Rng + ?Sized>(
    config: &BoardConfig,
    dice: &DiceConfig,
    producing: &[HexCoord],
    rng: &mut R,
) -> Result<Vec<u8>, ConfigError> {
    let numbers = match &config.numbers {
        Some(list) => {
            if list.len() != producing.len() {
                return Err(ConfigError::NumberCount {
                    expected: producing.len(),
                    actual: list.len(),
                });
            }
            if let Some(&value) = list.iter().find(|v| !dice.can_roll(**v)) {
                return Err(ConfigError::UnrollableNumber {
                    value,
                    count: dice.count,
                    sides: dice.sides,
                });
            }
            list.clone()
        }
        None => dice
            .production_values()
            .into_iter()
            .cycle()
            .take(producing.len())
            .collect(),
    };

    if !config.shuffle {
        return Ok(numbers);
    }

    let hot = dice.hot_values();
    let mut shuffled = numbers.clone();
    for _ in 0..MAX_NUMBER_SHUFFLES {
        shuffled.shuffle(rng);
        if hot_numbers_apart(producing, &shuffled, &hot) {
            return Ok(shuffled);
        }
    }
    // Keep the last shuffle when the layout cannot keep them apart
    Ok(shuffled)
}

/// Whether no two tiles carrying one of the `hot` numbers touch
fn hot_numbers_apart(producing: &[HexCoord], numbers: &[u8], hot: &[u8]) -> bool {
    let hot_tiles: HashSet<HexCoord> = producing
        .iter()
        .zip(numbers)
        .filter(|(_, n)| hot.contains(n))
        .map(|(c, _)| *c)
        .collect();

    hot_tiles
        .iter()
        .all(|c| c.neighbors().iter().all(|n| !hot_tiles.contains(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardShape;
    use crate::hex::VertexDirection;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn standard_board(seed: u64) -> Board {
        let config = GameConfig::default();
        Board::generate(&config, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn center_north(board: &Board) -> IntersectionId {
        board
            .intersection_at(&VertexCoord::new(HexCoord::new(0, 0), VertexDirection::North))
            .unwrap()
    }

    #[test]
    fn test_default_board_dimensions() {
        let board = standard_board(1);
        assert_eq!(board.tile_count(), 19);
        assert_eq!(board.intersection_count(), 54);
        assert_eq!(board.edge_count(), 72);
        board.check_integrity().unwrap();
    }

    #[test]
    fn test_default_board_has_one_desert_without_number() {
        let board = standard_board(2);
        let deserts: Vec<_> = board
            .tiles()
            .filter(|t| t.terrain == Terrain::Desert)
            .collect();
        assert_eq!(deserts.len(), 1);
        assert_eq!(deserts[0].production, None);
        assert!(board
            .tiles()
            .filter(|t| t.terrain != Terrain::Desert)
            .all(|t| t.production.is_some()));
    }

    #[test]
    fn test_default_resource_counts() {
        let board = standard_board(3);
        let mut counts: HashMap<Resource, u32> = HashMap::new();
        for tile in board.tiles() {
            if let Some(r) = tile.resource() {
                *counts.entry(r).or_default() += 1;
            }
        }
        assert_eq!(counts[&Resource::Lumber], 4);
        assert_eq!(counts[&Resource::Grain], 4);
        assert_eq!(counts[&Resource::Wool], 4);
        assert_eq!(counts[&Resource::Brick], 3);
        assert_eq!(counts[&Resource::Ore], 3);
    }

    #[test]
    fn test_default_number_distribution() {
        let board = standard_board(4);
        let mut counts: HashMap<u8, u32> = HashMap::new();
        for n in board.tiles().filter_map(|t| t.production) {
            *counts.entry(n).or_default() += 1;
        }
        assert_eq!(counts.get(&2), Some(&1));
        assert_eq!(counts.get(&12), Some(&1));
        assert_eq!(counts.get(&7), None);
        for n in [3, 4, 5, 6, 8, 9, 10, 11] {
            assert_eq!(counts.get(&n), Some(&2), "number {n}");
        }
    }

    #[test]
    fn test_no_adjacent_hot_numbers() {
        for seed in 0..10 {
            let board = standard_board(seed);
            for tile in board.tiles().filter(|t| matches!(t.production, Some(6 | 8))) {
                for &n in &tile.neighbors {
                    let other = board.tile(n).unwrap();
                    assert!(
                        !matches!(other.production, Some(6 | 8)),
                        "seed {seed}: {} and {} both hot",
                        tile.id,
                        other.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_board() {
        assert_eq!(standard_board(42), standard_board(42));
        let boards: Vec<_> = (0..5).map(standard_board).collect();
        assert!(boards.iter().any(|b| *b != boards[0]));
    }

    #[test]
    fn test_intersection_and_edge_degrees() {
        let board = standard_board(5);
        for intersection in board.intersections() {
            assert!((1..=3).contains(&intersection.tiles.len()));
            assert!((2..=3).contains(&intersection.edges.len()));
        }
        for edge in board.edges() {
            assert!((1..=2).contains(&edge.tiles.len()));
        }
        let center = board.tile_at(&HexCoord::new(0, 0)).unwrap();
        assert!(!board.tile(center).unwrap().is_at_coast());
    }

    #[test]
    fn test_neighbors_are_restartable_and_symmetric() {
        let board = standard_board(6);
        let node = NodeId::Intersection(center_north(&board));
        let first: Vec<_> = board.neighbors(node).collect();
        let again: Vec<_> = board.neighbors(node).collect();
        assert_eq!(first, again);
        assert_eq!(first.len(), 3);
        for n in first {
            assert!(board.neighbors(n).any(|back| back == node));
        }
        assert_eq!(board.neighbors(NodeId::Edge(EdgeId(9999))).count(), 0);
    }

    #[test]
    fn test_tile_neighbors_match_hex_adjacency() {
        let board = standard_board(7);
        let center = board.tile_at(&HexCoord::new(0, 0)).unwrap();
        let neighbors: Vec<_> = board.neighbors(NodeId::Tile(center)).collect();
        assert_eq!(neighbors.len(), 6);
    }

    #[test]
    fn test_find_path() {
        let board = standard_board(8);
        let start = center_north(&board);
        let south = board
            .intersection_at(&VertexCoord::new(HexCoord::new(0, 0), VertexDirection::South))
            .unwrap();
        let path = board.find_path(start, south).unwrap();
        assert_eq!(path.len(), 3);

        let mut at = start;
        for edge in &path {
            at = board.edge(*edge).unwrap().other_end(at).unwrap();
        }
        assert_eq!(at, south);
        assert_eq!(board.find_path(start, start), Some(vec![]));
        assert_eq!(board.find_path_where(start, south, |_| false), None);
    }

    #[test]
    fn test_within_distance() {
        let board = standard_board(9);
        let start = center_north(&board);
        assert_eq!(board.within_distance(start, 1).len(), 3);
        assert_eq!(board.within_distance(start, 2).len(), 9);
    }

    #[test]
    fn test_longest_road_chain_and_block() {
        let mut board = standard_board(10);
        let center = board.tile_at(&HexCoord::new(0, 0)).unwrap();
        let tile = board.tile(center).unwrap().clone();

        // Four consecutive sides of the centre tile
        for edge in &tile.edges[..4] {
            board.place_road(*edge, 0);
        }
        assert_eq!(board.longest_road(0), 4);
        assert_eq!(board.longest_road(1), 0);

        // An opponent settlement on the south-east corner splits the trail
        board.place_building(
            tile.intersections[2],
            Building {
                kind: BuildingKind::Settlement,
                owner: 1,
            },
        );
        assert_eq!(board.longest_road(0), 2);
    }

    #[test]
    fn test_longest_road_does_not_count_branches() {
        let mut board = standard_board(11);
        let hub = center_north(&board);
        for &edge in board.edges_of(hub).to_vec().iter() {
            board.place_road(edge, 0);
        }
        // Three spokes around one corner form a trail of two at most
        assert_eq!(board.longest_road(0), 2);
    }

    #[test]
    fn test_city_upgrade_keeps_owner() {
        let mut board = standard_board(12);
        let site = center_north(&board);
        board.place_building(
            site,
            Building {
                kind: BuildingKind::Settlement,
                owner: 2,
            },
        );
        board.upgrade_to_city(site);
        assert_eq!(
            board.building_at(site),
            Some(Building {
                kind: BuildingKind::City,
                owner: 2
            })
        );
    }

    #[test]
    fn test_serde_round_trip_rebuilds_index() {
        let mut board = standard_board(13);
        board.place_road(EdgeId(3), 1);
        let json = serde_json::to_string(&board).unwrap();
        let restored: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, board);
        let coord = board.edge(EdgeId(3)).unwrap().coord;
        assert_eq!(restored.edge_at(&coord), Some(EdgeId(3)));
    }

    #[test]
    fn test_integrity_detects_asymmetry() {
        let mut board = standard_board(14);
        board.intersections[0].edges.clear();
        assert!(matches!(
            board.check_integrity(),
            Err(IntegrityError::Asymmetric { .. })
        ));
    }

    #[test]
    fn test_integrity_detects_dangling_tiles() {
        // Coastal elements have room for one more tile
        let mut board = standard_board(15);
        let corner = board.intersections.iter().position(|i| i.tiles.len() < 3).unwrap();
        board.intersections[corner].tiles.push(TileId(500));
        assert_eq!(
            board.check_integrity(),
            Err(IntegrityError::DanglingReference {
                node: NodeId::Intersection(IntersectionId(corner as u32)),
                missing: NodeId::Tile(TileId(500)),
            })
        );

        let mut board = standard_board(15);
        let side = board.edges.iter().position(|e| e.tiles.len() == 1).unwrap();
        board.edges[side].tiles.push(TileId(900));
        assert_eq!(
            board.check_integrity(),
            Err(IntegrityError::DanglingReference {
                node: NodeId::Edge(EdgeId(side as u32)),
                missing: NodeId::Tile(TileId(900)),
            })
        );
    }

    #[test]
    fn test_production_must_be_rollable() {
        let mut board = standard_board(16);
        let dice = DiceConfig::default();
        assert_eq!(board.check_production(&dice), Ok(()));

        let tile = board.tiles.iter().position(|t| t.production.is_some()).unwrap();
        board.tiles[tile].production = Some(13);
        assert_eq!(
            board.check_production(&dice),
            Err(IntegrityError::UnrollableProduction {
                tile: TileId(tile as u32),
                value: 13
            })
        );
    }

    #[test]
    fn test_generate_rejects_bad_layouts() {
        let mut rng = StdRng::seed_from_u64(0);

        let mut config = GameConfig::default();
        config.board.shape = BoardShape::Custom(vec![]);
        assert_eq!(Board::generate(&config, &mut rng), Err(ConfigError::EmptyLayout));

        config.board.shape = BoardShape::Custom(vec![HexCoord::new(0, 0), HexCoord::new(3, 0)]);
        assert!(matches!(
            Board::generate(&config, &mut rng),
            Err(ConfigError::DisconnectedLayout(_))
        ));

        config.board.shape = BoardShape::Hexagon { radius: 1 };
        assert!(matches!(
            Board::generate(&config, &mut rng),
            Err(ConfigError::TooFewTiles { .. })
        ));

        let mut config = GameConfig::default();
        config.board.numbers = Some(vec![13; 18]);
        assert!(matches!(
            Board::generate(&config, &mut rng),
            Err(ConfigError::UnrollableNumber { value: 13, .. })
        ));
    }

    #[test]
    fn test_generate_rejects_crowded_setup() {
        let mut config = GameConfig::default();
        config.board.shape = BoardShape::Hexagon { radius: 1 };
        config.board.min_tiles_per_player = 1;
        config.placement.distance = 4;
        let result = Board::generate(&config, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(ConfigError::NotEnoughSites { .. })));
    }
}
