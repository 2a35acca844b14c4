//! Computer players.
//!
//! This module provides different difficulty levels of AI players:
//! - Easy: Random valid commands
//! - Medium: Basic heuristics (best production spots, build before ending)
//! - Hard: Resource diversity, road planning and bank trades toward a build
//!
//! Bots only ever pick from [`Game::valid_commands`], so every command they
//! return is accepted by the engine. They never resign.

use crate::actions::GameCommand;
use crate::board::{EdgeId, IntersectionId, PlayerId, Resource};
use crate::game::Game;
use crate::player::ResourceHand;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotDifficulty {
    Easy,
    Medium,
    Hard,
}

/// A bot player that can decide on commands
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    rng: StdRng,
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Choose a command from the valid commands, or `None` when it is not
    /// this bot's move.
    pub fn choose_command(&mut self, game: &Game) -> Option<GameCommand> {
        let commands: Vec<GameCommand> = game
            .valid_commands(self.player_id)
            .into_iter()
            .filter(|c| *c != GameCommand::Resign)
            .collect();
        if commands.is_empty() {
            return None;
        }

        match self.difficulty {
            BotDifficulty::Easy => self.choose_easy(&commands),
            BotDifficulty::Medium => self.choose_medium(game, &commands),
            BotDifficulty::Hard => self.choose_hard(game, &commands),
        }
    }

    /// Easy: Just pick a random valid command
    fn choose_easy(&mut self, commands: &[GameCommand]) -> Option<GameCommand> {
        commands.choose(&mut self.rng).cloned()
    }

    /// Medium: roll, take good spots, build what is affordable
    fn choose_medium(&mut self, game: &Game, commands: &[GameCommand]) -> Option<GameCommand> {
        if let Some(roll) = commands.iter().find(|c| matches!(c, GameCommand::RollDice { .. })) {
            return Some(roll.clone());
        }

        let spots = building_spots(commands);
        if !spots.is_empty() {
            let best = self.rank_spots(game, &spots, false);
            return best.map(GameCommand::PlaceBuilding);
        }

        let cities = city_spots(commands);
        if let Some(city) = cities.choose(&mut self.rng) {
            return Some(GameCommand::UpgradeCity(*city));
        }

        let roads = road_spots(commands);
        let setup = !commands.contains(&GameCommand::EndTurn);
        if !roads.is_empty() && (setup || self.rng.gen_bool(0.3)) {
            return roads.choose(&mut self.rng).map(|e| GameCommand::PlaceRoad(*e));
        }

        if commands.contains(&GameCommand::EndTurn) {
            return Some(GameCommand::EndTurn);
        }

        commands.choose(&mut self.rng).cloned()
    }

    /// Hard: plan builds and trade toward them
    fn choose_hard(&mut self, game: &Game, commands: &[GameCommand]) -> Option<GameCommand> {
        if let Some(roll) = commands.iter().find(|c| matches!(c, GameCommand::RollDice { .. })) {
            return Some(roll.clone());
        }

        let player = game.player(self.player_id)?;
        let costs = game.config().costs;

        // City once a few settlements stand
        let cities = city_spots(commands);
        if !cities.is_empty() && player.settlements.len() + player.cities.len() >= 3 {
            return self.rank_spots(game, &cities, true).map(GameCommand::UpgradeCity);
        }

        let spots = building_spots(commands);
        if !spots.is_empty() {
            return self.rank_spots(game, &spots, true).map(GameCommand::PlaceBuilding);
        }

        let roads = road_spots(commands);
        let setup = !commands.contains(&GameCommand::EndTurn);
        if !roads.is_empty() && (setup || player.roads.len() < 8) {
            return self.rank_roads(game, &roads).map(GameCommand::PlaceRoad);
        }

        if let Some(city) = cities.first() {
            return Some(GameCommand::UpgradeCity(*city));
        }

        for target in [costs.city, costs.settlement] {
            if let Some(trade) = trade_toward(&player.resources, &target, commands) {
                return Some(trade);
            }
        }

        if commands.contains(&GameCommand::EndTurn) {
            return Some(GameCommand::EndTurn);
        }

        commands.choose(&mut self.rng).cloned()
    }

    /// Pick among the best-scoring intersections. Advanced ranking adds
    /// resource diversity and favours resources the bot lacks.
    fn rank_spots(
        &mut self,
        game: &Game,
        spots: &[IntersectionId],
        advanced: bool,
    ) -> Option<IntersectionId> {
        let mut scored: Vec<(IntersectionId, u64)> = spots
            .iter()
            .map(|&at| {
                let score = if advanced {
                    self.score_intersection_advanced(game, at)
                } else {
                    score_intersection(game, at)
                };
                (at, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        if advanced {
            return scored.first().map(|(at, _)| *at);
        }
        // Pick from top 3 with some randomness
        let top: Vec<_> = scored.iter().take(3).collect();
        top.choose(&mut self.rng).map(|(at, _)| *at)
    }

    fn score_intersection_advanced(&self, game: &Game, at: IntersectionId) -> u64 {
        let mut score = score_intersection(game, at);
        let resources = intersection_resources(game, at);
        let unique: HashSet<_> = resources.iter().collect();
        score += unique.len() as u64 * 3;

        if let Some(player) = game.player(self.player_id) {
            score += resources
                .iter()
                .filter(|r| player.resources.get(**r) == 0)
                .count() as u64
                * 5;
        }
        score
    }

    /// Prefer roads whose far end is an open, valuable spot
    fn rank_roads(&mut self, game: &Game, roads: &[EdgeId]) -> Option<EdgeId> {
        let board = game.board();
        let distance = game.config().placement.distance;
        let open = |at: IntersectionId| {
            board.building_at(at).is_none()
                && board
                    .within_distance(at, distance)
                    .iter()
                    .all(|near| board.building_at(*near).is_none())
        };

        let mut scored: Vec<(EdgeId, u64)> = roads
            .iter()
            .map(|&edge| {
                let score = board
                    .intersections_of(edge)
                    .into_iter()
                    .flatten()
                    .filter(|at| open(*at))
                    .map(|at| score_intersection(game, at))
                    .max()
                    .unwrap_or(0);
                (edge, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let best = scored.first()?.1;
        let tied: Vec<EdgeId> = scored
            .iter()
            .take_while(|(_, s)| *s == best)
            .map(|(e, _)| *e)
            .collect();
        tied.choose(&mut self.rng).copied()
    }
}

/// Production weight of an intersection: the number of dice combinations
/// that pay out from its tiles.
fn score_intersection(game: &Game, at: IntersectionId) -> u64 {
    let dice = game.config().dice;
    let board = game.board();
    board
        .tiles_of(at)
        .iter()
        .filter_map(|t| board.tile(*t))
        .filter(|t| t.resource().is_some())
        .filter_map(|t| t.production)
        .map(|n| dice.ways(n))
        .sum()
}

fn intersection_resources(game: &Game, at: IntersectionId) -> Vec<Resource> {
    let board = game.board();
    board
        .tiles_of(at)
        .iter()
        .filter_map(|t| board.tile(*t))
        .filter_map(|t| t.resource())
        .collect()
}

/// A bank trade that fills one gap in `target` using a surplus resource
fn trade_toward(
    hand: &ResourceHand,
    target: &ResourceHand,
    commands: &[GameCommand],
) -> Option<GameCommand> {
    let (missing, _, _) = hand.shortfall(target)?;
    commands
        .iter()
        .filter(|c| matches!(c, GameCommand::BankTrade { receive, .. } if *receive == missing))
        .find(|c| match c {
            // Only trade away what the target does not need
            GameCommand::BankTrade { give, .. } => hand.get(*give) > target.get(*give),
            _ => false,
        })
        .cloned()
}

fn building_spots(commands: &[GameCommand]) -> Vec<IntersectionId> {
    commands
        .iter()
        .filter_map(|c| match c {
            GameCommand::PlaceBuilding(at) => Some(*at),
            _ => None,
        })
        .collect()
}

fn city_spots(commands: &[GameCommand]) -> Vec<IntersectionId> {
    commands
        .iter()
        .filter_map(|c| match c {
            GameCommand::UpgradeCity(at) => Some(*at),
            _ => None,
        })
        .collect()
}

fn road_spots(commands: &[GameCommand]) -> Vec<EdgeId> {
    commands
        .iter()
        .filter_map(|c| match c {
            GameCommand::PlaceRoad(edge) => Some(*edge),
            _ => None,
        })
        .collect()
}
