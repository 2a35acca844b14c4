//! Core game engine.
//!
//! [`Game`] owns the whole [`GameState`] and is the only thing that mutates
//! it. Every command is validated completely before anything changes, so a
//! rejected command leaves the game exactly as it was.

use crate::actions::{CommandKind, GameCommand, GameEvent};
use crate::board::{Board, Building, BuildingKind, EdgeId, IntersectionId, PlayerId, Resource};
use crate::config::GameConfig;
use crate::dice::{dice_seed, DiceSource, SeededDice};
use crate::error::GameError;
use crate::phase::{Phase, TurnMachine};
use crate::placement::{self, PlacementContext};
use crate::player::{exchange, PieceKind, Player, PlayerColor, ResourceHand};
use crate::production::{distribute, produce, yield_around, Bank};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Everything needed to continue a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub config: GameConfig,
    pub board: Board,
    pub players: Vec<Player>,
    pub bank: Bank,
    pub turn: TurnMachine,
    /// Total of the current turn's roll
    pub last_roll: Option<u8>,
    /// Dice faces drawn from the random source so far
    pub dice_draws: u64,
    /// Holder of the longest road bonus
    pub longest_road: Option<PlayerId>,
}

impl GameState {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    /// Total victory points of a player (0 for unknown seats)
    pub fn victory_points(&self, id: PlayerId) -> u32 {
        let bonus = self.config.longest_road.map_or(0, |rule| rule.points);
        self.player(id).map_or(0, |p| p.victory_points(bonus))
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.active)
    }

    pub fn to_json(&self) -> Result<String, GameError> {
        serde_json::to_string(self).map_err(|e| GameError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, GameError> {
        serde_json::from_str(json).map_err(|e| GameError::Snapshot(e.to_string()))
    }

    /// Player back-references must agree with the pieces on the board
    fn check_ownership(&self) -> Result<(), String> {
        for intersection in self.board.intersections() {
            let Some(building) = intersection.building else {
                continue;
            };
            let owner = self
                .player(building.owner)
                .ok_or_else(|| format!("{} is owned by unknown player {}", intersection.id, building.owner))?;
            let listed = match building.kind {
                BuildingKind::Settlement => owner.settlements.contains(&intersection.id),
                BuildingKind::City => owner.cities.contains(&intersection.id),
            };
            if !listed {
                return Err(format!("player {} does not list {}", owner.id, intersection.id));
            }
        }
        for edge in self.board.edges() {
            let Some(road) = edge.road else {
                continue;
            };
            let owner = self
                .player(road.owner)
                .ok_or_else(|| format!("{} is owned by unknown player {}", edge.id, road.owner))?;
            if !owner.roads.contains(&edge.id) {
                return Err(format!("player {} does not list {}", owner.id, edge.id));
            }
        }

        for player in &self.players {
            let settlements = player.settlements.iter().map(|i| (*i, BuildingKind::Settlement));
            let cities = player.cities.iter().map(|i| (*i, BuildingKind::City));
            for (at, kind) in settlements.chain(cities) {
                let expected = Some(Building {
                    kind,
                    owner: player.id,
                });
                if self.board.building_at(at) != expected {
                    return Err(format!("player {} lists {at} but the board disagrees", player.id));
                }
            }
            for &edge in &player.roads {
                if self.board.road_at(edge).map(|r| r.owner) != Some(player.id) {
                    return Err(format!("player {} lists {edge} but the board disagrees", player.id));
                }
            }
        }
        Ok(())
    }
}

/// A running game
pub struct Game {
    state: GameState,
    dice: Box<dyn DiceSource>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Validate `config`, generate the board and open the first setup step.
    pub fn start(config: GameConfig) -> Result<(Self, Vec<GameEvent>), GameError> {
        let dice = SeededDice::new(dice_seed(config.seed));
        Self::start_with_dice(config, Box::new(dice))
    }

    /// Like [`Game::start`], rolling with an injected dice source
    pub fn start_with_dice(
        config: GameConfig,
        dice: Box<dyn DiceSource>,
    ) -> Result<(Self, Vec<GameEvent>), GameError> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let board = Board::generate(&config, &mut rng)?;

        let players: Vec<Player> = config
            .players
            .iter()
            .enumerate()
            .map(|(seat, setup)| {
                let id = seat as PlayerId;
                let color = setup.color.unwrap_or_else(|| PlayerColor::for_player(id));
                Player::new(id, config.player_name(seat), color, setup.is_ai)
            })
            .collect();
        let bank = Bank::new(config.initial_supply());
        let turn = TurnMachine::new(players.len(), config.first_player, &config.setup);

        let events = vec![
            GameEvent::GameStarted {
                players: players.iter().map(|p| p.name.clone()).collect(),
                first_player: config.first_player,
                seed: config.seed,
            },
            GameEvent::PhaseChanged {
                phase: turn.phase(),
                player: turn.current_player(),
            },
        ];
        debug!(
            players = players.len(),
            tiles = board.tile_count(),
            seed = config.seed,
            "game started"
        );

        let state = GameState {
            config,
            board,
            players,
            bank,
            turn,
            last_roll: None,
            dice_draws: 0,
            longest_road: None,
        };
        Ok((Self { state, dice }, events))
    }

    /// Continue a game from a snapshot. The dice are re-seeded and advanced
    /// past every face already drawn, so the game continues exactly as the
    /// original would have.
    pub fn restore(state: GameState) -> Result<Self, GameError> {
        state.config.validate()?;
        state
            .board
            .check_integrity()
            .and_then(|()| state.board.check_production(&state.config.dice))
            .map_err(|e| GameError::Snapshot(e.to_string()))?;

        if state.players.len() != state.config.players.len() || state.turn.seats() != state.players.len() {
            return Err(GameError::Snapshot(
                "player count does not match the configuration".into(),
            ));
        }
        if let Some((seat, _)) = state
            .players
            .iter()
            .enumerate()
            .find(|(seat, p)| p.id as usize != *seat)
        {
            return Err(GameError::Snapshot(format!("seat {seat} holds the wrong player")));
        }
        if !state.turn.is_consistent() {
            return Err(GameError::Snapshot("turn state is inconsistent".into()));
        }
        state.check_ownership().map_err(GameError::Snapshot)?;

        // At most one roll per turn
        let max_draws = u64::from(state.turn.turn()) * u64::from(state.config.dice.count);
        if state.dice_draws > max_draws {
            return Err(GameError::Snapshot(format!(
                "{} dice drawn in {} turns",
                state.dice_draws,
                state.turn.turn()
            )));
        }

        let dice = SeededDice::resume(
            dice_seed(state.config.seed),
            state.dice_draws,
            state.config.dice.sides,
        );
        debug!(turn = state.turn.turn(), "game restored");
        Ok(Self {
            state,
            dice: Box::new(dice),
        })
    }

    // ==================== Query Methods ====================

    pub fn current_state(&self) -> &GameState {
        &self.state
    }

    /// Serializable copy of the full state
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    pub fn config(&self) -> &GameConfig {
        &self.state.config
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub fn players(&self) -> &[Player] {
        &self.state.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.state.player(id)
    }

    pub fn bank(&self) -> &Bank {
        &self.state.bank
    }

    pub fn phase(&self) -> Phase {
        self.state.turn.phase()
    }

    pub fn current_player(&self) -> PlayerId {
        self.state.turn.current_player()
    }

    pub fn turn_number(&self) -> u32 {
        self.state.turn.turn()
    }

    pub fn last_roll(&self) -> Option<u8> {
        self.state.last_roll
    }

    pub fn is_over(&self) -> bool {
        self.state.turn.is_over()
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase() {
            Phase::GameOver { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn victory_points(&self, player: PlayerId) -> u32 {
        self.state.victory_points(player)
    }

    pub fn player_inventory(&self, player: PlayerId) -> Result<&ResourceHand, GameError> {
        self.state
            .player(player)
            .map(|p| &p.resources)
            .ok_or(GameError::UnknownPlayer(player))
    }

    /// Edges where the placement rules would accept a road from `player`
    /// right now. Turn, phase and cost are not considered.
    pub fn legal_road_placements(&self, player: PlayerId) -> Vec<EdgeId> {
        placement::legal_roads(&self.state.board, player, &self.road_context())
    }

    /// Intersections where the placement rules would accept a settlement
    /// from `player` right now. Turn, phase and cost are not considered.
    pub fn legal_building_placements(&self, player: PlayerId) -> Vec<IntersectionId> {
        placement::legal_buildings(
            &self.state.board,
            player,
            &self.building_context(),
            &self.state.config.placement,
        )
    }

    pub fn legal_city_upgrades(&self, player: PlayerId) -> Vec<IntersectionId> {
        placement::legal_city_upgrades(&self.state.board, player)
    }

    /// Concrete commands `player` could issue successfully right now.
    /// Trades with other players are open-ended and not listed.
    pub fn valid_commands(&self, player: PlayerId) -> Vec<GameCommand> {
        let Some(seat) = self.state.player(player) else {
            return Vec::new();
        };
        if !seat.active {
            return Vec::new();
        }

        let config = &self.state.config;
        let setup = matches!(self.phase(), Phase::Setup(_));
        let affordable = |cost: &ResourceHand| setup || seat.resources.can_afford(cost);
        let has_piece = |piece| seat.pieces_remaining(piece, &config.pieces) > 0;

        let mut commands = Vec::new();
        for kind in CommandKind::ALL {
            if self.state.turn.authorize(player, kind).is_err() {
                continue;
            }
            match kind {
                CommandKind::RollDice => commands.push(GameCommand::RollDice { forced: None }),
                CommandKind::PlaceBuilding => {
                    if has_piece(PieceKind::Settlement) && affordable(&config.costs.settlement) {
                        commands.extend(
                            self.legal_building_placements(player)
                                .into_iter()
                                .map(GameCommand::PlaceBuilding),
                        );
                    }
                }
                CommandKind::PlaceRoad => {
                    if has_piece(PieceKind::Road) && affordable(&config.costs.road) {
                        commands.extend(
                            self.legal_road_placements(player)
                                .into_iter()
                                .map(GameCommand::PlaceRoad),
                        );
                    }
                }
                CommandKind::UpgradeCity => {
                    if has_piece(PieceKind::City) && seat.resources.can_afford(&config.costs.city) {
                        commands.extend(
                            self.legal_city_upgrades(player)
                                .into_iter()
                                .map(GameCommand::UpgradeCity),
                        );
                    }
                }
                CommandKind::ProposeTrade => {}
                CommandKind::BankTrade => {
                    for give in Resource::ALL {
                        if seat.resources.get(give) < config.trade.bank_ratio {
                            continue;
                        }
                        for receive in Resource::ALL {
                            let in_stock = self.state.bank.available(receive).map_or(true, |n| n > 0);
                            if receive != give && in_stock {
                                commands.push(GameCommand::BankTrade { give, receive });
                            }
                        }
                    }
                }
                CommandKind::EndTurn => commands.push(GameCommand::EndTurn),
                CommandKind::Resign => commands.push(GameCommand::Resign),
            }
        }
        commands
    }

    fn road_context(&self) -> PlacementContext {
        match self.phase() {
            Phase::Setup(step) => PlacementContext::Setup {
                anchor: step
                    .anchor
                    .filter(|_| self.state.config.setup.road_touches_new_settlement),
            },
            _ => PlacementContext::Normal,
        }
    }

    fn building_context(&self) -> PlacementContext {
        match self.phase() {
            Phase::Setup(_) => PlacementContext::Setup { anchor: None },
            _ => PlacementContext::Normal,
        }
    }

    // ==================== Command Methods ====================

    /// Roll for the current player; `forced` fixes the total
    pub fn roll_dice(&mut self, forced: Option<u8>) -> Result<Vec<GameEvent>, GameError> {
        let player = self.current_player();
        self.apply(player, GameCommand::RollDice { forced })
    }

    pub fn place_road(&mut self, player: PlayerId, edge: EdgeId) -> Result<Vec<GameEvent>, GameError> {
        self.apply(player, GameCommand::PlaceRoad(edge))
    }

    pub fn place_building(
        &mut self,
        player: PlayerId,
        intersection: IntersectionId,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.apply(player, GameCommand::PlaceBuilding(intersection))
    }

    pub fn upgrade_city(
        &mut self,
        player: PlayerId,
        intersection: IntersectionId,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.apply(player, GameCommand::UpgradeCity(intersection))
    }

    /// Exchange `offer` from `from` for `request` from `to`, atomically
    pub fn propose_trade(
        &mut self,
        from: PlayerId,
        to: PlayerId,
        offer: ResourceHand,
        request: ResourceHand,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.apply(from, GameCommand::ProposeTrade { to, offer, request })
    }

    pub fn bank_trade(
        &mut self,
        player: PlayerId,
        give: Resource,
        receive: Resource,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.apply(player, GameCommand::BankTrade { give, receive })
    }

    pub fn end_turn(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        self.apply(player, GameCommand::EndTurn)
    }

    pub fn resign(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        self.apply(player, GameCommand::Resign)
    }

    /// Apply a command from `player` and return the resulting events
    pub fn apply(&mut self, player: PlayerId, command: GameCommand) -> Result<Vec<GameEvent>, GameError> {
        let result = self.dispatch(player, &command);
        match &result {
            Ok(events) => debug!(player, ?command, events = events.len(), "command applied"),
            Err(error) => trace!(player, ?command, %error, "command rejected"),
        }
        result
    }

    fn dispatch(&mut self, player: PlayerId, command: &GameCommand) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.state.player(player).ok_or(GameError::UnknownPlayer(player))?;
        if !seat.active {
            return Err(GameError::InactivePlayer(player));
        }
        self.state.turn.authorize(player, command.kind())?;

        let mut events = match command {
            GameCommand::RollDice { forced } => self.do_roll(player, *forced)?,
            GameCommand::PlaceBuilding(at) => self.do_place_building(player, *at)?,
            GameCommand::PlaceRoad(edge) => self.do_place_road(player, *edge)?,
            GameCommand::UpgradeCity(at) => self.do_upgrade_city(player, *at)?,
            GameCommand::ProposeTrade { to, offer, request } => {
                self.do_trade(player, *to, offer, request)?
            }
            GameCommand::BankTrade { give, receive } => self.do_bank_trade(player, *give, *receive)?,
            GameCommand::EndTurn => self.do_end_turn(player),
            GameCommand::Resign => self.do_resign(player),
        };

        events.extend(self.check_win_condition());
        Ok(events)
    }

    fn phase_changed(&self) -> GameEvent {
        GameEvent::PhaseChanged {
            phase: self.state.turn.phase(),
            player: self.state.turn.current_player(),
        }
    }

    fn do_roll(&mut self, player: PlayerId, forced: Option<u8>) -> Result<Vec<GameEvent>, GameError> {
        let dice = self.state.config.dice;
        let (faces, total) = match forced {
            Some(value) => {
                if !dice.can_roll(value) {
                    return Err(GameError::InvalidRoll {
                        value,
                        min: dice.min_total(),
                        max: dice.max_total(),
                    });
                }
                (Vec::new(), value)
            }
            None => {
                let faces = self.dice.roll(&dice);
                self.state.dice_draws += faces.len() as u64;
                let total = faces.iter().sum();
                (faces, total)
            }
        };

        let mut events = vec![GameEvent::DiceRolled {
            player,
            faces,
            total,
        }];
        self.state.last_roll = Some(total);
        self.state.turn.rolled(total);
        events.push(self.phase_changed());

        let mut raw = produce(&self.state.board, total);
        raw.retain(|owner, _| self.state.player(*owner).is_some_and(|p| p.active));
        let distribution = distribute(
            &raw,
            &self.state.bank,
            self.state.config.supply.policy,
            &self.state.turn.turn_order(),
        );
        for (owner, hand) in &distribution.granted {
            self.state.bank.withdraw(hand);
            if let Some(p) = self.state.players.get_mut(*owner as usize) {
                p.receive(hand);
            }
        }
        events.push(GameEvent::ResourcesProduced {
            roll: total,
            granted: distribution.granted,
            withheld: distribution.withheld,
        });

        self.state.turn.distributed();
        events.push(self.phase_changed());
        Ok(events)
    }

    fn do_place_building(
        &mut self,
        player: PlayerId,
        at: IntersectionId,
    ) -> Result<Vec<GameEvent>, GameError> {
        let phase = self.phase();
        let setup = matches!(phase, Phase::Setup(_));
        let config = &self.state.config;

        placement::can_place_building(
            &self.state.board,
            player,
            at,
            &self.building_context(),
            &config.placement,
        )
        .into_result()?;
        let seat = &self.state.players[player as usize];
        seat.check_piece(PieceKind::Settlement, &config.pieces)?;
        let cost = if setup {
            ResourceHand::new()
        } else {
            config.costs.settlement
        };
        seat.check_afford(&cost)?;

        self.pay_to_bank(player, &cost)?;
        self.state.board.place_building(
            at,
            Building {
                kind: BuildingKind::Settlement,
                owner: player,
            },
        );
        self.state.players[player as usize].settlements.insert(at);

        let mut events = vec![GameEvent::BuildingPlaced {
            player,
            intersection: at,
            kind: BuildingKind::Settlement,
        }];

        if let Phase::Setup(step) = phase {
            if self.state.config.setup.grant_round == Some(step.round) {
                let grant = self.state.bank.clip(&yield_around(&self.state.board, at));
                self.state.bank.withdraw(&grant);
                self.state.players[player as usize].receive(&grant);
                events.push(GameEvent::SetupResourcesGranted {
                    player,
                    resources: grant,
                });
            }
            self.state.turn.settlement_placed(at);
            events.push(self.phase_changed());
        }

        // A new building can cut an opponent's road
        events.extend(self.update_longest_road());
        Ok(events)
    }

    fn do_place_road(&mut self, player: PlayerId, edge: EdgeId) -> Result<Vec<GameEvent>, GameError> {
        let setup = matches!(self.phase(), Phase::Setup(_));
        let config = &self.state.config;

        placement::can_place_road(&self.state.board, player, edge, &self.road_context())
            .into_result()?;
        let seat = &self.state.players[player as usize];
        seat.check_piece(PieceKind::Road, &config.pieces)?;
        let cost = if setup {
            ResourceHand::new()
        } else {
            config.costs.road
        };
        seat.check_afford(&cost)?;

        self.pay_to_bank(player, &cost)?;
        self.state.board.place_road(edge, player);
        self.state.players[player as usize].roads.insert(edge);

        let mut events = vec![GameEvent::RoadPlaced { player, edge }];
        if setup {
            let players = &self.state.players;
            self.state
                .turn
                .next_setup_step(|p| players.get(p as usize).is_some_and(|seat| seat.active));
            events.push(self.phase_changed());
        }
        events.extend(self.update_longest_road());
        Ok(events)
    }

    fn do_upgrade_city(
        &mut self,
        player: PlayerId,
        at: IntersectionId,
    ) -> Result<Vec<GameEvent>, GameError> {
        let config = &self.state.config;
        placement::can_upgrade_to_city(&self.state.board, player, at).into_result()?;
        let seat = &self.state.players[player as usize];
        seat.check_piece(PieceKind::City, &config.pieces)?;
        let cost = config.costs.city;
        seat.check_afford(&cost)?;

        self.pay_to_bank(player, &cost)?;
        self.state.board.upgrade_to_city(at);
        let seat = &mut self.state.players[player as usize];
        seat.settlements.remove(&at);
        seat.cities.insert(at);

        Ok(vec![GameEvent::CityUpgraded {
            player,
            intersection: at,
        }])
    }

    fn do_trade(
        &mut self,
        from: PlayerId,
        to: PlayerId,
        offer: &ResourceHand,
        request: &ResourceHand,
    ) -> Result<Vec<GameEvent>, GameError> {
        if to == from {
            return Err(GameError::InvalidTrade("cannot trade with yourself".into()));
        }
        let partner = self.state.player(to).ok_or(GameError::UnknownPlayer(to))?;
        if !partner.active {
            return Err(GameError::InactivePlayer(to));
        }
        if offer.is_empty() || request.is_empty() {
            return Err(GameError::InvalidTrade(
                "both sides of a trade must offer something".into(),
            ));
        }

        let (giver, taker) = pair_mut(&mut self.state.players, from as usize, to as usize);
        exchange(giver, taker, offer, request)?;

        Ok(vec![GameEvent::TradeCompleted {
            from,
            to,
            offered: *offer,
            requested: *request,
        }])
    }

    fn do_bank_trade(
        &mut self,
        player: PlayerId,
        give: Resource,
        receive: Resource,
    ) -> Result<Vec<GameEvent>, GameError> {
        if give == receive {
            return Err(GameError::InvalidTrade(format!("cannot trade {give} for {receive}")));
        }
        let ratio = self.state.config.trade.bank_ratio;
        let payment = ResourceHand::single(give, ratio);
        let bought = ResourceHand::single(receive, 1);

        self.state.players[player as usize].check_afford(&payment)?;
        if let Some((resource, needed, available)) = self.state.bank.shortfall(&bought) {
            return Err(GameError::BankDepleted {
                resource,
                needed,
                available,
            });
        }

        self.pay_to_bank(player, &payment)?;
        self.state.bank.withdraw(&bought);
        self.state.players[player as usize].receive(&bought);

        Ok(vec![GameEvent::BankTradeCompleted {
            player,
            gave: give,
            gave_count: ratio,
            received: receive,
        }])
    }

    fn do_end_turn(&mut self, player: PlayerId) -> Vec<GameEvent> {
        self.state.turn.end_turn();
        let mut events = vec![self.phase_changed()];
        events.extend(self.pass_turn(player));
        events
    }

    fn do_resign(&mut self, player: PlayerId) -> Vec<GameEvent> {
        self.state.players[player as usize].active = false;
        let mut events = vec![GameEvent::PlayerResigned { player }];
        events.extend(self.update_longest_road());

        let remaining: Vec<PlayerId> = self.state.active_players().map(|p| p.id).collect();
        if let [winner] = remaining.as_slice() {
            events.extend(self.finish(*winner));
        } else if player == self.current_player() {
            if let Phase::Setup(_) = self.phase() {
                let players = &self.state.players;
                self.state
                    .turn
                    .next_setup_step(|p| players.get(p as usize).is_some_and(|seat| seat.active));
                events.push(self.phase_changed());
            } else {
                self.state.turn.end_turn();
                events.extend(self.pass_turn(player));
            }
        }
        events
    }

    /// Hand the turn from `player` to the next active seat
    fn pass_turn(&mut self, player: PlayerId) -> Vec<GameEvent> {
        let players = &self.state.players;
        self.state
            .turn
            .next_turn(|p| players.get(p as usize).is_some_and(|seat| seat.active));
        self.state.last_roll = None;
        vec![
            GameEvent::TurnEnded {
                player,
                next_player: self.current_player(),
            },
            self.phase_changed(),
        ]
    }

    fn pay_to_bank(&mut self, player: PlayerId, cost: &ResourceHand) -> Result<(), GameError> {
        self.state.players[player as usize].pay(cost)?;
        self.state.bank.deposit(cost);
        Ok(())
    }

    /// Recompute the longest road holder. The holder keeps the bonus on a tie;
    /// a tie without the holder leaves the bonus unassigned.
    fn update_longest_road(&mut self) -> Option<GameEvent> {
        let rule = self.state.config.longest_road?;
        let previous = self.state.longest_road;

        let lengths: Vec<(PlayerId, u32)> = self
            .state
            .active_players()
            .map(|p| (p.id, self.state.board.longest_road(p.id)))
            .collect();
        let best = lengths.iter().map(|(_, len)| *len).max().unwrap_or(0);
        let leaders: Vec<PlayerId> = lengths
            .iter()
            .filter(|(_, len)| best >= rule.min_length && *len == best)
            .map(|(p, _)| *p)
            .collect();

        let current = match previous {
            Some(holder) if leaders.contains(&holder) => Some(holder),
            _ if leaders.len() == 1 => Some(leaders[0]),
            _ => None,
        };
        if current == previous {
            return None;
        }

        self.state.longest_road = current;
        for p in &mut self.state.players {
            p.has_longest_road = Some(p.id) == current;
        }
        debug!(?previous, ?current, length = best, "longest road changed");
        Some(GameEvent::LongestRoadChanged {
            previous,
            current,
            length: best,
        })
    }

    /// End the game when an active player, checked in turn order from the
    /// current one, has reached the target.
    fn check_win_condition(&mut self) -> Vec<GameEvent> {
        if self.is_over() {
            return Vec::new();
        }
        let target = self.state.config.victory_points_to_win;
        let winner = self.state.turn.turn_order().into_iter().find(|&p| {
            self.state.player(p).is_some_and(|seat| seat.active) && self.state.victory_points(p) >= target
        });
        match winner {
            Some(winner) => self.finish(winner),
            None => Vec::new(),
        }
    }

    fn finish(&mut self, winner: PlayerId) -> Vec<GameEvent> {
        self.state.turn.finish(winner);
        let victory_points = self.victory_points(winner);
        debug!(winner, victory_points, "game over");
        vec![
            self.phase_changed(),
            GameEvent::GameWon {
                player: winner,
                victory_points,
            },
        ]
    }
}

/// Mutable access to two different seats
fn pair_mut(players: &mut [Player], a: usize, b: usize) -> (&mut Player, &mut Player) {
    if a < b {
        let (low, high) = players.split_at_mut(b);
        (&mut low[a], &mut high[0])
    } else {
        let (low, high) = players.split_at_mut(a);
        (&mut high[0], &mut low[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardShape;
    use crate::error::GameError;
    use crate::phase::{SetupPiece, SetupStep};
    use crate::placement::PlacementViolation;
    use pretty_assertions::assert_eq;

    fn two_player_game() -> Game {
        let config = GameConfig::with_players(["Ada", "Bo"]).with_seed(11);
        Game::start(config).unwrap().0
    }

    /// Play every setup step with the first legal spot
    fn finish_setup(game: &mut Game) {
        while let Phase::Setup(step) = game.phase() {
            let player = game.current_player();
            match step.placing {
                SetupPiece::Settlement => {
                    let at = game.legal_building_placements(player)[0];
                    game.place_building(player, at).unwrap();
                }
                SetupPiece::Road => {
                    let edge = game.legal_road_placements(player)[0];
                    game.place_road(player, edge).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_new_game_starts_in_setup() {
        let (game, events) = Game::start(GameConfig::default()).unwrap();
        assert_eq!(
            game.phase(),
            Phase::Setup(SetupStep {
                round: 1,
                placing: SetupPiece::Settlement,
                anchor: None
            })
        );
        assert_eq!(game.current_player(), 0);
        assert_eq!(game.players().len(), 4);
        assert!(matches!(events[0], GameEvent::GameStarted { .. }));
        assert_eq!(game.bank().available(Resource::Ore), Some(19));
    }

    #[test]
    fn test_invalid_configuration_is_reported() {
        let config = GameConfig::with_players(["only"]);
        assert!(matches!(
            Game::start(config),
            Err(GameError::InvalidConfiguration(_))
        ));

        let mut config = GameConfig::default();
        config.board.shape = BoardShape::Hexagon { radius: 1 };
        assert!(matches!(
            Game::start(config),
            Err(GameError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_build_before_roll_is_rejected() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        assert_eq!(game.phase(), Phase::AwaitingRoll);

        let before = game.snapshot();
        let edge = EdgeId(0);
        assert_eq!(
            game.place_road(0, edge),
            Err(GameError::IllegalStateTransition {
                command: CommandKind::PlaceRoad,
                phase: Phase::AwaitingRoll
            })
        );
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn test_wrong_player_is_rejected() {
        let mut game = two_player_game();
        let at = game.legal_building_placements(1)[0];
        assert_eq!(
            game.place_building(1, at),
            Err(GameError::NotYourTurn {
                player: 1,
                current: 0
            })
        );
        assert_eq!(game.place_building(9, at), Err(GameError::UnknownPlayer(9)));
    }

    #[test]
    fn test_setup_grants_second_settlement_resources() {
        let mut game = two_player_game();
        finish_setup(&mut game);

        let granted: u32 = game.players().iter().map(|p| p.resources.total()).sum();
        let bank_total: u32 = game.bank().stock().unwrap().total();
        assert_eq!(granted + bank_total, 19 * 5);
        assert!(granted > 0);
    }

    #[test]
    fn test_setup_road_must_follow_settlement() {
        let mut game = two_player_game();
        let at = game.legal_building_placements(0)[0];
        game.place_building(0, at).unwrap();

        let far = game
            .board()
            .edges()
            .find(|e| !e.endpoints.contains(&at))
            .unwrap()
            .id;
        assert_eq!(
            game.place_road(0, far),
            Err(GameError::IllegalPlacement(PlacementViolation::NotAtNewSettlement {
                edge: far,
                settlement: at
            }))
        );
        assert_eq!(game.legal_road_placements(0).len(), game.board().edges_of(at).len());
    }

    #[test]
    fn test_forced_roll_out_of_range() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        assert_eq!(
            game.roll_dice(Some(13)),
            Err(GameError::InvalidRoll {
                value: 13,
                min: 2,
                max: 12
            })
        );
        assert_eq!(game.phase(), Phase::AwaitingRoll);
    }

    #[test]
    fn test_roll_moves_to_main_action() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        let events = game.roll_dice(None).unwrap();
        assert!(matches!(events[0], GameEvent::DiceRolled { player: 0, .. }));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::ResourcesProduced { .. })));
        assert_eq!(game.phase(), Phase::MainAction);
        assert_eq!(game.current_state().dice_draws, 2);
    }

    #[test]
    fn test_end_turn_passes_to_next_player() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        game.roll_dice(Some(7)).unwrap();
        let events = game.end_turn(0).unwrap();
        assert!(events.contains(&GameEvent::TurnEnded {
            player: 0,
            next_player: 1
        }));
        assert_eq!(game.current_player(), 1);
        assert_eq!(game.phase(), Phase::AwaitingRoll);
        assert_eq!(game.turn_number(), 2);
        assert_eq!(game.last_roll(), None);
    }

    #[test]
    fn test_bank_trade_at_ratio() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        game.roll_dice(Some(7)).unwrap();
        game.state.players[0].resources = ResourceHand::single(Resource::Ore, 4);
        game.state.bank = Bank::unlimited();

        game.bank_trade(0, Resource::Ore, Resource::Wool).unwrap();
        assert_eq!(
            *game.player_inventory(0).unwrap(),
            ResourceHand::single(Resource::Wool, 1)
        );
        assert!(matches!(
            game.bank_trade(0, Resource::Ore, Resource::Wool),
            Err(GameError::InsufficientResources { .. })
        ));
        assert!(matches!(
            game.bank_trade(0, Resource::Wool, Resource::Wool),
            Err(GameError::InvalidTrade(_))
        ));
    }

    #[test]
    fn test_bank_trade_when_bank_is_empty() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        game.roll_dice(Some(7)).unwrap();
        game.state.players[0].resources = ResourceHand::single(Resource::Ore, 4);
        game.state.bank = Bank::new(Some(ResourceHand::new()));

        assert_eq!(
            game.bank_trade(0, Resource::Ore, Resource::Grain),
            Err(GameError::BankDepleted {
                resource: Resource::Grain,
                needed: 1,
                available: 0
            })
        );
        assert_eq!(game.player_inventory(0).unwrap().ore, 4);
    }

    #[test]
    fn test_oversized_trade_offer_is_unaffordable() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        game.roll_dice(Some(7)).unwrap();
        let hands: Vec<ResourceHand> = game.players().iter().map(|p| p.resources).collect();

        let result = game.propose_trade(
            0,
            1,
            ResourceHand::with_amounts(u32::MAX, 1, 0, 0, 0),
            ResourceHand::single(Resource::Brick, 1),
        );
        assert!(matches!(
            result,
            Err(GameError::InsufficientResources {
                player: 0,
                resource: Resource::Brick,
                needed: u32::MAX,
                ..
            })
        ));
        let after: Vec<ResourceHand> = game.players().iter().map(|p| p.resources).collect();
        assert_eq!(after, hands);
    }

    #[test]
    fn test_restore_rejects_impossible_dice_history() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        game.roll_dice(None).unwrap();
        assert!(Game::restore(game.snapshot()).is_ok());

        let mut state = game.snapshot();
        state.dice_draws = u64::MAX;
        assert!(matches!(Game::restore(state), Err(GameError::Snapshot(_))));
    }

    #[test]
    fn test_restore_rejects_unrollable_production() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        let mut state = game.snapshot();
        state.config.dice = crate::config::DiceConfig { count: 1, sides: 6 };
        assert!(matches!(Game::restore(state), Err(GameError::Snapshot(_))));
    }

    #[test]
    fn test_city_upgrade_pays_and_scores() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        game.roll_dice(Some(7)).unwrap();
        let site = *game.players()[0].settlements.iter().next().unwrap();
        let before = game.victory_points(0);

        game.state.players[0].resources = ResourceHand::with_amounts(0, 0, 2, 2, 0);
        assert!(matches!(
            game.upgrade_city(0, site),
            Err(GameError::InsufficientResources {
                resource: Resource::Ore,
                ..
            })
        ));

        game.state.players[0].resources = ResourceHand::with_amounts(0, 0, 3, 2, 0);
        game.upgrade_city(0, site).unwrap();
        assert_eq!(game.victory_points(0), before + 1);
        assert!(game.players()[0].cities.contains(&site));
        assert!(game.player_inventory(0).unwrap().is_empty());
    }

    #[test]
    fn test_resign_hands_over_turn_and_last_player_wins() {
        let config = GameConfig::with_players(["A", "B", "C"]).with_seed(4);
        let (mut game, _) = Game::start(config).unwrap();
        finish_setup(&mut game);

        let events = game.resign(0).unwrap();
        assert!(events.contains(&GameEvent::PlayerResigned { player: 0 }));
        assert_eq!(game.current_player(), 1);
        assert_eq!(game.resign(0), Err(GameError::InactivePlayer(0)));

        // Player 2 resigns out of turn; player 1 is the last one standing
        let events = game.resign(2).unwrap();
        assert_eq!(game.winner(), Some(1));
        assert!(events.iter().any(|e| matches!(e, GameEvent::GameWon { player: 1, .. })));
        assert!(game.valid_commands(1).is_empty());
    }

    #[test]
    fn test_resign_during_setup_skips_the_seat() {
        let config = GameConfig::with_players(["A", "B", "C"]).with_seed(6);
        let (mut game, _) = Game::start(config).unwrap();

        let events = game.resign(0).unwrap();
        assert!(events.contains(&GameEvent::PlayerResigned { player: 0 }));
        assert_eq!(game.current_player(), 1);
        assert!(matches!(
            game.phase(),
            Phase::Setup(SetupStep {
                placing: SetupPiece::Settlement,
                ..
            })
        ));

        finish_setup(&mut game);
        assert!(game.players()[0].settlements.is_empty());
        assert_eq!(game.players()[1].settlements.len(), 2);
        assert_eq!(game.players()[2].settlements.len(), 2);
        assert_eq!(game.phase(), Phase::AwaitingRoll);
        assert_eq!(game.current_player(), 1);
        assert!(Game::restore(game.snapshot()).is_ok());
    }

    #[test]
    fn test_resign_mid_setup_step_in_two_player_game() {
        let mut game = two_player_game();
        let at = game.legal_building_placements(0)[0];
        game.place_building(0, at).unwrap();

        // Seat 1 leaves out of turn and seat 0 is the last one standing
        game.resign(1).unwrap();
        assert_eq!(game.winner(), Some(0));
        assert!(Game::restore(game.snapshot()).is_ok());
    }

    #[test]
    fn test_reaching_target_ends_game() {
        let mut config = GameConfig::with_players(["A", "B"]).with_seed(2);
        config.victory_points_to_win = 3;
        let (mut game, _) = Game::start(config).unwrap();
        finish_setup(&mut game);
        game.roll_dice(Some(7)).unwrap();

        let site = *game.players()[0].settlements.iter().next().unwrap();
        game.state.players[0].resources = ResourceHand::with_amounts(0, 0, 3, 2, 0);
        let events = game.upgrade_city(0, site).unwrap();
        assert_eq!(game.winner(), Some(0));
        assert!(events.contains(&GameEvent::GameWon {
            player: 0,
            victory_points: 3
        }));
        assert!(matches!(
            game.end_turn(0),
            Err(GameError::IllegalStateTransition { .. })
        ));
    }

    #[test]
    fn test_valid_commands_match_phase() {
        let mut game = two_player_game();
        let setup = game.valid_commands(0);
        assert_eq!(setup.last(), Some(&GameCommand::Resign));
        assert!(setup[..setup.len() - 1]
            .iter()
            .all(|c| matches!(c, GameCommand::PlaceBuilding(_))));
        assert_eq!(game.valid_commands(1), vec![GameCommand::Resign]);

        finish_setup(&mut game);
        assert_eq!(
            game.valid_commands(0),
            vec![GameCommand::RollDice { forced: None }, GameCommand::Resign]
        );
        assert_eq!(game.valid_commands(1), vec![GameCommand::Resign]);
    }

    #[test]
    fn test_restore_rejects_tampered_ownership() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        let mut state = game.snapshot();
        state.players[0].roads.clear();
        assert!(matches!(Game::restore(state), Err(GameError::Snapshot(_))));
    }

    #[test]
    fn test_state_json_round_trip() {
        let mut game = two_player_game();
        finish_setup(&mut game);
        let json = game.current_state().to_json().unwrap();
        let state = GameState::from_json(&json).unwrap();
        assert_eq!(state, game.snapshot());
        assert!(matches!(
            GameState::from_json("[]"),
            Err(GameError::Snapshot(_))
        ));
    }
}
