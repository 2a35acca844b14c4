//! Integration tests for the Hexsettle game engine.
//!
//! These tests drive complete games through the public API, from setup
//! through the regular turn cycle, and check the properties that must hold
//! after every command.

use hexsettle_core::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Run through the setup phase with the first legal placement each step
fn complete_setup(game: &mut Game) {
    let mut iterations = 0;
    let max_iterations = 100;

    while matches!(game.phase(), Phase::Setup(_)) && iterations < max_iterations {
        let player = game.current_player();
        let command = game
            .valid_commands(player)
            .into_iter()
            .next()
            .expect("setup always offers a placement");
        game.apply(player, command).unwrap();
        iterations += 1;
    }

    assert!(
        !matches!(game.phase(), Phase::Setup(_)),
        "Game should complete setup within {} iterations",
        max_iterations
    );
}

/// Replace a player's hand through a snapshot, keeping the bank total intact
fn with_hand(game: &Game, player: PlayerId, hand: ResourceHand) -> Game {
    let mut state = game.snapshot();
    state.players[player as usize].resources = hand;
    state.bank = Bank::unlimited();
    Game::restore(state).unwrap()
}

/// Resources held by players and the bank together
fn resources_in_play(game: &Game) -> u32 {
    let held: u32 = game.players().iter().map(|p| p.resources.total()).sum();
    held + game.bank().stock().map_or(0, |s| s.total())
}

/// Drive a game with bots for at most `max_commands` commands and return
/// every event produced.
fn play_with_bots(game: &mut Game, difficulty: BotDifficulty, max_commands: usize) -> Vec<GameEvent> {
    let mut bots: Vec<Bot> = (0..game.players().len())
        .map(|p| Bot::with_seed(p as PlayerId, difficulty, 1000 + p as u64))
        .collect();
    let supply = resources_in_play(game);
    let mut log = Vec::new();

    for _ in 0..max_commands {
        if game.is_over() {
            break;
        }
        let player = game.current_player();
        let Some(command) = bots[player as usize].choose_command(game) else {
            panic!("bot {player} has no command in {}", game.phase());
        };
        log.extend(game.apply(player, command).unwrap());

        assert!((game.current_player() as usize) < game.players().len());
        assert!(game.player(game.current_player()).unwrap().active);
        assert_eq!(resources_in_play(game), supply, "resources must be conserved");
        for p in game.players() {
            let limits = &game.config().pieces;
            assert!(p.roads.len() as u32 <= limits.roads);
            assert!(p.settlements.len() as u32 <= limits.settlements);
            assert!(p.cities.len() as u32 <= limits.cities);
        }
    }
    log
}

#[test]
fn test_setup_phase_completes() {
    let config = GameConfig::with_players(["Alice", "Bob", "Charlie", "Diana"]).with_seed(21);
    let (mut game, _) = Game::start(config).unwrap();

    complete_setup(&mut game);

    // Every player has placed 2 settlements and 2 roads
    for player in game.players() {
        assert_eq!(player.settlements.len(), 2);
        assert_eq!(player.roads.len(), 2);
        assert_eq!(
            player.pieces_remaining(PieceKind::Settlement, &game.config().pieces),
            3
        );
        assert_eq!(player.victory_points(0), 2);
    }

    assert_eq!(game.phase(), Phase::AwaitingRoll);
    assert_eq!(game.current_player(), 0);
    assert_eq!(game.turn_number(), 1);
}

#[test]
fn test_roll_without_production_reaches_main_action() {
    let config = GameConfig::with_players(["Alice", "Bob", "Charlie", "Diana"]).with_seed(5);
    let (mut game, _) = Game::start(config).unwrap();
    complete_setup(&mut game);

    // No tile carries the most likely total
    let events = game.roll_dice(Some(7)).unwrap();
    assert!(events.contains(&GameEvent::DiceRolled {
        player: 0,
        faces: vec![],
        total: 7
    }));
    assert!(events.contains(&GameEvent::ResourcesProduced {
        roll: 7,
        granted: Production::new(),
        withheld: ResourceHand::new()
    }));
    assert_eq!(game.phase(), Phase::MainAction);
    assert_eq!(game.last_roll(), Some(7));
}

#[test]
fn test_building_requires_resources() {
    let (mut game, _) = Game::start(GameConfig::with_players(["Alice", "Bob"]).with_seed(3)).unwrap();
    complete_setup(&mut game);
    game.roll_dice(Some(7)).unwrap();

    let game = with_hand(&game, 0, ResourceHand::new());
    let commands = game.valid_commands(0);
    assert!(!commands
        .iter()
        .any(|c| matches!(c, GameCommand::PlaceRoad(_) | GameCommand::PlaceBuilding(_))));
    assert!(commands.contains(&GameCommand::EndTurn));

    let mut game = game;
    let edge = game.legal_road_placements(0)[0];
    let before = game.snapshot();
    assert!(matches!(
        game.place_road(0, edge),
        Err(GameError::InsufficientResources {
            player: 0,
            needed: 1,
            available: 0,
            ..
        })
    ));
    assert_eq!(game.snapshot(), before);
}

#[test]
fn test_every_listed_road_can_be_built() {
    let (mut game, _) = Game::start(GameConfig::with_players(["Alice", "Bob"]).with_seed(17)).unwrap();
    complete_setup(&mut game);
    game.roll_dice(Some(7)).unwrap();
    let game = with_hand(&game, 0, ResourceHand::with_amounts(1, 1, 0, 0, 0));

    let roads = game.legal_road_placements(0);
    assert!(!roads.is_empty());
    for edge in roads {
        let mut copy = Game::restore(game.snapshot()).unwrap();
        let events = copy.place_road(0, edge).unwrap();
        assert!(events.contains(&GameEvent::RoadPlaced { player: 0, edge }));
        assert_eq!(copy.board().road_at(edge).map(|r| r.owner), Some(0));
        assert!(copy.player_inventory(0).unwrap().is_empty());
    }
}

#[test]
fn test_every_listed_settlement_can_be_built() {
    let (mut game, _) = Game::start(GameConfig::with_players(["Alice", "Bob"]).with_seed(17)).unwrap();
    complete_setup(&mut game);
    game.roll_dice(Some(7)).unwrap();

    // Extend the network so that a legal spot exists
    let mut game = with_hand(&game, 0, ResourceHand::with_amounts(9, 9, 0, 0, 0));
    while game.legal_building_placements(0).is_empty() {
        let edge = game.legal_road_placements(0)[0];
        game.place_road(0, edge).unwrap();
    }
    let game = with_hand(&game, 0, ResourceHand::with_amounts(1, 1, 0, 1, 1));

    for at in game.legal_building_placements(0) {
        let mut copy = Game::restore(game.snapshot()).unwrap();
        copy.place_building(0, at).unwrap();
        assert_eq!(
            copy.board().building_at(at),
            Some(Building {
                kind: BuildingKind::Settlement,
                owner: 0
            })
        );
        assert_eq!(copy.victory_points(0), game.victory_points(0) + 1);
    }
}

#[test]
fn test_rejected_commands_leave_state_untouched() {
    let (mut game, _) = Game::start(GameConfig::with_players(["Alice", "Bob"]).with_seed(8)).unwrap();
    complete_setup(&mut game);
    game.roll_dice(Some(7)).unwrap();
    let mut game = with_hand(&game, 0, ResourceHand::with_amounts(5, 5, 5, 5, 5));

    let taken = game.players()[1].settlements.iter().next().copied().unwrap();
    let unrelated = game
        .board()
        .edges()
        .find(|e| !game.legal_road_placements(0).contains(&e.id) && e.road.is_none())
        .map(|e| e.id)
        .unwrap();

    let before = game.current_state().to_json().unwrap();
    let attempts = [
        GameCommand::PlaceBuilding(taken),
        GameCommand::PlaceRoad(unrelated),
        GameCommand::PlaceRoad(EdgeId(9999)),
        GameCommand::UpgradeCity(taken),
        GameCommand::RollDice { forced: None },
        GameCommand::BankTrade {
            give: Resource::Ore,
            receive: Resource::Ore,
        },
        GameCommand::ProposeTrade {
            to: 1,
            offer: ResourceHand::new(),
            request: ResourceHand::single(Resource::Wool, 1),
        },
    ];
    for command in attempts {
        assert!(game.apply(0, command.clone()).is_err(), "{command:?} should fail");
        assert_eq!(game.current_state().to_json().unwrap(), before);
    }
    assert!(game.apply(1, GameCommand::EndTurn).is_err());
    assert_eq!(game.current_state().to_json().unwrap(), before);
}

#[test]
fn test_player_trade_exchanges_atomically() {
    let (mut game, _) = Game::start(GameConfig::with_players(["Alice", "Bob"]).with_seed(2)).unwrap();
    complete_setup(&mut game);
    game.roll_dice(Some(7)).unwrap();

    let game = with_hand(&game, 0, ResourceHand::with_amounts(0, 3, 0, 0, 0));
    let mut game = with_hand(&game, 1, ResourceHand::with_amounts(1, 0, 0, 0, 0));

    let offer = ResourceHand::single(Resource::Lumber, 3);
    let request = ResourceHand::single(Resource::Brick, 1);
    let events = game.propose_trade(0, 1, offer, request).unwrap();
    assert_eq!(
        events,
        vec![GameEvent::TradeCompleted {
            from: 0,
            to: 1,
            offered: offer,
            requested: request
        }]
    );
    assert_eq!(*game.player_inventory(0).unwrap(), request);
    assert_eq!(*game.player_inventory(1).unwrap(), offer);

    // Bob no longer holds brick; nothing moves
    assert!(matches!(
        game.propose_trade(0, 1, request, request),
        Err(GameError::InsufficientResources { player: 1, .. })
    ));
    assert_eq!(*game.player_inventory(0).unwrap(), request);
}

#[test]
fn test_queries_do_not_change_state() {
    let (mut game, _) = Game::start(GameConfig::default().with_seed(12)).unwrap();
    complete_setup(&mut game);
    let before = game.snapshot();

    for _ in 0..2 {
        for p in 0..4 {
            game.valid_commands(p);
            game.legal_road_placements(p);
            game.legal_building_placements(p);
            game.legal_city_upgrades(p);
            game.victory_points(p);
            let _ = game.player_inventory(p);
        }
        game.board().longest_road(0);
        game.board().find_path(IntersectionId(0), IntersectionId(20));
    }
    assert_eq!(game.snapshot(), before);
}

#[test]
fn test_same_seed_same_game() {
    let config = GameConfig::with_players(["A", "B", "C"]).with_seed(99);
    let (mut first, start_a) = Game::start(config.clone()).unwrap();
    let (mut second, start_b) = Game::start(config).unwrap();
    assert_eq!(start_a, start_b);
    assert_eq!(first.board(), second.board());

    let log_a = play_with_bots(&mut first, BotDifficulty::Medium, 300);
    let log_b = play_with_bots(&mut second, BotDifficulty::Medium, 300);
    assert_eq!(log_a, log_b);
    assert_eq!(first.snapshot(), second.snapshot());
}

#[test]
fn test_restored_game_continues_identically() {
    let config = GameConfig::with_players(["A", "B"]).with_seed(31);
    let (mut game, _) = Game::start(config).unwrap();
    play_with_bots(&mut game, BotDifficulty::Hard, 60);

    let json = game.current_state().to_json().unwrap();
    let mut restored = Game::restore(GameState::from_json(&json).unwrap()).unwrap();
    assert_eq!(restored.snapshot(), game.snapshot());

    if !game.is_over() {
        let original = play_with_bots(&mut game, BotDifficulty::Hard, 100);
        let resumed = play_with_bots(&mut restored, BotDifficulty::Hard, 100);
        assert_eq!(original, resumed);
        assert_eq!(restored.snapshot(), game.snapshot());
    }
}

#[test]
fn test_bots_play_without_breaking_rules() {
    for difficulty in [BotDifficulty::Easy, BotDifficulty::Medium, BotDifficulty::Hard] {
        let (mut game, _) = Game::start(GameConfig::default().with_seed(7)).unwrap();
        let events = play_with_bots(&mut game, difficulty, 2000);

        assert!(game.turn_number() > 1, "{difficulty:?} bots never left setup");
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::DiceRolled { .. })));
        if let Some(winner) = game.winner() {
            assert!(game.victory_points(winner) >= game.config().victory_points_to_win);
            assert!(events.contains(&GameEvent::GameWon {
                player: winner,
                victory_points: game.victory_points(winner)
            }));
        }
    }
}

#[test]
fn test_longest_road_bonus_is_awarded() {
    let (mut game, _) = Game::start(GameConfig::with_players(["A", "B"]).with_seed(40)).unwrap();
    complete_setup(&mut game);
    game.roll_dice(Some(7)).unwrap();
    let mut game = with_hand(&game, 0, ResourceHand::with_amounts(15, 15, 0, 0, 0));

    let mut events = Vec::new();
    for _ in 0..13 {
        if game.board().longest_road(0) >= 5 {
            break;
        }
        // Take the road that lengthens the trail the most
        let edge = game
            .legal_road_placements(0)
            .into_iter()
            .max_by_key(|e| {
                let mut copy = Game::restore(game.snapshot()).unwrap();
                copy.place_road(0, *e).map_or(0, |_| copy.board().longest_road(0))
            })
            .expect("no road left to build");
        events.extend(game.place_road(0, edge).unwrap());
    }

    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::LongestRoadChanged {
            previous: None,
            current: Some(0),
            ..
        }
    )));
    assert!(game.players()[0].has_longest_road);
    assert_eq!(game.current_state().longest_road, Some(0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_generated_boards_are_consistent(radius in 1u32..=4, seed in any::<u64>()) {
        let mut config = GameConfig::with_players(["A", "B"]).with_seed(seed);
        config.board.shape = BoardShape::Hexagon { radius };
        let (game, _) = Game::start(config).unwrap();
        let board = game.board();

        prop_assert!(board.check_integrity().is_ok());
        let tiles = 3 * radius * (radius + 1) + 1;
        prop_assert_eq!(board.tile_count() as u32, tiles);
        prop_assert_eq!(
            board.tiles().filter(|t| t.terrain == Terrain::Desert).count(),
            1
        );
        for tile in board.tiles() {
            prop_assert_eq!(tile.production.is_some(), tile.resource().is_some());
        }
        for intersection in board.intersections() {
            prop_assert!((1..=3).contains(&intersection.tiles.len()));
            prop_assert!((2..=3).contains(&intersection.edges.len()));
        }
        for edge in board.edges() {
            prop_assert!((1..=2).contains(&edge.tiles.len()));
            prop_assert_ne!(edge.endpoints[0], edge.endpoints[1]);
        }
    }

    #[test]
    fn prop_bot_games_keep_invariants(seed in any::<u64>(), players in 2usize..=4) {
        let names: Vec<String> = (0..players).map(|p| format!("P{p}")).collect();
        let (mut game, _) = Game::start(GameConfig::with_players(names).with_seed(seed)).unwrap();
        play_with_bots(&mut game, BotDifficulty::Easy, 400);
        prop_assert!(Game::restore(game.snapshot()).is_ok());
    }
}
