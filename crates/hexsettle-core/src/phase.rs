//! Turn and phase state machine.
//!
//! The machine only knows whose turn it is and what may happen next. It
//! never touches the board or the players; the engine asks it to
//! [`authorize`](TurnMachine::authorize) a command, performs the command, and
//! then drives the matching transition.

use crate::actions::CommandKind;
use crate::board::{IntersectionId, PlayerId};
use crate::config::SetupRules;
use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a setup step expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupPiece {
    Settlement,
    Road,
}

/// Position inside the setup phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStep {
    /// 1-based setup round
    pub round: u32,
    pub placing: SetupPiece,
    /// Settlement placed in this step, once placed
    pub anchor: Option<IntersectionId>,
}

/// Current phase of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Initial placement rounds
    Setup(SetupStep),
    /// Waiting for the current player to roll
    AwaitingRoll,
    /// Production for `roll` is being paid out
    ResourceDistribution { roll: u8 },
    /// Building and trading
    MainAction,
    /// The current player has finished
    TurnEnd,
    /// Game is over
    GameOver { winner: PlayerId },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup(step) => {
                let piece = match step.placing {
                    SetupPiece::Settlement => "settlement",
                    SetupPiece::Road => "road",
                };
                write!(f, "setup round {} ({piece})", step.round)
            }
            Phase::AwaitingRoll => f.write_str("awaiting roll"),
            Phase::ResourceDistribution { roll } => write!(f, "distribution of {roll}"),
            Phase::MainAction => f.write_str("main action"),
            Phase::TurnEnd => f.write_str("turn end"),
            Phase::GameOver { winner } => write!(f, "game over (player {winner} won)"),
        }
    }
}

/// Whose turn it is and which phase the turn is in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMachine {
    phase: Phase,
    current: PlayerId,
    first: PlayerId,
    /// 0 during setup, then counts turns from 1
    turn: u32,
    /// Seat of every setup step in order
    setup_order: Vec<PlayerId>,
    /// Index of the active step in `setup_order`
    setup_cursor: usize,
    seats: usize,
}

impl TurnMachine {
    pub fn new(seats: usize, first: PlayerId, rules: &SetupRules) -> Self {
        let setup_order = setup_order(seats, first, rules);
        let current = setup_order.first().copied().unwrap_or(first);
        Self {
            phase: Phase::Setup(SetupStep {
                round: 1,
                placing: SetupPiece::Settlement,
                anchor: None,
            }),
            current,
            first,
            turn: 0,
            setup_order,
            setup_cursor: 0,
            seats,
        }
    }

    // ==================== Query Methods ====================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_player(&self) -> PlayerId {
        self.current
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn seats(&self) -> usize {
        self.seats
    }

    /// Seat of every setup step in order
    pub fn setup_order(&self) -> &[PlayerId] {
        &self.setup_order
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::GameOver { .. })
    }

    /// Seats starting from the current player and wrapping around
    pub fn turn_order(&self) -> Vec<PlayerId> {
        (0..self.seats)
            .map(|offset| ((self.current as usize + offset) % self.seats) as PlayerId)
            .collect()
    }

    /// Whether `command` may be issued now by `player`. Checks the phase
    /// first, then the seat; never changes anything.
    pub fn authorize(&self, player: PlayerId, command: CommandKind) -> Result<(), GameError> {
        use CommandKind::*;

        let permitted = match self.phase {
            Phase::Setup(step) => matches!(
                (step.placing, command),
                (SetupPiece::Settlement, PlaceBuilding)
                    | (SetupPiece::Road, PlaceRoad)
                    | (_, Resign)
            ),
            Phase::AwaitingRoll => matches!(command, RollDice | Resign),
            Phase::ResourceDistribution { .. } => false,
            Phase::MainAction => matches!(
                command,
                PlaceBuilding | PlaceRoad | UpgradeCity | ProposeTrade | BankTrade | EndTurn | Resign
            ),
            Phase::TurnEnd => false,
            Phase::GameOver { .. } => false,
        };

        if !permitted {
            return Err(GameError::IllegalStateTransition {
                command,
                phase: self.phase,
            });
        }
        // Anyone may resign at any time their seat is still in play
        if player != self.current && command != Resign {
            return Err(GameError::NotYourTurn {
                player,
                current: self.current,
            });
        }
        Ok(())
    }

    // ==================== Transitions ====================

    /// Setup settlement placed: the same player now places a road
    pub(crate) fn settlement_placed(&mut self, at: IntersectionId) -> Phase {
        if let Phase::Setup(step) = &mut self.phase {
            step.placing = SetupPiece::Road;
            step.anchor = Some(at);
        }
        self.phase
    }

    /// Setup step done (road placed) or abandoned (seat resigned): open the
    /// next step of an `active` seat, or the first regular turn
    pub(crate) fn next_setup_step(&mut self, active: impl Fn(PlayerId) -> bool) -> Phase {
        self.setup_cursor += 1;
        while self
            .setup_order
            .get(self.setup_cursor)
            .is_some_and(|seat| !active(*seat))
        {
            self.setup_cursor += 1;
        }
        match self.setup_order.get(self.setup_cursor) {
            Some(&next) => {
                self.current = next;
                self.phase = Phase::Setup(SetupStep {
                    round: (self.setup_cursor / self.seats.max(1)) as u32 + 1,
                    placing: SetupPiece::Settlement,
                    anchor: None,
                });
            }
            None => {
                self.current = (0..self.seats)
                    .map(|offset| ((self.first as usize + offset) % self.seats) as PlayerId)
                    .find(|seat| active(*seat))
                    .unwrap_or(self.first);
                self.turn = 1;
                self.phase = Phase::AwaitingRoll;
            }
        }
        self.phase
    }

    pub(crate) fn rolled(&mut self, roll: u8) -> Phase {
        self.phase = Phase::ResourceDistribution { roll };
        self.phase
    }

    pub(crate) fn distributed(&mut self) -> Phase {
        self.phase = Phase::MainAction;
        self.phase
    }

    pub(crate) fn end_turn(&mut self) -> Phase {
        self.phase = Phase::TurnEnd;
        self.phase
    }

    /// Hand the turn to the next seat for which `active` holds
    pub(crate) fn next_turn(&mut self, active: impl Fn(PlayerId) -> bool) -> Phase {
        if let Some(next) = self.turn_order().into_iter().skip(1).find(|p| active(*p)) {
            self.current = next;
        }
        self.turn += 1;
        self.phase = Phase::AwaitingRoll;
        self.phase
    }

    pub(crate) fn finish(&mut self, winner: PlayerId) -> Phase {
        self.phase = Phase::GameOver { winner };
        self.phase
    }

    /// Sanity check for restored machines
    pub(crate) fn is_consistent(&self) -> bool {
        let in_range = |p: PlayerId| (p as usize) < self.seats;
        let setup_ok = match self.phase {
            Phase::Setup(_) => self
                .setup_order
                .get(self.setup_cursor)
                .is_some_and(|p| *p == self.current),
            // A game can end while seats still had setup steps left
            Phase::GameOver { .. } => self.setup_cursor <= self.setup_order.len(),
            _ => self.setup_cursor == self.setup_order.len(),
        };
        in_range(self.current) && in_range(self.first) && self.setup_order.iter().all(|p| in_range(*p)) && setup_ok
    }
}

/// Seat of every setup step: odd rounds run in seat order from `first`, even
/// rounds in reverse when snaking.
fn setup_order(seats: usize, first: PlayerId, rules: &SetupRules) -> Vec<PlayerId> {
    let forward: Vec<PlayerId> = (0..seats)
        .map(|offset| ((first as usize + offset) % seats) as PlayerId)
        .collect();

    (1..=rules.rounds)
        .flat_map(|round| {
            let mut seats = forward.clone();
            if rules.snake && round % 2 == 0 {
                seats.reverse();
            }
            seats
        })
        .collect()
}
