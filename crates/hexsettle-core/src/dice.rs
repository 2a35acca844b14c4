//! Injected randomness for dice rolls.

use crate::config::DiceConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of dice faces. Implementations must be deterministic for a given
/// construction so that games can be replayed.
pub trait DiceSource: Send + Sync {
    /// Roll one die with `sides` faces, returning 1..=sides
    fn roll_die(&mut self, sides: u8) -> u8;

    /// Roll every die of `dice`
    fn roll(&mut self, dice: &DiceConfig) -> Vec<u8> {
        (0..dice.count).map(|_| self.roll_die(dice.sides)).collect()
    }
}

/// Dice driven by a seeded [`StdRng`]
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Recreate the dice of a game that already drew `draws` faces
    pub fn resume(seed: u64, draws: u64, sides: u8) -> Self {
        let mut dice = Self::new(seed);
        for _ in 0..draws {
            dice.roll_die(sides);
        }
        dice
    }
}

impl DiceSource for SeededDice {
    fn roll_die(&mut self, sides: u8) -> u8 {
        self.rng.gen_range(1..=sides)
    }
}

/// Seed of the dice stream, kept apart from the board generator's stream
pub(crate) fn dice_seed(game_seed: u64) -> u64 {
    game_seed ^ 0x9E37_79B9_7F4A_7C15
}
