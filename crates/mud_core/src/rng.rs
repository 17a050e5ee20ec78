//! Seeded random number generation.
//!
//! Every roll in the combat core goes through [`GameRng`] so a fight can be
//! replayed from its seed and a snapshot continues exactly where it left off.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Combat random number generator.
///
/// Wraps `ChaCha8Rng`. Serializes the seed together with the stream
/// position, so a restored generator yields the same sequence as the
/// original would have.
#[derive(Debug, Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
}

#[derive(Serialize, Deserialize)]
struct RngState {
    seed: u64,
    word_pos: [u64; 2],
}

impl Serialize for GameRng {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let pos = self.rng.get_word_pos();
        RngState {
            seed: self.seed,
            word_pos: [(pos >> 64) as u64, pos as u64],
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameRng {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let state = RngState::deserialize(deserializer)?;
        let mut rng = GameRng::new(state.seed);
        let pos = (u128::from(state.word_pos[0]) << 64) | u128::from(state.word_pos[1]);
        rng.rng.set_word_pos(pos);
        Ok(rng)
    }
}

impl GameRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed used to create this RNG.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Position in the output stream; advances with every roll.
    #[must_use]
    pub fn word_pos(&self) -> u128 {
        self.rng.get_word_pos()
    }

    /// Uniform integer in `lo..=hi`. Bounds given in the wrong order are swapped.
    pub fn range(&mut self, lo: i32, hi: i32) -> i32 {
        let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
        if lo == hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Returns true with probability 1/n. `n <= 1` always succeeds.
    pub fn one_in(&mut self, n: i32) -> bool {
        n <= 1 || self.range(0, n - 1) == 0
    }

    /// Returns true with probability percent/100.
    pub fn percent(&mut self, percent: i32) -> bool {
        self.range(0, 99) < percent
    }

    /// Choose a random element from a slice.
    ///
    /// Only the first `i32::MAX + 1` elements can be drawn.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let last = i32::try_from(items.len().checked_sub(1)?).unwrap_or(i32::MAX);
        let idx = usize::try_from(self.range(0, last)).ok()?;
        items.get(idx)
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new(0)
    }
}
