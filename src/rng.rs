//! Seedable randomness for shuffling and random choices.
//!
//! Sessions never touch a global random source: each one owns a
//! [`RandomSource`] that is re-created from the configured seed on reset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A stream of floats in `[0, 1)`.
pub trait RandomSource: Send {
    /// Next value in `[0, 1)`.
    fn next_f64(&mut self) -> f64;
}

/// Default [`RandomSource`] backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Deterministic stream for `Some(seed)`, entropy-seeded for `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Random integer in `[0, max)`; `0` when `max` is zero.
pub fn rnd_int(max: usize, rng: &mut dyn RandomSource) -> usize {
    if max == 0 {
        return 0;
    }
    let idx = (rng.next_f64() * max as f64).floor() as usize;
    idx.min(max - 1)
}

/// Fisher-Yates shuffle in place.
pub fn shuffle<T>(items: &mut [T], rng: &mut dyn RandomSource) {
    let mut current = items.len();
    while current != 0 {
        let random = rnd_int(current, rng);
        current -= 1;
        items.swap(current, random);
    }
}

/// Shuffle everything after the first `keep_fixed` elements.
pub fn shuffle_fixed<T>(items: &mut [T], keep_fixed: usize, rng: &mut dyn RandomSource) {
    let keep = keep_fixed.min(items.len());
    shuffle(&mut items[keep..], rng);
}
