//! Injectable random source.
//!
//! Transition kinds and the title color are drawn through [`RandomSource`]
//! so that the number and position of draws is fixed and tests can script
//! the outcome. Production runs use [`ThreadRandom`], which is not seeded.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform choices.
pub trait RandomSource: Send {
    /// Pick an index in `0..len`. `len` is always at least 1.
    fn pick(&mut self, len: usize) -> usize;
}

/// Pick an element of a non-empty slice.
pub fn choose<'a, T>(random: &mut dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let idx = random.pick(items.len()).min(items.len() - 1);
    items.get(idx)
}

/// Entropy-seeded generator used for real renders.
#[derive(Debug)]
pub struct ThreadRandom {
    rng: StdRng,
}

impl ThreadRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded generator, useful when a reproducible render is wanted.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }
}

/// Replays a fixed sequence of picks (wrapping around) and counts draws.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: Vec<usize>,
    draws: usize,
}

impl ScriptedRandom {
    pub fn new(script: Vec<usize>) -> Self {
        Self { script, draws: 0 }
    }

    /// Always picks the first element.
    pub fn zeros() -> Self {
        Self::new(vec![0])
    }

    /// Number of draws made so far.
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RandomSource for ScriptedRandom {
    fn pick(&mut self, len: usize) -> usize {
        let value = if self.script.is_empty() {
            0
        } else {
            self.script[self.draws % self.script.len()]
        };
        self.draws += 1;
        if len == 0 {
            0
        } else {
            value % len
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_and_counts() {
        let mut random = ScriptedRandom::new(vec![2, 5, 1]);
        assert_eq!(random.pick(6), 2);
        assert_eq!(random.pick(6), 5);
        assert_eq!(random.pick(6), 1);
        assert_eq!(random.pick(6), 2);
        assert_eq!(random.draws(), 4);
    }

    #[test]
    fn test_scripted_wraps_into_range() {
        let mut random = ScriptedRandom::new(vec![7]);
        assert_eq!(random.pick(3), 1);
    }

    #[test]
    fn test_thread_random_stays_in_range() {
        let mut random = ThreadRandom::seeded(42);
        for _ in 0..200 {
            assert!(random.pick(6) < 6);
        }
        assert_eq!(random.pick(1), 0);
    }

    #[test]
    fn test_choose() {
        let mut random = ScriptedRandom::new(vec![1]);
        assert_eq!(choose(&mut random, &["a", "b", "c"]), Some(&"b"));
        let empty: [&str; 0] = [];
        assert_eq!(choose(&mut random, &empty), None);
    }
}
