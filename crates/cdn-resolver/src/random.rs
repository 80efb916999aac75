use rand::{RngExt, SeedableRng, rngs::StdRng};

/// Source of the uniform picks made when a tier offers several candidates.
pub trait RandomSource: Send {
    /// Returns an index in `0..len`. `len` is always at least 2.
    fn pick_index(&mut self, len: usize) -> usize;
}

/// Uses the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Reproducible picks from a fixed seed.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl std::fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Picks one element. Single-element slices never consult the source.
pub fn pick<'a, T>(source: &mut dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    match items.len() {
        0 => None,
        1 => items.first(),
        len => items.get(source.pick_index(len).min(len - 1)),
    }
}
