//! Pseudo-random sources for bonus trials.
//!
//! Bonus rolls do not need cryptographic quality; they need to be
//! injectable so tests can force outcomes.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform values in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    /// Next value in `[0, 1)`
    fn next_f64(&self) -> f64;
}

/// Thread-local RNG from `rand`. Default for production.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible RNG seeded from a fixed value.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a seeded source
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen::<f64>()
    }
}

/// Replays a fixed script of values, then repeats the fallback.
///
/// Used to force bonus outcomes in tests.
#[derive(Debug)]
pub struct SequenceRandom {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl SequenceRandom {
    /// Replay `values` in order, then return `fallback` forever
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(values.into_iter().collect()),
            fallback,
        }
    }

    /// Always return `value`
    pub fn constant(value: f64) -> Self {
        Self::new(std::iter::empty(), value)
    }

    /// Return `i / k` for trial `i` in `0..k`, then `fallback`
    pub fn stepped(k: u64, fallback: f64) -> Self {
        Self::new((0..k).map(|i| i as f64 / k as f64), fallback)
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

// =============================================================================
// Tests
// =============================================================================
