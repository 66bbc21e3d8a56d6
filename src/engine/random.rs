//! Randomness seam.
//!
//! Every random decision the engine makes goes through [`RandomSource`]:
//!
//! - the probability gate on rules (`unit`)
//! - weighted text selection and the built-in joke pick (`below`)
//! - the suffix of generated ids (`token`)
//!
//! Production uses [`ThreadRandom`]. Tests inject a seeded or scripted source
//! to assert exact outcomes.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::{Mutex, PoisonError};

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, upper)`. Callers never pass `0`.
    fn below(&self, upper: u64) -> u64;

    /// Uniform float in `[0, 1)`.
    fn unit(&self) -> f64;

    /// Raw bits for identifiers.
    fn token(&self) -> u64;
}

/// Thread-local OS-seeded generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, upper: u64) -> u64 {
        rand::thread_rng().gen_range(0..upper)
    }

    fn unit(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    fn token(&self) -> u64 {
        rand::thread_rng().next_u64()
    }
}

/// Reproducible generator for tests and `explain --seed`.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        SeededRandom { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

impl RandomSource for SeededRandom {
    fn below(&self, upper: u64) -> u64 {
        self.with(|rng| rng.gen_range(0..upper))
    }

    fn unit(&self) -> f64 {
        self.with(|rng| rng.gen_range(0.0..1.0))
    }

    fn token(&self) -> u64 {
        self.with(|rng| rng.next_u64())
    }
}

/// `{prefix}{16 hex digits}`, e.g. `resp_00c0ffee...`.
pub(crate) fn prefixed_id(prefix: &str, random: &dyn RandomSource) -> String {
    format!("{prefix}{:016x}", random.token())
}
