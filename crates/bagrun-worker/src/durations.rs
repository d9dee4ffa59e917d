//! Sources of task durations.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks a duration inside an inclusive range.
pub trait DurationSource: Send + Sync {
    /// Draw a duration in `[lower, upper]`. Callers guarantee `lower <= upper`.
    fn draw(&self, lower: u64, upper: u64) -> u64;
}

/// Uniformly random durations.
///
/// Unseeded sources use the thread-local generator. Seeded sources share one
/// generator so a whole batch is reproducible for a given seed, although the
/// order tasks draw in still depends on scheduling.
#[derive(Debug, Default)]
pub struct UniformDurations {
    seeded: Option<Mutex<StdRng>>,
}

impl UniformDurations {
    /// Create an unseeded source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl DurationSource for UniformDurations {
    fn draw(&self, lower: u64, upper: u64) -> u64 {
        match &self.seeded {
            Some(rng) => rng
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .gen_range(lower..=upper),
            None => rand::thread_rng().gen_range(lower..=upper),
        }
    }
}

/// Always the same duration, clamped into the requested range.
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration(pub u64);

impl DurationSource for FixedDuration {
    fn draw(&self, lower: u64, upper: u64) -> u64 {
        self.0.clamp(lower, upper)
    }
}
