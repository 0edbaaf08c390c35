//! The simulator's seeded RNG.
//!
//! Every random draw in the simulator — transaction inter-arrival times,
//! mining delays, link jitter, neighbor sampling — goes through a single
//! seeded generator so that a run is fully reproducible given a seed.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp};

/// The simulator's random source. A type alias rather than a wrapper
/// struct: callers use it exactly like any other `rand::Rng`.
pub type SimRng = StdRng;

/// Builds the seeded RNG the whole run shares.
pub fn seeded_rng(seed: u64) -> SimRng {
    SimRng::seed_from_u64(seed)
}

/// Draws an exponentially distributed delay with the given mean.
///
/// A mean of zero or less models an actor with no capacity (e.g.
/// `cpu_power = 0`): it never completes, so this returns `f64::INFINITY`
/// rather than panicking on an invalid `Exp` rate.
pub fn exponential(rng: &mut SimRng, mean: f64) -> f64 {
    if mean <= 0.0 {
        return f64::INFINITY;
    }
    let dist = Exp::new(1.0 / mean).expect("mean is positive and finite");
    dist.sample(rng)
}
