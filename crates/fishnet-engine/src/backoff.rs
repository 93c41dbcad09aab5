use std::time::Duration;

use rand::Rng;

/// Produces a lazy sequence of sleep durations between failed or empty job
/// polls.
///
/// `Fixed` mode draws a uniform random duration every time; `Exponential`
/// mode grows a capped internal counter and resets it to 1 on success, so a
/// worker backs off harder the longer it goes without work.
pub enum Backoff {
    Fixed,
    Exponential { base: u32 },
}

const EXPONENTIAL_CAP: u32 = 30;

impl Backoff {
    pub fn fixed() -> Self {
        Backoff::Fixed
    }

    pub fn exponential() -> Self {
        Backoff::Exponential { base: 1 }
    }

    pub fn new(fixed: bool) -> Self {
        if fixed {
            Self::fixed()
        } else {
            Self::exponential()
        }
    }

    /// Produce the next sleep duration and advance internal state.
    pub fn next(&mut self) -> Duration {
        let mut rng = rand::thread_rng();
        match self {
            Backoff::Fixed => Duration::from_secs_f64(rng.gen_range(0.0..3.0)),
            Backoff::Exponential { base } => {
                let b = *base as f64;
                let jitter: f64 = rng.gen_range(0.0..1.0);
                let secs = 0.5 * b + 0.5 * b * jitter;
                *base = (*base + 1).min(EXPONENTIAL_CAP);
                Duration::from_secs_f64(secs)
            }
        }
    }

    /// Reset to the initial state; called after a successful job fetch.
    pub fn reset(&mut self) {
        if let Backoff::Exponential { base } = self {
            *base = 1;
        }
    }
}
