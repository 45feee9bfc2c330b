// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha20Rng;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Factor the delay grows by with every failed attempt.
pub const DEFAULT_MULTIPLIER: u32 = 2;

/// Upper bound of the delay before jitter gets applied.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10 * 60);

/// Maximum relative deviation from the computed delay.
pub const DEFAULT_JITTER: f64 = 0.1;

/// Exponential backoff with proportional jitter.
///
/// The base delay grows from an initial value by a constant factor with every attempt until it
/// reaches a ceiling. Every returned delay is then randomly scaled by up to `±jitter` of its value
/// so that many instances failing at the same time do not retry in lockstep.
#[derive(Debug)]
pub struct Backoff {
    attempt: u32,
    config: Config,
    rng: ChaCha20Rng,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Delay after the first failed attempt.
    ///
    /// Defaults to 5 seconds.
    pub(crate) initial_delay: Duration,

    /// Multiplier applied to the delay after every further failed attempt.
    ///
    /// Defaults to 2.
    pub(crate) multiplier: u32,

    /// Maximum reachable base delay.
    ///
    /// Defaults to 10 minutes.
    pub(crate) max_delay: Duration,

    /// Relative jitter between 0.0 (none) and 1.0.
    ///
    /// Defaults to 0.1.
    pub(crate) jitter: f64,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Values outside of `0.0..=1.0` are clamped, `NaN` and infinities fall back to the default.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            DEFAULT_JITTER
        };
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl Backoff {
    pub fn new(config: Config, rng: ChaCha20Rng) -> Self {
        Self {
            attempt: 0,
            config,
            rng,
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the given attempt (starting at 0) without any jitter applied.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.config.multiplier.saturating_pow(attempt);

        self.config
            .initial_delay
            .checked_mul(factor)
            .map_or(self.config.max_delay, |delay| delay.min(self.config.max_delay))
    }

    /// Returns the jittered delay to wait before the next attempt and advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if self.config.jitter == 0.0 {
            return delay;
        }

        let jitter = self.config.jitter;
        let factor = 1.0 + self.rng.random_range(-jitter..=jitter);

        // Scaling a delay close to `Duration::MAX` up would overflow.
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
