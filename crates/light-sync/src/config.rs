use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("blink period must be greater than zero")]
    ZeroPeriod,
    #[error("jitter ratio {0} must be within [0, 0.5)")]
    JitterRatio(f64),
    #[error("disabled poll interval must be greater than zero")]
    ZeroPoll,
}

/// Timing parameters shared by every light built from the same factory.
#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    /// One full on/off cycle.
    pub period: Duration,
    /// Upper bound of the arbitration jitter, as a fraction of `period`.
    pub jitter_ratio: f64,
    /// Added to `period` for the passive listening window after re-enable.
    pub settle_margin: Duration,
    /// Sleep between checks of the enabled flag while disabled.
    pub disabled_poll: Duration,
    /// Use the settle window for the very first cycle after `start` too, so a
    /// late joiner locks onto a running master instead of challenging it.
    pub settle_on_start: bool,
    /// Fixes the jitter sequence of every light (mixed with its id).
    pub rng_seed: Option<u64>,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            jitter_ratio: 0.01,
            settle_margin: Duration::from_millis(50),
            disabled_poll: Duration::from_millis(100),
            settle_on_start: false,
            rng_seed: None,
        }
    }
}

impl LightConfig {
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    pub fn with_settle_margin(mut self, margin: Duration) -> Self {
        self.settle_margin = margin;
        self
    }

    pub fn with_disabled_poll(mut self, poll: Duration) -> Self {
        self.disabled_poll = poll;
        self
    }

    pub fn with_settle_on_start(mut self, settle: bool) -> Self {
        self.settle_on_start = settle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        if !(0.0..0.5).contains(&self.jitter_ratio) {
            return Err(ConfigError::JitterRatio(self.jitter_ratio));
        }
        if self.disabled_poll.is_zero() {
            return Err(ConfigError::ZeroPoll);
        }
        Ok(())
    }

    pub fn half_period(&self) -> Duration {
        self.period / 2
    }

    pub fn max_jitter(&self) -> Duration {
        self.period.mul_f64(self.jitter_ratio)
    }

    /// Listening window of the first cycle after a light is re-enabled.
    pub fn settle_window(&self) -> Duration {
        self.period + self.settle_margin
    }
}
