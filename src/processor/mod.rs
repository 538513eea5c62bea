//! Counter-to-rate conversion.
//!
//! A [`RateProcessor`] turns successive samples of a monotonically
//! non-decreasing counter (e.g., "total articles created") into a
//! per-second rate.
//!
//! # Policy
//!
//! | Situation | Result | Baseline |
//! |---|---|---|
//! | first sample | `Baseline` | stored |
//! | `value >= last`, `elapsed > 0` | `Rate(delta / elapsed)` | replaced |
//! | `value < last` (counter reset) | `CounterReset` | replaced |
//! | `elapsed == 0` (duplicate poll) | `NonPositiveElapsed` | kept |
//! | `elapsed < 0` (clock stepped back) | `NonPositiveElapsed` | replaced |
//! | negative or non-finite value | `Err(InvalidSample)` | kept |
//!
//! Only `Rate` carries a value; every other result means "do not report a
//! rate this cycle". A negative rate is never produced.

use chrono::{DateTime, Utc};
use std::fmt;


/// Outcome of feeding one sample to a [`RateProcessor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateResult {
    /// Per-second rate since the previous sample
    Rate(f64),
    /// First sample; stored as the baseline
    Baseline,
    /// Counter went backwards; the sample became the new baseline
    CounterReset,
    /// No time passed (or time went backwards) since the previous sample
    NonPositiveElapsed,
}

impl RateResult {
    /// Returns the rate, or `None` if no rate is defined for this sample.
    pub fn value(&self) -> Option<f64> {
        match self {
            RateResult::Rate(rate) => Some(*rate),
            _ => None,
        }
    }
}

impl fmt::Display for RateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateResult::Rate(rate) => write!(f, "{}/sec", rate),
            RateResult::Baseline => write!(f, "baseline established"),
            RateResult::CounterReset => write!(f, "counter reset, new baseline"),
            RateResult::NonPositiveElapsed => write!(f, "no elapsed time since last sample"),
        }
    }
}

/// Structural failure of a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorError {
    /// Sample was negative, NaN or infinite
    InvalidSample(f64),
}

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorError::InvalidSample(v) => {
                write!(f, "counter sample must be a finite non-negative number, got {}", v)
            }
        }
    }
}

impl std::error::Error for ProcessorError {}

/// Last accepted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// Stateful converter from a counter to a per-second rate.
///
/// Owned by exactly one agent and mutated only from that agent's poll cycle.
#[derive(Debug, Default)]
pub struct RateProcessor {
    last: Option<Sample>,
}

impl RateProcessor {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Feeds one counter sample taken at `now`.
    pub fn process(
        &mut self,
        current: f64,
        now: DateTime<Utc>,
    ) -> Result<RateResult, ProcessorError> {
        if !current.is_finite() || current < 0.0 {
            return Err(ProcessorError::InvalidSample(current));
        }

        let sample = Sample {
            value: current,
            at: now,
        };

        let last = match self.last {
            Some(last) => last,
            None => {
                self.last = Some(sample);
                return Ok(RateResult::Baseline);
            }
        };

        let elapsed = now - last.at;
        let elapsed_us = elapsed
            .num_microseconds()
            .unwrap_or_else(|| elapsed.num_milliseconds().saturating_mul(1000));
        if elapsed_us == 0 {
            return Ok(RateResult::NonPositiveElapsed);
        }
        if elapsed_us < 0 {
            self.last = Some(sample);
            return Ok(RateResult::NonPositiveElapsed);
        }

        if current < last.value {
            self.last = Some(sample);
            return Ok(RateResult::CounterReset);
        }

        let elapsed_secs = elapsed_us as f64 / 1_000_000.0;
        let rate = (current - last.value) / elapsed_secs;
        self.last = Some(sample);

        Ok(RateResult::Rate(rate))
    }

    /// Returns the current baseline, if any.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last
    }
}
