//! Error types shared across the workspace.

use thiserror::Error;

use crate::ControllerStatus;

/// A rejected [`ParameterSet`][crate::ParameterSet].
///
/// Returned by [`ParameterSet::validate`][crate::ParameterSet::validate]; a
/// controller is never constructed from a set that produces one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("parameter `{name}` must be finite")]
    NonFinite { name: &'static str },

    #[error("gain `{name}` must be >= 0 (got {value})")]
    NegativeGain { name: &'static str, value: f64 },

    #[error("sample_time must be > 0 (got {0})")]
    NonPositiveSampleTime(f64),

    #[error("output_min {min} exceeds output_max {max}")]
    InvertedOutputRange { min: f64, max: f64 },

    #[error("integral_min {min} exceeds integral_max {max}")]
    InvertedIntegralRange { min: f64, max: f64 },

    #[error("derivative_filter_time must be >= 0 (got {0})")]
    NegativeFilterTime(f64),

    #[error("output_rate_limit must be > 0 when set (got {0})")]
    NonPositiveRateLimit(f64),

    #[error("initial_output {value} lies outside [{min}, {max}]")]
    InitialOutputOutOfRange { value: f64, min: f64, max: f64 },

    #[error(
        "gain schedule point {index} has pv {current}, which does not strictly follow {previous}"
    )]
    UnorderedSchedule {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("gain schedule point {index}: `{name}` must be finite and >= 0 (got {value})")]
    InvalidMultiplier {
        index: usize,
        name: &'static str,
        value: f64,
    },
}

/// Errors surfaced by a controller to its host.
///
/// Runtime faults inside a cycle (non-monotonic clock, non-finite input) are
/// never reported here; they degrade the cycle and are flagged in
/// [`CycleStatus`][crate::CycleStatus] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Controller not running (status: {status})")]
    NotRunning { status: ControllerStatus },
}
