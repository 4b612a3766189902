//! `loopctl-types` – shared vocabulary of the loopctl workspace.
//!
//! - [`params`] – [`ParameterSet`] and its gain schedule breakpoints, with
//!   one-shot validation.
//! - [`error`] – [`ConfigError`] and [`ControlError`].
//! - Cycle I/O records: [`ControlInput`], [`ControlOutput`], [`Diagnostics`],
//!   [`Statistics`].

pub mod error;
pub mod params;

use std::time::Instant;

use serde::{Deserialize, Serialize};

pub use error::{ConfigError, ControlError};
pub use params::{GainSchedulePoint, ManualErrorTracking, ParameterSet};

/// Which path produced the output of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// The operator's manual output is passed through.
    Manual,
    /// The PID algorithm computes the output.
    Auto,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMode::Manual => write!(f, "manual"),
            ControlMode::Auto => write!(f, "auto"),
        }
    }
}

/// Lifecycle status of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerStatus {
    Initialized,
    Running,
    Stopped,
}

impl std::fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerStatus::Initialized => write!(f, "initialized"),
            ControllerStatus::Running => write!(f, "running"),
            ControllerStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// How a cycle completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    /// Full computation with a positive elapsed time.
    Normal,
    /// Elapsed time was not positive: no integral accumulation, zero raw
    /// derivative.  State is still committed.
    Degenerate,
    /// A non-finite input or intermediate value.  The previous output is held
    /// and no state is committed.
    Faulted,
}

/// Values supplied by the host for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct ControlInput {
    pub setpoint: f64,
    pub process_variable: f64,
    pub manual_mode: bool,
    pub manual_output: f64,
    /// Monotonic timestamp of this cycle.
    pub now: Instant,
}

impl ControlInput {
    /// An automatic-mode input.
    pub fn auto(setpoint: f64, process_variable: f64, now: Instant) -> Self {
        Self {
            setpoint,
            process_variable,
            manual_mode: false,
            manual_output: 0.0,
            now,
        }
    }

    /// A manual-mode input holding `manual_output`.
    pub fn manual(setpoint: f64, process_variable: f64, manual_output: f64, now: Instant) -> Self {
        Self {
            setpoint,
            process_variable,
            manual_mode: true,
            manual_output,
            now,
        }
    }
}

/// Effective gains and counters reported with every output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub effective_kp: f64,
    pub effective_ki: f64,
    pub effective_kd: f64,
    pub integral_saturation_count: u64,
    pub rate_limit_count: u64,
}

/// Result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlOutput {
    /// The accepted, range- and rate-limited output.
    pub output: f64,
    pub error: f64,
    pub proportional: f64,
    pub integral_term: f64,
    pub derivative_term: f64,
    pub mode: ControlMode,
    /// Elapsed time used by the cycle, in seconds.
    pub dt: f64,
    pub status: CycleStatus,
    pub diagnostics: Diagnostics,
}

/// Snapshot of a controller's accumulated statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub effective_kp: f64,
    pub effective_ki: f64,
    pub effective_kd: f64,
    pub integral_term: f64,
    pub derivative_term: f64,
    pub filtered_derivative: f64,
    pub integral_saturation_count: u64,
    pub rate_limit_count: u64,
    pub execution_count: u64,
    pub gain_schedule_active: bool,
    pub mode: ControlMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_constructors_set_mode_flag() {
        let now = Instant::now();
        assert!(!ControlInput::auto(1.0, 0.0, now).manual_mode);
        let manual = ControlInput::manual(1.0, 0.0, 42.0, now);
        assert!(manual.manual_mode);
        assert_eq!(manual.manual_output, 42.0);
    }

    #[test]
    fn control_output_serializes_lowercase_enums() {
        let out = ControlOutput {
            output: 26.0,
            error: 10.0,
            proportional: 20.0,
            integral_term: 5.0,
            derivative_term: 1.0,
            mode: ControlMode::Auto,
            dt: 1.0,
            status: CycleStatus::Normal,
            diagnostics: Diagnostics {
                effective_kp: 2.0,
                effective_ki: 0.5,
                effective_kd: 0.1,
                integral_saturation_count: 0,
                rate_limit_count: 0,
            },
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains(r#""mode":"auto""#));
        assert!(json.contains(r#""status":"normal""#));
        let back: ControlOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn control_error_display() {
        let err = ControlError::NotRunning {
            status: ControllerStatus::Stopped,
        };
        assert!(err.to_string().contains("stopped"));

        let err: ControlError = ConfigError::NonPositiveSampleTime(0.0).into();
        assert!(err.to_string().contains("Configuration Error"));
    }
}
