//! [`ParameterSet`] – the validated configuration of one controller.
//!
//! Every field carries a serde default so a configuration file only needs to
//! name the values it changes.  Gain schedule points may be written either as
//! records or in the legacy `[pv, kp_mult, ki_mult, kd_mult]` list form:
//!
//! ```toml
//! gain_schedule_enabled = true
//! gain_schedule_points = [
//!     { pv = 0.0, kp_mult = 1.0, ki_mult = 1.0, kd_mult = 1.0 },
//!     [50.0, 1.2, 0.8, 1.1],
//! ]
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

// ────────────────────────────────────────────────────────────────────────────
// Gain schedule breakpoints
// ────────────────────────────────────────────────────────────────────────────

/// One gain schedule breakpoint: the multipliers applied to the base gains
/// when the process variable equals `pv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct GainSchedulePoint {
    pub pv: f64,
    pub kp_mult: f64,
    pub ki_mult: f64,
    pub kd_mult: f64,
}

impl GainSchedulePoint {
    /// Breakpoint at `pv` with the given multipliers.
    pub fn new(pv: f64, kp_mult: f64, ki_mult: f64, kd_mult: f64) -> Self {
        Self {
            pv,
            kp_mult,
            ki_mult,
            kd_mult,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Record {
        pv: f64,
        kp_mult: f64,
        ki_mult: f64,
        kd_mult: f64,
    },
    List([f64; 4]),
}

impl<'de> Deserialize<'de> for GainSchedulePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PointRepr::deserialize(deserializer)? {
            PointRepr::Record {
                pv,
                kp_mult,
                ki_mult,
                kd_mult,
            } => Self::new(pv, kp_mult, ki_mult, kd_mult),
            PointRepr::List([pv, kp_mult, ki_mult, kd_mult]) => {
                Self::new(pv, kp_mult, ki_mult, kd_mult)
            }
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Manual-mode error handling
// ────────────────────────────────────────────────────────────────────────────

/// What happens to the stored previous error while the loop is in manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ManualErrorTracking {
    /// Refresh the previous error from the live setpoint/PV every manual
    /// cycle so it is current at handover.
    #[default]
    Refresh,
    /// Keep the last automatic-mode error untouched.
    Freeze,
}

// ────────────────────────────────────────────────────────────────────────────
// ParameterSet
// ────────────────────────────────────────────────────────────────────────────

/// Controller configuration.  Immutable for the lifetime of a controller
/// unless explicitly reconfigured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterSet {
    /// Proportional gain.
    #[serde(default = "default_kp")]
    pub kp: f64,

    /// Integral gain.
    #[serde(default = "default_ki")]
    pub ki: f64,

    /// Derivative gain.
    #[serde(default = "default_kd")]
    pub kd: f64,

    /// Nominal cycle period in seconds.  Advisory: every cycle uses the
    /// measured elapsed time.
    #[serde(default = "default_sample_time")]
    pub sample_time: f64,

    #[serde(default = "default_output_min")]
    pub output_min: f64,

    #[serde(default = "default_output_max")]
    pub output_max: f64,

    /// Reported for compatibility; the integral is bounded by back-calculation
    /// against the output range.
    #[serde(default = "default_integral_min")]
    pub integral_min: f64,

    #[serde(default = "default_integral_max")]
    pub integral_max: f64,

    /// Derivative low-pass time constant in seconds.  `0` disables filtering.
    #[serde(default = "default_derivative_filter_time")]
    pub derivative_filter_time: f64,

    /// Maximum output change per second.  `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_rate_limit: Option<f64>,

    /// Output assumed before the first cycle and after a reset.  Defaults to
    /// `output_min`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_output: Option<f64>,

    #[serde(default)]
    pub gain_schedule_enabled: bool,

    #[serde(default)]
    pub gain_schedule_points: Vec<GainSchedulePoint>,

    #[serde(default)]
    pub manual_error_tracking: ManualErrorTracking,
}

fn default_kp() -> f64 {
    1.0
}
fn default_ki() -> f64 {
    0.1
}
fn default_kd() -> f64 {
    0.01
}
fn default_sample_time() -> f64 {
    1.0
}
fn default_output_min() -> f64 {
    0.0
}
fn default_output_max() -> f64 {
    100.0
}
fn default_integral_min() -> f64 {
    -100.0
}
fn default_integral_max() -> f64 {
    100.0
}
fn default_derivative_filter_time() -> f64 {
    0.1
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            ki: default_ki(),
            kd: default_kd(),
            sample_time: default_sample_time(),
            output_min: default_output_min(),
            output_max: default_output_max(),
            integral_min: default_integral_min(),
            integral_max: default_integral_max(),
            derivative_filter_time: default_derivative_filter_time(),
            output_rate_limit: None,
            initial_output: None,
            gain_schedule_enabled: false,
            gain_schedule_points: Vec::new(),
            manual_error_tracking: ManualErrorTracking::default(),
        }
    }
}

impl ParameterSet {
    /// Base gains with the given values and every other field at its default.
    pub fn with_gains(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            ..Self::default()
        }
    }

    /// The output assumed before any cycle has run.
    pub fn safe_output(&self) -> f64 {
        self.initial_output.unwrap_or(self.output_min)
    }

    /// Check every constraint on the set.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking scalar fields before
    /// ranges and ranges before the gain schedule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scalars = [
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("sample_time", self.sample_time),
            ("output_min", self.output_min),
            ("output_max", self.output_max),
            ("integral_min", self.integral_min),
            ("integral_max", self.integral_max),
            ("derivative_filter_time", self.derivative_filter_time),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name });
            }
        }
        for (name, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if value < 0.0 {
                return Err(ConfigError::NegativeGain { name, value });
            }
        }
        if self.sample_time <= 0.0 {
            return Err(ConfigError::NonPositiveSampleTime(self.sample_time));
        }
        if self.output_min > self.output_max {
            return Err(ConfigError::InvertedOutputRange {
                min: self.output_min,
                max: self.output_max,
            });
        }
        if self.integral_min > self.integral_max {
            return Err(ConfigError::InvertedIntegralRange {
                min: self.integral_min,
                max: self.integral_max,
            });
        }
        if self.derivative_filter_time < 0.0 {
            return Err(ConfigError::NegativeFilterTime(self.derivative_filter_time));
        }
        if let Some(rate) = self.output_rate_limit {
            if !rate.is_finite() {
                return Err(ConfigError::NonFinite {
                    name: "output_rate_limit",
                });
            }
            if rate <= 0.0 {
                return Err(ConfigError::NonPositiveRateLimit(rate));
            }
        }
        if let Some(value) = self.initial_output
            && !(value >= self.output_min && value <= self.output_max)
        {
            return Err(ConfigError::InitialOutputOutOfRange {
                value,
                min: self.output_min,
                max: self.output_max,
            });
        }
        self.validate_schedule()
    }

    fn validate_schedule(&self) -> Result<(), ConfigError> {
        let mut previous: Option<f64> = None;
        for (index, point) in self.gain_schedule_points.iter().enumerate() {
            if !point.pv.is_finite() {
                return Err(ConfigError::NonFinite {
                    name: "gain_schedule_points.pv",
                });
            }
            if let Some(prev) = previous
                && point.pv <= prev
            {
                return Err(ConfigError::UnorderedSchedule {
                    index,
                    previous: prev,
                    current: point.pv,
                });
            }
            for (name, value) in [
                ("kp_mult", point.kp_mult),
                ("ki_mult", point.ki_mult),
                ("kd_mult", point.kd_mult),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidMultiplier { index, name, value });
                }
            }
            previous = Some(point.pv);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(points: Vec<GainSchedulePoint>) -> ParameterSet {
        ParameterSet {
            gain_schedule_enabled: true,
            gain_schedule_points: points,
            ..ParameterSet::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ParameterSet::default().validate().is_ok());
    }

    #[test]
    fn safe_output_falls_back_to_output_min() {
        let mut params = ParameterSet::default();
        params.output_min = -5.0;
        assert_eq!(params.safe_output(), -5.0);
        params.initial_output = Some(12.0);
        assert_eq!(params.safe_output(), 12.0);
    }

    #[test]
    fn negative_gain_rejected() {
        let params = ParameterSet::with_gains(1.0, -0.1, 0.0);
        assert_eq!(
            params.validate(),
            Err(ConfigError::NegativeGain {
                name: "ki",
                value: -0.1
            })
        );
    }

    #[test]
    fn nan_gain_rejected() {
        let params = ParameterSet::with_gains(f64::NAN, 0.1, 0.0);
        assert_eq!(params.validate(), Err(ConfigError::NonFinite { name: "kp" }));
    }

    #[test]
    fn zero_sample_time_rejected() {
        let params = ParameterSet {
            sample_time: 0.0,
            ..ParameterSet::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonPositiveSampleTime(_))
        ));
    }

    #[test]
    fn inverted_output_range_rejected() {
        let params = ParameterSet {
            output_min: 10.0,
            output_max: 0.0,
            ..ParameterSet::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvertedOutputRange { .. })
        ));
    }

    #[test]
    fn equal_output_bounds_accepted() {
        let params = ParameterSet {
            output_min: 5.0,
            output_max: 5.0,
            ..ParameterSet::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn inverted_integral_range_rejected() {
        let params = ParameterSet {
            integral_min: 1.0,
            integral_max: -1.0,
            ..ParameterSet::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvertedIntegralRange { .. })
        ));
    }

    #[test]
    fn negative_filter_time_rejected() {
        let params = ParameterSet {
            derivative_filter_time: -0.5,
            ..ParameterSet::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::NegativeFilterTime(-0.5)));
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let params = ParameterSet {
            output_rate_limit: Some(0.0),
            ..ParameterSet::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::NonPositiveRateLimit(0.0)));
    }

    #[test]
    fn initial_output_outside_range_rejected() {
        let params = ParameterSet {
            initial_output: Some(150.0),
            ..ParameterSet::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InitialOutputOutOfRange { .. })
        ));
    }

    #[test]
    fn duplicate_breakpoint_rejected() {
        let params = scheduled(vec![
            GainSchedulePoint::new(0.0, 1.0, 1.0, 1.0),
            GainSchedulePoint::new(0.0, 2.0, 2.0, 2.0),
        ]);
        assert_eq!(
            params.validate(),
            Err(ConfigError::UnorderedSchedule {
                index: 1,
                previous: 0.0,
                current: 0.0
            })
        );
    }

    #[test]
    fn descending_breakpoints_rejected() {
        let params = scheduled(vec![
            GainSchedulePoint::new(50.0, 1.0, 1.0, 1.0),
            GainSchedulePoint::new(100.0, 1.0, 1.0, 1.0),
            GainSchedulePoint::new(75.0, 1.0, 1.0, 1.0),
        ]);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::UnorderedSchedule { index: 2, .. })
        ));
    }

    #[test]
    fn negative_multiplier_rejected() {
        let params = scheduled(vec![GainSchedulePoint::new(0.0, 1.0, -1.0, 1.0)]);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidMultiplier {
                index: 0,
                name: "ki_mult",
                ..
            })
        ));
    }

    #[test]
    fn toml_accepts_records_and_lists() {
        let raw = r#"
            kp = 2.0
            gain_schedule_enabled = true
            gain_schedule_points = [
                { pv = 0.0, kp_mult = 1.0, ki_mult = 1.0, kd_mult = 1.0 },
                [50, 1.2, 0.8, 1.1],
            ]
        "#;
        let params: ParameterSet = toml::from_str(raw).expect("parse");
        assert_eq!(params.kp, 2.0);
        assert_eq!(params.ki, 0.1);
        assert_eq!(params.gain_schedule_points.len(), 2);
        assert_eq!(
            params.gain_schedule_points[1],
            GainSchedulePoint::new(50.0, 1.2, 0.8, 1.1)
        );
        assert!(params.validate().is_ok());
    }

    #[test]
    fn manual_error_tracking_parses_lowercase() {
        let params: ParameterSet =
            serde_json::from_str(r#"{"manual_error_tracking":"freeze"}"#).expect("parse");
        assert_eq!(params.manual_error_tracking, ManualErrorTracking::Freeze);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvertedOutputRange {
            min: 10.0,
            max: 0.0,
        };
        assert!(err.to_string().contains("output_max"));
    }
}
