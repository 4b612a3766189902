//! [`GainScheduler`] – operating-point dependent gain multipliers.
//!
//! Maps the current process variable onto multipliers for the three base
//! gains by piecewise-linear interpolation over the configured breakpoints.
//! Outside the configured range the nearest boundary breakpoint applies; there
//! is no extrapolation.
//!
//! # Example
//!
//! ```rust
//! use loopctl_control::gain_schedule::GainScheduler;
//! use loopctl_types::GainSchedulePoint;
//!
//! let scheduler = GainScheduler::new(
//!     true,
//!     vec![
//!         GainSchedulePoint::new(0.0, 1.0, 1.0, 1.0),
//!         GainSchedulePoint::new(100.0, 2.0, 0.5, 1.0),
//!     ],
//! );
//! let m = scheduler.multipliers(50.0);
//! assert!((m.kp - 1.5).abs() < 1e-12);
//! assert!((m.ki - 0.75).abs() < 1e-12);
//! ```

use loopctl_types::{GainSchedulePoint, ParameterSet};

/// Multipliers applied to `(kp, ki, kd)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainMultipliers {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl GainMultipliers {
    pub const UNITY: Self = Self {
        kp: 1.0,
        ki: 1.0,
        kd: 1.0,
    };
}

impl From<&GainSchedulePoint> for GainMultipliers {
    fn from(point: &GainSchedulePoint) -> Self {
        Self {
            kp: point.kp_mult,
            ki: point.ki_mult,
            kd: point.kd_mult,
        }
    }
}

/// Interpolating gain scheduler.
///
/// The breakpoints are assumed to be strictly increasing in `pv`; that is
/// checked once by [`ParameterSet::validate`] and not re-checked per cycle.
#[derive(Debug, Clone, Default)]
pub struct GainScheduler {
    enabled: bool,
    points: Vec<GainSchedulePoint>,
}

impl GainScheduler {
    /// Scheduler over `points`, which must already be ordered by `pv`.
    pub fn new(enabled: bool, points: Vec<GainSchedulePoint>) -> Self {
        Self { enabled, points }
    }

    /// Scheduler built from the validated schedule in `params`.
    pub fn from_params(params: &ParameterSet) -> Self {
        Self::new(
            params.gain_schedule_enabled,
            params.gain_schedule_points.clone(),
        )
    }

    /// `true` when scheduling is enabled and has enough breakpoints to
    /// change anything.
    pub fn is_active(&self) -> bool {
        self.enabled && self.points.len() >= 2
    }

    /// Multipliers at operating point `pv`.
    pub fn multipliers(&self, pv: f64) -> GainMultipliers {
        if !self.is_active() || !pv.is_finite() {
            return GainMultipliers::UNITY;
        }
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];
        if pv <= first.pv {
            return first.into();
        }
        if pv >= last.pv {
            return last.into();
        }

        // First breakpoint strictly above pv; its predecessor is <= pv.
        let upper = self.points.partition_point(|p| p.pv <= pv);
        let lo = &self.points[upper - 1];
        let hi = &self.points[upper];
        let ratio = (pv - lo.pv) / (hi.pv - lo.pv);
        GainMultipliers {
            kp: lerp(lo.kp_mult, hi.kp_mult, ratio),
            ki: lerp(lo.ki_mult, hi.ki_mult, ratio),
            kd: lerp(lo.kd_mult, hi.kd_mult, ratio),
        }
    }
}

fn lerp(a: f64, b: f64, ratio: f64) -> f64 {
    a + ratio * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_point() -> GainScheduler {
        GainScheduler::new(
            true,
            vec![
                GainSchedulePoint::new(0.0, 1.0, 1.0, 1.0),
                GainSchedulePoint::new(50.0, 1.2, 0.8, 1.1),
                GainSchedulePoint::new(100.0, 0.8, 1.2, 0.9),
            ],
        )
    }

    fn assert_close(m: GainMultipliers, kp: f64, ki: f64, kd: f64) {
        assert!((m.kp - kp).abs() < 1e-12, "kp {} != {}", m.kp, kp);
        assert!((m.ki - ki).abs() < 1e-12, "ki {} != {}", m.ki, ki);
        assert!((m.kd - kd).abs() < 1e-12, "kd {} != {}", m.kd, kd);
    }

    #[test]
    fn disabled_returns_unity() {
        let mut s = three_point();
        s.enabled = false;
        assert_eq!(s.multipliers(50.0), GainMultipliers::UNITY);
    }

    #[test]
    fn single_point_returns_unity() {
        let s = GainScheduler::new(true, vec![GainSchedulePoint::new(10.0, 3.0, 3.0, 3.0)]);
        assert!(!s.is_active());
        assert_eq!(s.multipliers(10.0), GainMultipliers::UNITY);
    }

    #[test]
    fn exact_breakpoints_return_their_multipliers() {
        let s = three_point();
        assert_close(s.multipliers(0.0), 1.0, 1.0, 1.0);
        assert_close(s.multipliers(50.0), 1.2, 0.8, 1.1);
        assert_close(s.multipliers(100.0), 0.8, 1.2, 0.9);
    }

    #[test]
    fn outside_range_clamps_to_boundary() {
        let s = three_point();
        assert_close(s.multipliers(-25.0), 1.0, 1.0, 1.0);
        assert_close(s.multipliers(1e6), 0.8, 1.2, 0.9);
    }

    #[test]
    fn midpoint_is_arithmetic_mean() {
        let s = three_point();
        assert_close(s.multipliers(25.0), 1.1, 0.9, 1.05);
        assert_close(s.multipliers(75.0), 1.0, 1.0, 1.0);
    }

    #[test]
    fn interpolation_is_linear_within_segment() {
        let s = three_point();
        // 10% of the way from pv=50 to pv=100.
        assert_close(s.multipliers(55.0), 1.16, 0.84, 1.08);
    }

    #[test]
    fn non_finite_pv_returns_unity() {
        let s = three_point();
        assert_eq!(s.multipliers(f64::NAN), GainMultipliers::UNITY);
    }
}
