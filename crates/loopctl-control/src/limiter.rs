//! [`OutputLimiter`] – range saturation followed by rate limiting.
//!
//! The limiter is the last stage of an automatic cycle.  Its accepted value
//! is what the actuator receives and what the next cycle measures its rate
//! window and anti-windup target against.

use loopctl_types::ParameterSet;

/// Outcome of [`OutputLimiter::limit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limited {
    /// The raw sum clamped to the output range.
    pub saturated: f64,
    /// The value actually applied.
    pub accepted: f64,
    /// `true` when the rate limit moved `accepted` away from `saturated`.
    pub rate_limited: bool,
}

/// Output range and optional rate limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputLimiter {
    output_min: f64,
    output_max: f64,
    rate_limit: Option<f64>,
}

impl OutputLimiter {
    /// `output_min <= output_max` is a precondition.
    pub fn new(output_min: f64, output_max: f64, rate_limit: Option<f64>) -> Self {
        Self {
            output_min,
            output_max,
            rate_limit,
        }
    }

    /// Limiter for the output range and rate limit in `params`.
    pub fn from_params(params: &ParameterSet) -> Self {
        Self::new(params.output_min, params.output_max, params.output_rate_limit)
    }

    /// Clamp `value` to `[output_min, output_max]`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.output_min, self.output_max)
    }

    /// `true` when `value` lies outside the output range.
    pub fn saturates(&self, value: f64) -> bool {
        value < self.output_min || value > self.output_max
    }

    /// Largest permitted step for an interval of `dt` seconds, or `None` when
    /// no rate limit is configured.
    pub fn max_delta(&self, dt: f64) -> Option<f64> {
        self.rate_limit.map(|rate| rate * dt.max(0.0))
    }

    /// The interval of outputs reachable this cycle from `previous`: the
    /// output range, narrowed by the rate limit when one is configured and
    /// `dt > 0`.
    pub fn reachable(&self, previous: f64, dt: f64) -> (f64, f64) {
        match self.max_delta(dt) {
            Some(delta) if dt > 0.0 => (
                (previous - delta).max(self.output_min),
                (previous + delta).min(self.output_max),
            ),
            _ => (self.output_min, self.output_max),
        }
    }

    /// Clamp `raw` to the range, then limit its step away from `previous`.
    pub fn limit(&self, raw: f64, previous: f64, dt: f64) -> Limited {
        let saturated = self.clamp(raw);
        let Some(max_delta) = self.max_delta(dt) else {
            return Limited {
                saturated,
                accepted: saturated,
                rate_limited: false,
            };
        };

        let delta = saturated - previous;
        if delta.abs() > max_delta {
            let accepted = previous + delta.signum() * max_delta;
            tracing::debug!(
                requested = saturated,
                accepted,
                max_delta,
                "output rate limited"
            );
            Limited {
                saturated,
                accepted,
                rate_limited: true,
            }
        } else {
            Limited {
                saturated,
                accepted: saturated,
                rate_limited: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_without_rate_limit() {
        let limiter = OutputLimiter::new(0.0, 100.0, None);
        let out = limiter.limit(150.0, 0.0, 1.0);
        assert_eq!(out.saturated, 100.0);
        assert_eq!(out.accepted, 100.0);
        assert!(!out.rate_limited);
        assert_eq!(limiter.limit(-3.0, 50.0, 1.0).accepted, 0.0);
    }

    #[test]
    fn rate_limits_rising_step() {
        let limiter = OutputLimiter::new(0.0, 100.0, Some(10.0));
        let out = limiter.limit(80.0, 20.0, 0.5);
        assert_eq!(out.accepted, 25.0);
        assert!(out.rate_limited);
    }

    #[test]
    fn rate_limits_falling_step() {
        let limiter = OutputLimiter::new(0.0, 100.0, Some(10.0));
        let out = limiter.limit(0.0, 50.0, 1.0);
        assert_eq!(out.accepted, 40.0);
        assert!(out.rate_limited);
    }

    #[test]
    fn small_step_passes_unchanged() {
        let limiter = OutputLimiter::new(0.0, 100.0, Some(10.0));
        let out = limiter.limit(55.0, 50.0, 1.0);
        assert_eq!(out.accepted, 55.0);
        assert!(!out.rate_limited);
    }

    #[test]
    fn rate_applies_after_saturation() {
        let limiter = OutputLimiter::new(0.0, 30.0, Some(10.0));
        // Raw 500 saturates to 30; the step from 25 is within the rate.
        let out = limiter.limit(500.0, 25.0, 1.0);
        assert_eq!(out.accepted, 30.0);
        assert!(!out.rate_limited);
    }

    #[test]
    fn zero_dt_holds_previous_output() {
        let limiter = OutputLimiter::new(0.0, 100.0, Some(10.0));
        let out = limiter.limit(80.0, 20.0, 0.0);
        assert_eq!(out.accepted, 20.0);
        assert!(out.rate_limited);
    }

    #[test]
    fn reachable_window_intersects_range() {
        let limiter = OutputLimiter::new(0.0, 100.0, Some(10.0));
        assert_eq!(limiter.reachable(95.0, 1.0), (85.0, 100.0));
        assert_eq!(limiter.reachable(5.0, 0.5), (0.0, 10.0));
        assert_eq!(limiter.reachable(50.0, 0.0), (0.0, 100.0));

        let unlimited = OutputLimiter::new(-1.0, 1.0, None);
        assert_eq!(unlimited.reachable(0.0, 1.0), (-1.0, 1.0));
    }
}
