//! PID core with back-calculation anti-windup.
//!
//! [`PidCore::compute`] is a pure function of the persisted [`PidState`] and
//! the current cycle's inputs: it returns the terms it computed together with
//! the state to commit, and never mutates anything itself.  The caller
//! decides whether to commit.
//!
//! Anti-windup does not use a separate integral bound.  When the unclamped
//! sum lies outside what the output stage can deliver, the accumulator is
//! solved for the value that would have produced exactly the limited output
//! given this cycle's proportional and derivative terms.
//!
//! # Example
//!
//! ```rust
//! use loopctl_control::limiter::OutputLimiter;
//! use loopctl_control::pid::{Gains, PidCore, PidState};
//!
//! let core = PidCore::new(0.0, OutputLimiter::new(0.0, 100.0, None));
//! let step = core.compute(&PidState::default(), 50.0, 40.0, Gains::new(2.0, 0.5, 0.1), 1.0, 0.0);
//!
//! assert!((step.terms.proportional - 20.0).abs() < 1e-9);
//! assert!((step.terms.integral_term - 5.0).abs() < 1e-9);
//! assert!((step.terms.derivative_term - 1.0).abs() < 1e-9);
//! assert!((step.terms.unclamped_sum - 26.0).abs() < 1e-9);
//! ```

use loopctl_types::ParameterSet;

use crate::derivative_filter;
use crate::gain_schedule::GainMultipliers;
use crate::limiter::OutputLimiter;

/// Proportional, integral, and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    /// Gains from explicit values.
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    /// Unscheduled gains from `params`.
    pub fn base(params: &ParameterSet) -> Self {
        Self::new(params.kp, params.ki, params.kd)
    }

    /// Base gains scaled by scheduler multipliers.
    pub fn scaled(self, m: GainMultipliers) -> Self {
        Self::new(self.kp * m.kp, self.ki * m.ki, self.kd * m.kd)
    }
}

/// The part of the controller state owned by the PID core.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    pub integral_accumulator: f64,
    pub previous_error: f64,
    /// Unscaled; the derivative gain is applied on read.
    pub previous_filtered_derivative: f64,
}

/// Terms computed for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidTerms {
    pub error: f64,
    pub proportional: f64,
    /// `ki × accumulator`, using the committed accumulator.
    pub integral_term: f64,
    pub derivative_raw: f64,
    pub filtered_derivative: f64,
    pub derivative_term: f64,
    /// `P + I + D` before anti-windup, using the provisional accumulator.
    pub unclamped_sum: f64,
}

/// Result of [`PidCore::compute`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidStep {
    pub terms: PidTerms,
    /// State to commit if the cycle completes.
    pub state: PidState,
    /// The unclamped sum was outside the output range.
    pub saturated: bool,
}

/// Stateless PID computation over a caller-held [`PidState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidCore {
    derivative_filter_time: f64,
    limiter: OutputLimiter,
}

impl PidCore {
    /// Core with the given derivative filter time constant and output stage.
    pub fn new(derivative_filter_time: f64, limiter: OutputLimiter) -> Self {
        Self {
            derivative_filter_time,
            limiter,
        }
    }

    /// Core configured from `params`.
    pub fn from_params(params: &ParameterSet) -> Self {
        Self::new(
            params.derivative_filter_time,
            OutputLimiter::from_params(params),
        )
    }

    /// Compute the proportional and derivative terms and the provisional
    /// integral for this cycle, without anti-windup.
    ///
    /// A non-positive `dt` skips integral accumulation and treats the raw
    /// derivative as zero.
    pub fn terms(
        &self,
        state: &PidState,
        setpoint: f64,
        process_variable: f64,
        gains: Gains,
        dt: f64,
    ) -> (PidTerms, f64) {
        let error = setpoint - process_variable;
        let proportional = gains.kp * error;

        let provisional = if dt > 0.0 {
            state.integral_accumulator + error * dt
        } else {
            state.integral_accumulator
        };
        let integral_term = gains.ki * provisional;

        let derivative_raw = if dt > 0.0 {
            (error - state.previous_error) / dt
        } else {
            0.0
        };
        let filtered_derivative = derivative_filter::filter(
            derivative_raw,
            dt,
            self.derivative_filter_time,
            state.previous_filtered_derivative,
        );
        let derivative_term = gains.kd * filtered_derivative;

        let terms = PidTerms {
            error,
            proportional,
            integral_term,
            derivative_raw,
            filtered_derivative,
            derivative_term,
            unclamped_sum: proportional + integral_term + derivative_term,
        };
        (terms, provisional)
    }

    /// Run one PID step.
    ///
    /// - `last_accepted_output` – the output the limiter accepted on the
    ///   previous cycle.  With a rate limit configured it narrows the window
    ///   the accumulator is back-calculated against, so the integral tracks
    ///   the output that can actually be applied.
    pub fn compute(
        &self,
        state: &PidState,
        setpoint: f64,
        process_variable: f64,
        gains: Gains,
        dt: f64,
        last_accepted_output: f64,
    ) -> PidStep {
        let (mut terms, provisional) =
            self.terms(state, setpoint, process_variable, gains, dt);
        let sum = terms.unclamped_sum;
        let saturated = self.limiter.saturates(sum);
        let (lo, hi) = self.limiter.reachable(last_accepted_output, dt);

        let integral_accumulator = if sum < lo || sum > hi {
            let target = sum.clamp(lo, hi);
            back_calculate(target, terms.proportional, terms.derivative_term, gains.ki)
                .unwrap_or(state.integral_accumulator)
        } else {
            provisional
        };
        terms.integral_term = gains.ki * integral_accumulator;

        PidStep {
            terms,
            state: PidState {
                integral_accumulator,
                previous_error: terms.error,
                previous_filtered_derivative: terms.filtered_derivative,
            },
            saturated,
        }
    }
}

/// Solve for the accumulator that makes `P + ki × acc + D == target`.
///
/// Returns `None` when `ki` is zero and the equation has no solution.
pub fn back_calculate(target: f64, proportional: f64, derivative_term: f64, ki: f64) -> Option<f64> {
    if ki == 0.0 {
        None
    } else {
        Some((target - proportional - derivative_term) / ki)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(min: f64, max: f64) -> PidCore {
        PidCore::new(0.0, OutputLimiter::new(min, max, None))
    }

    const GAINS: Gains = Gains {
        kp: 2.0,
        ki: 0.5,
        kd: 0.1,
    };

    #[test]
    fn first_step_matches_hand_calculation() {
        let step = core(0.0, 100.0).compute(&PidState::default(), 50.0, 40.0, GAINS, 1.0, 0.0);
        assert!((step.terms.error - 10.0).abs() < 1e-12);
        assert!((step.terms.proportional - 20.0).abs() < 1e-12);
        assert!((step.terms.integral_term - 5.0).abs() < 1e-12);
        assert!((step.terms.derivative_raw - 10.0).abs() < 1e-12);
        assert!((step.terms.derivative_term - 1.0).abs() < 1e-12);
        assert!((step.terms.unclamped_sum - 26.0).abs() < 1e-12);
        assert!(!step.saturated);
        assert_eq!(step.state.integral_accumulator, 10.0);
        assert_eq!(step.state.previous_error, 10.0);
        assert_eq!(step.state.previous_filtered_derivative, 10.0);
    }

    #[test]
    fn saturation_back_calculates_accumulator() {
        let state = PidState {
            integral_accumulator: 20.0,
            previous_error: 10.0,
            previous_filtered_derivative: 0.0,
        };
        // Provisional accumulator 30 → sum 20 + 15 + 0 = 35 > 30.
        let step = core(0.0, 30.0).compute(&state, 50.0, 40.0, GAINS, 1.0, 30.0);
        assert!(step.saturated);
        assert!((step.terms.unclamped_sum - 35.0).abs() < 1e-12);
        assert!((step.state.integral_accumulator - 20.0).abs() < 1e-12);
        let clamped = step.terms.proportional + step.terms.integral_term + step.terms.derivative_term;
        assert!((clamped - 30.0).abs() < 1e-12);
    }

    #[test]
    fn saturation_below_minimum_back_calculates_upward() {
        let state = PidState {
            integral_accumulator: -50.0,
            ..PidState::default()
        };
        let step = core(0.0, 100.0).compute(&state, 0.0, 0.0, GAINS, 1.0, 0.0);
        assert!(step.saturated);
        assert!(step.state.integral_accumulator.abs() < 1e-12);
        assert!(step.terms.integral_term.abs() < 1e-12);
    }

    #[test]
    fn zero_ki_leaves_accumulator_unchanged_on_saturation() {
        let state = PidState {
            integral_accumulator: 7.0,
            ..PidState::default()
        };
        let gains = Gains::new(10.0, 0.0, 0.0);
        let step = core(0.0, 30.0).compute(&state, 50.0, 40.0, gains, 1.0, 0.0);
        assert!(step.saturated);
        assert_eq!(step.state.integral_accumulator, 7.0);
    }

    #[test]
    fn non_positive_dt_skips_integration_and_derivative() {
        let state = PidState {
            integral_accumulator: 4.0,
            previous_error: 1.0,
            previous_filtered_derivative: 2.0,
        };
        let step = core(-100.0, 100.0).compute(&state, 10.0, 5.0, GAINS, 0.0, 0.0);
        assert_eq!(step.state.integral_accumulator, 4.0);
        assert_eq!(step.terms.derivative_raw, 0.0);
        // Filter holds its previous value.
        assert_eq!(step.state.previous_filtered_derivative, 2.0);
        assert!((step.terms.derivative_term - 0.2).abs() < 1e-12);
        // previous_error always advances.
        assert_eq!(step.state.previous_error, 5.0);
    }

    #[test]
    fn rate_window_tracks_previous_accepted_output() {
        let core = PidCore::new(0.0, OutputLimiter::new(0.0, 100.0, Some(5.0)));
        let gains = Gains::new(1.0, 1.0, 0.0);
        // Sum = 10 + 10 = 20, but only 0..5 is reachable from 0 in one second.
        let step = core.compute(&PidState::default(), 10.0, 0.0, gains, 1.0, 0.0);
        assert!(!step.saturated, "inside the output range");
        assert!((step.state.integral_accumulator - (-5.0)).abs() < 1e-12);
        assert!((step.terms.proportional + step.terms.integral_term - 5.0).abs() < 1e-12);
    }

    #[test]
    fn filter_state_is_unscaled_by_gain() {
        let core = PidCore::new(1.0, OutputLimiter::new(-1e9, 1e9, None));
        let a = core.compute(&PidState::default(), 1.0, 0.0, Gains::new(0.0, 0.0, 1.0), 1.0, 0.0);
        let b = core.compute(&PidState::default(), 1.0, 0.0, Gains::new(0.0, 0.0, 5.0), 1.0, 0.0);
        assert_eq!(
            a.state.previous_filtered_derivative,
            b.state.previous_filtered_derivative
        );
        assert!((b.terms.derivative_term - 5.0 * a.terms.derivative_term).abs() < 1e-12);
    }

    #[test]
    fn back_calculate_solves_for_target() {
        assert_eq!(back_calculate(30.0, 20.0, 0.0, 0.5), Some(20.0));
        assert_eq!(back_calculate(30.0, 20.0, 0.0, 0.0), None);
    }
}
