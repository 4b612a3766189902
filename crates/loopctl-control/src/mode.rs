//! [`ModeManager`] – the control cycle.
//!
//! Selects between manual pass-through and automatic PID computation each
//! cycle from the host-supplied `manual_mode` flag, and performs bumpless
//! transfer when the loop goes from manual to automatic.
//!
//! Every cycle works on a copy of the [`ControllerState`] and assigns it back
//! only when the cycle completes, so a faulted cycle leaves no trace.
//!
//! # Mode transitions
//!
//! | From | To | Effect |
//! |---|---|---|
//! | Manual | Manual | output = clamped manual value; previous error refreshed (configurable) |
//! | Manual | Auto | accumulator pre-loaded so the first automatic output equals the last manual one |
//! | Auto | Manual | output = manual value immediately; accumulator and filter state frozen |
//! | Auto | Auto | gain schedule → PID core → anti-windup → limiter |

use loopctl_types::{
    ConfigError, ControlInput, ControlMode, ControlOutput, CycleStatus, Diagnostics,
    ManualErrorTracking, ParameterSet,
};
use tracing::{debug, info, warn};

use crate::gain_schedule::GainScheduler;
use crate::limiter::OutputLimiter;
use crate::pid::{Gains, PidCore, back_calculate};
use crate::state::ControllerState;

/// Emit a cycle summary at `debug` every this many executions.
const SUMMARY_INTERVAL: u64 = 100;

/// Values reported by a completed cycle.
struct CycleTerms {
    output: f64,
    error: f64,
    proportional: f64,
    integral_term: f64,
    derivative_term: f64,
}

/// Orchestrates the gain scheduler, PID core, and output limiter over one
/// exclusively owned [`ControllerState`].
#[derive(Debug, Clone)]
pub struct ModeManager {
    params: ParameterSet,
    scheduler: GainScheduler,
    core: PidCore,
    limiter: OutputLimiter,
    state: ControllerState,
}

impl ModeManager {
    /// Validate `params` and build a manager with initial state.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`ParameterSet::validate`].
    pub fn new(params: ParameterSet) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            scheduler: GainScheduler::from_params(&params),
            core: PidCore::from_params(&params),
            limiter: OutputLimiter::from_params(&params),
            state: ControllerState::initial(&params),
            params,
        })
    }

    /// Active configuration.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Last committed cycle state.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// The gain scheduler built from the active configuration.
    pub fn scheduler(&self) -> &GainScheduler {
        &self.scheduler
    }

    /// Base gains scaled by the schedule at `process_variable`.
    pub fn effective_gains(&self, process_variable: f64) -> Gains {
        Gains::base(&self.params).scaled(self.scheduler.multipliers(process_variable))
    }

    /// Return the state to its initial values, keeping the configuration.
    pub fn reset(&mut self) {
        self.state = ControllerState::initial(&self.params);
    }

    /// Replace the configuration.  Dynamic state is kept; the previous
    /// accepted output is pulled into the new output range.
    ///
    /// # Errors
    ///
    /// Returns the validation error and leaves the current configuration in
    /// place when `params` is invalid.
    pub fn reconfigure(&mut self, params: ParameterSet) -> Result<(), ConfigError> {
        params.validate()?;
        self.scheduler = GainScheduler::from_params(&params);
        self.core = PidCore::from_params(&params);
        self.limiter = OutputLimiter::from_params(&params);
        self.state.previous_accepted_output =
            self.limiter.clamp(self.state.previous_accepted_output);
        self.params = params;
        Ok(())
    }

    /// Run one control cycle with measured elapsed time `dt` (seconds).
    ///
    /// `input.now` is not consulted; timing belongs to the caller.
    pub fn cycle(&mut self, input: &ControlInput, dt: f64) -> ControlOutput {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        let gains = self.effective_gains(input.process_variable);

        let mut next = self.state;
        let terms = if input.manual_mode {
            self.manual(&mut next, input, gains)
        } else {
            self.automatic(&mut next, input, gains, dt)
        };
        let Some(terms) = terms else {
            return self.faulted(input, gains, dt);
        };

        next.execution_count += 1;
        if next.mode != self.state.mode {
            info!(from = %self.state.mode, to = %next.mode, output = terms.output, "mode switched");
        }
        self.state = next;

        let status = if dt > 0.0 {
            CycleStatus::Normal
        } else {
            debug!(dt, "degenerate cycle: integral and derivative held");
            CycleStatus::Degenerate
        };

        if self.state.execution_count % SUMMARY_INTERVAL == 0 {
            debug!(
                setpoint = input.setpoint,
                process_variable = input.process_variable,
                error = terms.error,
                p = terms.proportional,
                i = terms.integral_term,
                d = terms.derivative_term,
                output = terms.output,
                "cycle summary"
            );
        }

        self.report(terms, gains, dt, status)
    }

    fn manual(
        &self,
        next: &mut ControllerState,
        input: &ControlInput,
        gains: Gains,
    ) -> Option<CycleTerms> {
        let error = input.setpoint - input.process_variable;
        if !input.manual_output.is_finite() || !error.is_finite() {
            return None;
        }

        let output = self.limiter.clamp(input.manual_output);
        if self.params.manual_error_tracking == ManualErrorTracking::Refresh {
            next.pid.previous_error = error;
        }
        next.previous_accepted_output = output;
        next.mode = ControlMode::Manual;

        Some(CycleTerms {
            output,
            error,
            proportional: gains.kp * error,
            integral_term: gains.ki * next.pid.integral_accumulator,
            derivative_term: gains.kd * next.pid.previous_filtered_derivative,
        })
    }

    fn automatic(
        &self,
        next: &mut ControllerState,
        input: &ControlInput,
        gains: Gains,
        dt: f64,
    ) -> Option<CycleTerms> {
        let (setpoint, pv) = (input.setpoint, input.process_variable);
        if !setpoint.is_finite() || !pv.is_finite() {
            return None;
        }

        let mut pid = next.pid;
        if next.mode == ControlMode::Manual {
            // Bumpless transfer: solve for the accumulator that reproduces the
            // last manual output with this cycle's P and D.
            let last_manual = next.previous_accepted_output;
            let (terms, _) = self.core.terms(&pid, setpoint, pv, gains, dt);
            match back_calculate(last_manual, terms.proportional, terms.derivative_term, gains.ki)
            {
                Some(acc) => pid.integral_accumulator = acc,
                None => {
                    next.integral_saturation_count += 1;
                    debug!("bumpless pre-load skipped: effective ki is zero");
                }
            }
        }

        let step = self
            .core
            .compute(&pid, setpoint, pv, gains, dt, next.previous_accepted_output);
        if !step.terms.unclamped_sum.is_finite() || !step.state.integral_accumulator.is_finite() {
            return None;
        }
        let limited = self
            .limiter
            .limit(step.terms.unclamped_sum, next.previous_accepted_output, dt);

        next.pid = step.state;
        if step.saturated {
            next.integral_saturation_count += 1;
        }
        if limited.rate_limited {
            next.rate_limit_count += 1;
        }
        next.previous_accepted_output = limited.accepted;
        next.mode = ControlMode::Auto;

        Some(CycleTerms {
            output: limited.accepted,
            error: step.terms.error,
            proportional: step.terms.proportional,
            integral_term: step.terms.integral_term,
            derivative_term: step.terms.derivative_term,
        })
    }

    fn faulted(&self, input: &ControlInput, gains: Gains, dt: f64) -> ControlOutput {
        warn!(
            setpoint = input.setpoint,
            process_variable = input.process_variable,
            manual_mode = input.manual_mode,
            manual_output = input.manual_output,
            "non-finite value in control cycle; holding previous output"
        );
        let error = input.setpoint - input.process_variable;
        let terms = CycleTerms {
            output: self.state.previous_accepted_output,
            error,
            proportional: gains.kp * error,
            integral_term: gains.ki * self.state.pid.integral_accumulator,
            derivative_term: gains.kd * self.state.pid.previous_filtered_derivative,
        };
        self.report(terms, gains, dt, CycleStatus::Faulted)
    }

    fn report(&self, terms: CycleTerms, gains: Gains, dt: f64, status: CycleStatus) -> ControlOutput {
        ControlOutput {
            output: terms.output,
            error: terms.error,
            proportional: terms.proportional,
            integral_term: terms.integral_term,
            derivative_term: terms.derivative_term,
            mode: self.state.mode,
            dt,
            status,
            diagnostics: Diagnostics {
                effective_kp: gains.kp,
                effective_ki: gains.ki,
                effective_kd: gains.kd,
                integral_saturation_count: self.state.integral_saturation_count,
                rate_limit_count: self.state.rate_limit_count,
            },
        }
    }
}
