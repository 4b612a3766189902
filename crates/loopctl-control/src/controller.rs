//! [`Controller`] – lifecycle and timing around a [`ModeManager`].
//!
//! The host constructs a controller, calls [`Controller::start`] once, then
//! [`Controller::execute`] once per scan.  Elapsed time is measured from the
//! `now` timestamp of consecutive inputs, so scan jitter is absorbed rather
//! than assumed away.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use loopctl_control::Controller;
//! use loopctl_types::{ControlInput, ParameterSet};
//!
//! let params = ParameterSet {
//!     kp: 2.0,
//!     ki: 0.5,
//!     kd: 0.1,
//!     derivative_filter_time: 0.0,
//!     ..ParameterSet::default()
//! };
//! let mut controller = Controller::new(params).unwrap();
//!
//! let t0 = Instant::now();
//! controller.start(t0);
//! let out = controller
//!     .execute(&ControlInput::auto(50.0, 40.0, t0 + Duration::from_secs(1)))
//!     .unwrap();
//! assert!((out.output - 26.0).abs() < 1e-9);
//! ```

use std::time::Instant;

use loopctl_types::{
    ControlError, ControlInput, ControlOutput, ControllerStatus, ParameterSet, Statistics,
};
use tracing::{info, warn};

use crate::mode::ModeManager;
use crate::state::ControllerState;

/// A single control loop instance.
#[derive(Debug, Clone)]
pub struct Controller {
    manager: ModeManager,
    status: ControllerStatus,
    last_timestamp: Option<Instant>,
    last_process_variable: f64,
}

impl Controller {
    /// Build a controller in [`ControllerStatus::Initialized`].
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Configuration`] for an invalid `params`.
    pub fn new(params: ParameterSet) -> Result<Self, ControlError> {
        let manager = ModeManager::new(params)?;
        info!(
            kp = manager.params().kp,
            ki = manager.params().ki,
            kd = manager.params().kd,
            gain_schedule = manager.scheduler().is_active(),
            "controller initialized"
        );
        Ok(Self {
            manager,
            status: ControllerStatus::Initialized,
            last_timestamp: None,
            last_process_variable: f64::NAN,
        })
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    /// Active configuration.
    pub fn params(&self) -> &ParameterSet {
        self.manager.params()
    }

    /// Last committed cycle state.
    pub fn state(&self) -> &ControllerState {
        self.manager.state()
    }

    /// Begin accepting cycles.  `now` is the reference point for the first
    /// cycle's elapsed time.
    pub fn start(&mut self, now: Instant) {
        self.status = ControllerStatus::Running;
        self.last_timestamp = Some(now);
        info!("controller started");
    }

    /// Stop accepting cycles.  State is kept; a later [`start`](Self::start)
    /// resumes from it.
    pub fn stop(&mut self) {
        self.status = ControllerStatus::Stopped;
        let state = self.manager.state();
        info!(
            integral_saturations = state.integral_saturation_count,
            rate_limits = state.rate_limit_count,
            executions = state.execution_count,
            "controller stopped"
        );
    }

    /// Run one cycle, measuring `dt` from the previous cycle's timestamp.
    ///
    /// A timestamp that does not advance yields a degenerate cycle with
    /// `dt = 0`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NotRunning`] unless the controller is running.
    pub fn execute(&mut self, input: &ControlInput) -> Result<ControlOutput, ControlError> {
        self.ensure_running()?;
        let dt = match self.last_timestamp {
            Some(prev) if input.now > prev => input.now.duration_since(prev).as_secs_f64(),
            Some(_) => {
                warn!("timestamp did not advance since previous cycle");
                0.0
            }
            None => 0.0,
        };
        Ok(self.run(input, dt))
    }

    /// Run one cycle with an elapsed time measured by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NotRunning`] unless the controller is running.
    pub fn step(&mut self, input: &ControlInput, dt: f64) -> Result<ControlOutput, ControlError> {
        self.ensure_running()?;
        Ok(self.run(input, dt))
    }

    /// Clear dynamic state and counters, keeping the configuration and
    /// lifecycle status.
    pub fn reset(&mut self) {
        self.manager.reset();
        info!("controller reset");
    }

    /// Swap in a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Configuration`] and keeps the old
    /// configuration when `params` is invalid.
    pub fn reconfigure(&mut self, params: ParameterSet) -> Result<(), ControlError> {
        self.manager.reconfigure(params)?;
        info!("controller reconfigured");
        Ok(())
    }

    /// Effective gains at the last seen process variable plus accumulated
    /// counters.
    pub fn statistics(&self) -> Statistics {
        let gains = self.manager.effective_gains(self.last_process_variable);
        let state = self.manager.state();
        Statistics {
            effective_kp: gains.kp,
            effective_ki: gains.ki,
            effective_kd: gains.kd,
            integral_term: gains.ki * state.pid.integral_accumulator,
            derivative_term: gains.kd * state.pid.previous_filtered_derivative,
            filtered_derivative: state.pid.previous_filtered_derivative,
            integral_saturation_count: state.integral_saturation_count,
            rate_limit_count: state.rate_limit_count,
            execution_count: state.execution_count,
            gain_schedule_active: self.manager.scheduler().is_active(),
            mode: state.mode,
        }
    }

    fn ensure_running(&self) -> Result<(), ControlError> {
        if self.status == ControllerStatus::Running {
            Ok(())
        } else {
            Err(ControlError::NotRunning {
                status: self.status,
            })
        }
    }

    fn run(&mut self, input: &ControlInput, dt: f64) -> ControlOutput {
        let out = self.manager.cycle(input, dt);
        self.last_timestamp = Some(input.now);
        if input.process_variable.is_finite() {
            self.last_process_variable = input.process_variable;
        }
        out
    }
}
