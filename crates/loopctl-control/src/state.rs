//! [`ControllerState`] – everything a controller remembers between cycles.

use loopctl_types::{ControlMode, ParameterSet};

use crate::pid::PidState;

/// Mutable per-instance state.  Replaced as a whole at the end of each
/// committed cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub pid: PidState,
    /// Always within `[output_min, output_max]`.
    pub previous_accepted_output: f64,
    pub mode: ControlMode,
    pub integral_saturation_count: u64,
    pub rate_limit_count: u64,
    pub execution_count: u64,
}

impl ControllerState {
    /// Zeroed dynamics, the configured safe output, automatic mode.
    pub fn initial(params: &ParameterSet) -> Self {
        Self {
            pid: PidState::default(),
            previous_accepted_output: params.safe_output(),
            mode: ControlMode::Auto,
            integral_saturation_count: 0,
            rate_limit_count: 0,
            execution_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_uses_safe_output() {
        let params = ParameterSet {
            output_min: 10.0,
            ..ParameterSet::default()
        };
        let state = ControllerState::initial(&params);
        assert_eq!(state.previous_accepted_output, 10.0);
        assert_eq!(state.mode, ControlMode::Auto);
        assert_eq!(state.pid, PidState::default());
    }
}
