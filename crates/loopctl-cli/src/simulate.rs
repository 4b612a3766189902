//! Closed-loop scenarios against the [`FirstOrderProcess`] model.
//!
//! [`simulate`] runs a scenario as fast as possible with synthetic
//! timestamps spaced `sample_time` apart; [`run_realtime`] paces the same loop
//! against the wall clock until the cycle budget is spent or the shutdown
//! flag is raised.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use loopctl_control::Controller;
use loopctl_control::sim::FirstOrderProcess;
use loopctl_types::{ControlError, ControlInput, ControlOutput};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, SimulationConfig};

/// Failure of a simulated or real-time run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("sample_time {0} s cannot be represented as a loop period")]
    SamplePeriod(f64),

    #[error("clock overflow scheduling cycle {0}")]
    ClockOverflow(usize),
}

fn loop_period(sample_time: f64) -> Result<Duration, SimError> {
    Duration::try_from_secs_f64(sample_time).map_err(|_| SimError::SamplePeriod(sample_time))
}

/// `start + period × cycle`, or [`SimError::ClockOverflow`].
fn cycle_instant(start: Instant, period: Duration, cycle: usize) -> Result<Instant, SimError> {
    u32::try_from(cycle)
        .ok()
        .and_then(|n| period.checked_mul(n))
        .and_then(|offset| start.checked_add(offset))
        .ok_or(SimError::ClockOverflow(cycle))
}

/// One row of simulation output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SimRow {
    pub cycle: usize,
    /// Seconds since the start of the run.
    pub time: f64,
    pub setpoint: f64,
    pub process_variable: f64,
    #[serde(flatten)]
    pub control: ControlOutput,
}

struct Scenario {
    controller: Controller,
    process: FirstOrderProcess,
    sim: SimulationConfig,
    start: Instant,
}

impl Scenario {
    fn new(cfg: &Config, start: Instant) -> Result<Self, ControlError> {
        let mut controller = Controller::new(cfg.controller.clone())?;
        controller.start(start);
        let sim = cfg.simulation.clone();
        let process =
            FirstOrderProcess::new(sim.process_gain, sim.time_constant, sim.dead_time, sim.ambient);
        Ok(Self {
            controller,
            process,
            sim,
            start,
        })
    }

    fn cycle(&mut self, cycle: usize, now: Instant) -> Result<SimRow, ControlError> {
        let time = now.duration_since(self.start).as_secs_f64();
        let setpoint = self.sim.setpoint_at(time);
        let pv = self.process.value();
        let input = match self.sim.manual_at(time) {
            Some(output) => ControlInput::manual(setpoint, pv, output, now),
            None => ControlInput::auto(setpoint, pv, now),
        };
        let control = self.controller.execute(&input)?;
        self.process.advance(control.output, control.dt);
        Ok(SimRow {
            cycle,
            time,
            setpoint,
            process_variable: pv,
            control,
        })
    }
}

/// Run the configured scenario with synthetic time.  `cycles` overrides the
/// configured cycle count.
pub fn simulate(cfg: &Config, cycles: Option<usize>) -> Result<Vec<SimRow>, SimError> {
    let start = Instant::now();
    let mut scenario = Scenario::new(cfg, start)?;
    let period = loop_period(cfg.controller.sample_time)?;
    let cycles = cycles.unwrap_or(cfg.simulation.cycles);

    let mut rows = Vec::with_capacity(cycles);
    for cycle in 1..=cycles {
        let now = cycle_instant(start, period, cycle)?;
        rows.push(scenario.cycle(cycle, now)?);
    }
    scenario.controller.stop();
    Ok(rows)
}

/// Run the scenario in real time, calling `on_row` after each cycle.
///
/// Returns the number of completed cycles.
pub fn run_realtime(
    cfg: &Config,
    cycles: Option<usize>,
    shutdown: Arc<AtomicBool>,
    mut on_row: impl FnMut(&SimRow),
) -> Result<usize, SimError> {
    let start = Instant::now();
    let mut scenario = Scenario::new(cfg, start)?;
    let period = loop_period(cfg.controller.sample_time)?;
    let limit = cycles.unwrap_or(cfg.simulation.cycles);

    let mut completed = 0;
    let mut deadline = cycle_instant(start, period, 1)?;
    while completed < limit && !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < deadline {
            std::thread::sleep(deadline - now);
        }
        completed += 1;
        let row = scenario.cycle(completed, Instant::now())?;
        on_row(&row);
        deadline = deadline
            .checked_add(period)
            .ok_or(SimError::ClockOverflow(completed + 1))?;
    }
    scenario.controller.stop();
    Ok(completed)
}
