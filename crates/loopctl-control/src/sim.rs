//! In-process process model for closed-loop testing without a plant.
//!
//! [`FirstOrderProcess`] is a first-order lag with optional transport delay:
//!
//! ```text
//! τ · dy/dt = K · u(t − θ) − (y − y₀)
//! ```
//!
//! integrated with forward Euler.  It is good enough to exercise a loop end to
//! end in CI and in `loopctl simulate`.
//!
//! # Example
//!
//! ```rust
//! use loopctl_control::sim::FirstOrderProcess;
//!
//! let mut process = FirstOrderProcess::new(2.0, 1.0, 0.0, 0.0);
//! for _ in 0..1000 {
//!     process.advance(10.0, 0.01);
//! }
//! assert!((process.value() - 20.0).abs() < 0.01);
//! ```

use std::collections::VecDeque;

/// First-order-plus-dead-time process.
#[derive(Debug, Clone)]
pub struct FirstOrderProcess {
    gain: f64,
    time_constant: f64,
    dead_time: f64,
    ambient: f64,
    value: f64,
    /// `(age, input)` pairs still in transit, oldest first.
    pipeline: VecDeque<(f64, f64)>,
    delayed_input: f64,
}

impl FirstOrderProcess {
    /// `time_constant` is floored at a tiny positive value; `dead_time` at 0.
    /// The process starts at rest at `ambient`.
    pub fn new(gain: f64, time_constant: f64, dead_time: f64, ambient: f64) -> Self {
        Self {
            gain,
            time_constant: time_constant.max(1e-9),
            dead_time: dead_time.max(0.0),
            ambient,
            value: ambient,
            pipeline: VecDeque::new(),
            delayed_input: 0.0,
        }
    }

    /// Current process variable.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply controller output `input` for `dt` seconds and return the new
    /// process variable.
    pub fn advance(&mut self, input: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return self.value;
        }
        self.pipeline.push_back((0.0, input));
        for entry in self.pipeline.iter_mut() {
            entry.0 += dt;
        }
        while let Some(&(age, delayed)) = self.pipeline.front() {
            if age + 1e-12 < self.dead_time {
                break;
            }
            self.delayed_input = delayed;
            self.pipeline.pop_front();
        }

        // Sub-step so large dt stays stable against small time constants.
        let steps = (dt / (self.time_constant * 0.1)).ceil().clamp(1.0, 1000.0) as usize;
        let h = dt / steps as f64;
        for _ in 0..steps {
            let target = self.ambient + self.gain * self.delayed_input;
            self.value += h / self.time_constant * (target - self.value);
        }
        self.value
    }
}
