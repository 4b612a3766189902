//! `loopctl-control` – closed-loop PID control core.
//!
//! A synchronous control cycle built from five cooperating
//! pieces:
//!
//! - [`gain_schedule`] – [`GainScheduler`][gain_schedule::GainScheduler]:
//!   interpolates gain multipliers from the current process variable.
//! - [`derivative_filter`] – first-order low-pass on the raw derivative.
//! - [`pid`] – [`PidCore`][pid::PidCore]: proportional, integral, and filtered
//!   derivative terms with back-calculation anti-windup.
//! - [`limiter`] – [`OutputLimiter`][limiter::OutputLimiter]: range clamp
//!   followed by rate limiting.
//! - [`mode`] – [`ModeManager`][mode::ModeManager]: manual pass-through,
//!   automatic computation, and bumpless manual → auto transfer.
//!
//! [`Controller`] wraps the mode manager with lifecycle status and elapsed
//! time measurement; [`sim`] provides a process model for closed-loop tests.

pub mod controller;
pub mod derivative_filter;
pub mod gain_schedule;
pub mod limiter;
pub mod mode;
pub mod pid;
pub mod sim;
pub mod state;

pub use controller::Controller;
pub use gain_schedule::{GainMultipliers, GainScheduler};
pub use limiter::OutputLimiter;
pub use mode::ModeManager;
pub use pid::{Gains, PidCore, PidState};
pub use state::ControllerState;
