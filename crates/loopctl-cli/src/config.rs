//! Configuration file – reads/writes `~/.loopctl/config.toml` or an explicit
//! path.
//!
//! ```toml
//! [controller]
//! kp = 2.0
//! ki = 0.5
//! kd = 0.1
//! output_rate_limit = 10.0
//!
//! [simulation]
//! cycles = 600
//! time_constant = 20.0
//! setpoint_steps = [{ at = 0.0, value = 75.0 }]
//! ```

use loopctl_types::{ControlError, ParameterSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A setpoint change applied at simulation time `at` (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetpointStep {
    pub at: f64,
    pub value: f64,
}

/// Interval during which the simulated operator holds the loop in manual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualWindow {
    pub from: f64,
    pub until: f64,
    pub output: f64,
}

/// Process model and scenario for `loopctl simulate` / `loopctl run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_cycles")]
    pub cycles: usize,

    #[serde(default = "default_process_gain")]
    pub process_gain: f64,

    /// Process time constant in seconds.
    #[serde(default = "default_time_constant")]
    pub time_constant: f64,

    /// Transport delay in seconds.
    #[serde(default)]
    pub dead_time: f64,

    /// Process value with zero controller output.
    #[serde(default)]
    pub ambient: f64,

    #[serde(default = "default_setpoint_steps")]
    pub setpoint_steps: Vec<SetpointStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<ManualWindow>,
}

fn default_cycles() -> usize {
    300
}
fn default_process_gain() -> f64 {
    1.0
}
fn default_time_constant() -> f64 {
    10.0
}
fn default_setpoint_steps() -> Vec<SetpointStep> {
    vec![SetpointStep {
        at: 0.0,
        value: 50.0,
    }]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            process_gain: default_process_gain(),
            time_constant: default_time_constant(),
            dead_time: 0.0,
            ambient: 0.0,
            setpoint_steps: default_setpoint_steps(),
            manual: None,
        }
    }
}

impl SimulationConfig {
    /// Setpoint in force at time `t`: the last step whose `at <= t`, or the
    /// first step's value before any step applies.
    pub fn setpoint_at(&self, t: f64) -> f64 {
        self.setpoint_steps
            .iter()
            .rev()
            .find(|s| s.at <= t)
            .or_else(|| self.setpoint_steps.first())
            .map_or(0.0, |s| s.value)
    }

    /// The manual output at time `t`, if the operator holds the loop then.
    pub fn manual_at(&self, t: f64) -> Option<f64> {
        self.manual
            .filter(|w| t >= w.from && t < w.until)
            .map(|w| w.output)
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ParameterSet,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Validate the controller section.
    pub fn validate(&self) -> Result<(), ControlError> {
        self.controller.validate()?;
        Ok(())
    }
}

/// Return the path to `~/.loopctl/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".loopctl").join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `LOOPCTL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LOOPCTL_KP` | `controller.kp` |
/// | `LOOPCTL_KI` | `controller.ki` |
/// | `LOOPCTL_KD` | `controller.kd` |
/// | `LOOPCTL_SAMPLE_TIME` | `controller.sample_time` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    let overrides: [(&str, &mut f64); 4] = [
        ("LOOPCTL_KP", &mut cfg.controller.kp),
        ("LOOPCTL_KI", &mut cfg.controller.ki),
        ("LOOPCTL_KD", &mut cfg.controller.kd),
        ("LOOPCTL_SAMPLE_TIME", &mut cfg.controller.sample_time),
    ];
    for (var, field) in overrides {
        if let Ok(v) = std::env::var(var)
            && let Ok(value) = v.trim().parse::<f64>()
        {
            *field = value;
        }
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
