//! `loopctl-cli` – command line front end for the loopctl controller.
//!
//! The binary stands in for a host runtime.  It:
//!
//! 1. Loads a controller configuration from `--config <file>` or
//!    `~/.loopctl/config.toml`, applying `LOOPCTL_*` overrides.
//! 2. Validates it (`validate`), prints its JSON schema (`schema`), or writes
//!    a starter file (`init`).
//! 3. Closes the loop around a simulated first-order process, either as fast
//!    as possible (`simulate`) or paced at `sample_time` (`run`).
//! 4. Intercepts **Ctrl-C** during `run` to stop the loop and log the
//!    controller statistics.

mod config;
mod simulate;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use loopctl_types::{ControlMode, CycleStatus, ParameterSet};
use tracing::{info, warn};

use crate::config::Config;
use crate::simulate::SimRow;

#[derive(Parser)]
#[command(name = "loopctl", version, about = "PID loop controller with anti-windup, gain scheduling and bumpless transfer")]
struct Cli {
    /// Configuration file (defaults to ~/.loopctl/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the controller configuration and report the first problem.
    Validate,
    /// Print the JSON schema of the controller parameters.
    Schema,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Run the simulated loop as fast as possible.
    Simulate {
        /// Override the configured cycle count.
        #[arg(long)]
        cycles: Option<usize>,
        /// Emit one JSON object per cycle instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run the simulated loop in real time until done or Ctrl-C.
    Run {
        #[arg(long)]
        cycles: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); LOOPCTL_LOG_FORMAT=json switches to
    // newline-delimited JSON.  Logs go to stderr so stdout stays parseable.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("LOOPCTL_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::config_path);

    match cli.command {
        Command::Schema => print_schema(),
        Command::Init { force } => init_config(&path, force),
        Command::Validate => with_config(&path, |cfg| {
            println!(
                "  {} {} is valid",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            print_parameters(&cfg.controller);
            ExitCode::SUCCESS
        }),
        Command::Simulate { cycles, json } => with_config(&path, |cfg| {
            match simulate::simulate(&cfg, cycles) {
                Ok(rows) => {
                    if !json {
                        print_header();
                    }
                    for row in &rows {
                        print_row(row, json);
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!("{}: {}", "Simulation failed".red(), e);
                    ExitCode::FAILURE
                }
            }
        }),
        Command::Run { cycles, json } => with_config(&path, |cfg| run(&cfg, cycles, json)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn with_config(path: &Path, f: impl FnOnce(Config) -> ExitCode) -> ExitCode {
    match config::load_from(path) {
        Ok(Some(cfg)) => match cfg.validate() {
            Ok(()) => f(cfg),
            Err(e) => {
                println!("{}: {}", "Invalid configuration".red(), e);
                ExitCode::FAILURE
            }
        },
        Ok(None) => {
            println!(
                "{}: no configuration at {}. Run `{}` to create one.",
                "Config error".red(),
                path.display(),
                "loopctl init".bold()
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_config(path: &Path, force: bool) -> ExitCode {
    if path.exists() && !force {
        println!(
            "{}: {} already exists (use --force to overwrite)",
            "Refusing to overwrite".yellow(),
            path.display()
        );
        return ExitCode::FAILURE;
    }
    match config::save_to(&Config::default(), path) {
        Ok(()) => {
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_schema() -> ExitCode {
    let schema = schemars::schema_for!(ParameterSet);
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => {
            println!("{s}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Schema error".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: &Config, cycles: Option<usize>, json: bool) -> ExitCode {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop will run to completion");
    }

    if !json {
        print_header();
    }
    match simulate::run_realtime(cfg, cycles, shutdown.clone(), |row| print_row(row, json)) {
        Ok(done) => {
            if shutdown.load(Ordering::SeqCst) {
                println!("{}", "⚠  Ctrl-C received – loop stopped.".yellow().bold());
            }
            info!(cycles = done, "run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Run failed".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_parameters(p: &ParameterSet) {
    println!("    gains        kp={} ki={} kd={}", p.kp, p.ki, p.kd);
    println!("    output       [{}, {}]", p.output_min, p.output_max);
    println!("    sample_time  {} s", p.sample_time);
    println!("    d-filter     {} s", p.derivative_filter_time);
    match p.output_rate_limit {
        Some(rate) => println!("    rate limit   {rate} /s"),
        None => println!("    rate limit   {}", "none".dimmed()),
    }
    if p.gain_schedule_enabled {
        println!("    schedule     {} point(s)", p.gain_schedule_points.len());
    } else {
        println!("    schedule     {}", "disabled".dimmed());
    }
}

fn print_header() {
    println!(
        "{}",
        format!(
            "{:>6} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}  {}",
            "cycle", "t[s]", "sp", "pv", "out", "P", "I", "D", "mode"
        )
        .bold()
    );
}

fn print_row(row: &SimRow, json: bool) {
    if json {
        match serde_json::to_string(row) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialize row"),
        }
        return;
    }
    let c = &row.control;
    let mode = match c.mode {
        ControlMode::Manual => "MAN".yellow(),
        ControlMode::Auto => "AUTO".green(),
    };
    let flag = match c.status {
        CycleStatus::Normal => "".normal(),
        CycleStatus::Degenerate => " degenerate".dimmed(),
        CycleStatus::Faulted => " FAULT".red().bold(),
    };
    println!(
        "{:>6} {:>8.2} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3}  {}{}",
        row.cycle,
        row.time,
        row.setpoint,
        row.process_variable,
        c.output,
        c.proportional,
        c.integral_term,
        c.derivative_term,
        mode,
        flag
    );
}
