//! Command line argument parsing for amdfan

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default location of the daemon's pidfile
pub const DEFAULT_PIDFILE: &str = "/var/run/amdfan.pid";

/// AMD GPU fan controller
///
/// Applies a temperature to fan speed curve to every compatible card.
#[derive(Parser, Debug)]
#[command(name = "amdfan")]
#[command(about = "Fan curve controller for AMD GPUs")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file, truncated on start
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller
    Daemon {
        /// File descriptor to report readiness on
        #[arg(long, value_parser = clap::value_parser!(i32).range(0..))]
        notification_fd: Option<i32>,

        /// Pidfile location
        #[arg(long, default_value = DEFAULT_PIDFILE)]
        pidfile: PathBuf,

        /// Configuration file, searched in the default locations when absent
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// View the current temperature and speed
    Monitor {
        /// Updates per second
        #[arg(long, default_value_t = 5)]
        fps: u32,

        /// Print and exit
        #[arg(long)]
        single_run: bool,
    },
    /// Manually override the fan speed
    Set {
        /// Card to override
        #[arg(long)]
        card: Option<String>,

        /// Speed in percent [1..100] or 'auto'
        #[arg(long, default_value = "auto")]
        speed: SpeedArg,
    },
    /// Print convenient defaults
    PrintDefault {
        /// Print the default configuration
        #[arg(long)]
        configuration: bool,

        /// Print a service file for the given init system
        #[arg(long, value_parser = ["systemd"])]
        service: Option<String>,
    },
}

/// Manual speed override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedArg {
    /// Hand control back to the driver
    Auto,
    Percent(i32),
}

impl std::str::FromStr for SpeedArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(SpeedArg::Auto);
        }
        match s.parse::<i32>() {
            Ok(pct) if (1..=100).contains(&pct) => Ok(SpeedArg::Percent(pct)),
            _ => Err(format!("expected a speed in [1..100] or 'auto', got '{}'", s)),
        }
    }
}
