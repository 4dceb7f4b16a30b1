//! Logging setup for the fan controller
//!
//! The binary installs a global `fern` dispatch. Core components never touch the
//! global logger directly: they receive a [`Logger`] handle, which forwards to the
//! global facade by default and can be pointed at any other [`log::Log`] sink.

use fern::Dispatch;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::{fmt, fs, path::Path, sync::Arc};

/// Target used for records emitted through a [`Logger`]
pub const TARGET: &str = "amdfan";

/// Map the `-v` count onto a level filter, honouring the `DEBUG` environment variable
pub fn level_for(verbosity: u8, debug_env: bool) -> LevelFilter {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if debug_env {
        level.max(LevelFilter::Debug)
    } else {
        level
    }
}

/// Setup logging with the specified verbosity level and an optional log file
pub fn setup(verbosity: u8, logfile: Option<&Path>) -> Result<(), fern::InitError> {
    let debug_env = std::env::var("DEBUG").map(|v| !v.is_empty()).unwrap_or(false);

    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level_for(verbosity, debug_env))
        .chain(std::io::stdout());

    if let Some(path) = logfile {
        // Old logs are dropped on every start
        fs::File::create(path)?;
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

/// Forwards to whatever logger is installed in the `log` facade
struct Global;

impl Log for Global {
    fn enabled(&self, metadata: &Metadata) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

/// Cheaply cloneable logging handle passed to the core components
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Log>,
}

impl Logger {
    /// Log into an arbitrary sink
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self { sink }
    }

    /// Log into the global `log` facade
    pub fn global() -> Self {
        Self::new(Arc::new(Global))
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(TARGET).build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink
            .log(&Record::builder().metadata(metadata).args(args).build());
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args)
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args)
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Logger")
    }
}
