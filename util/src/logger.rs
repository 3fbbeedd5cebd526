//! Robot logging
//!
//! Every line carries the session time, the control cycle it was emitted in
//! and the module that emitted it:
//!
//! ```text
//! [   12.345678 #000617 WRN drive_straight] Ramp distance is zero
//! ```
//!
//! Lines emitted outside the control loop (start up, shut down) show `#------`
//! in place of the cycle. The terminal copy of the log is coloured by level,
//! the file copy is plain text.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::Colorize;
use log::{info, Level, Record};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Number of the control cycle currently running, zero outside the loop.
static CURRENT_CYCLE: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The robot must log at least `INFO` lines, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Cannot open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger is already installed: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the robot logger, writing to stdout and the session log file.
///
/// `min_level` may not hide `INFO` lines. Call once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let terminal = fern::Dispatch::new()
        .format(|out, message, record| {
            let line = LogLine::new(record, current_cycle());
            out.finish(format_args!(
                "{} {}",
                line.header().color(level_colour(record.level())),
                message
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            let line = LogLine::new(record, current_cycle());
            out.finish(format_args!("{} {}", line.header(), message))
        })
        .chain(log_file);

    fern::Dispatch::new()
        .level(min_level)
        .chain(terminal)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    let epoch = session::get_epoch()
        .map(|e| e.to_rfc3339())
        .unwrap_or_else(|| String::from("unknown"));
    info!(
        "Robot log opened at {} ({:?}), writing to {}",
        epoch,
        min_level,
        session.log_file_path.display()
    );

    Ok(())
}

/// Tag log lines from now on with the given control cycle number.
pub fn set_cycle(cycle: u64) {
    CURRENT_CYCLE.store(cycle, Ordering::Relaxed);
}

/// Mark log lines from now on as emitted outside the control loop.
pub fn clear_cycle() {
    CURRENT_CYCLE.store(0, Ordering::Relaxed);
}

/// The control cycle log lines are currently tagged with, if any.
pub fn current_cycle() -> Option<u64> {
    match CURRENT_CYCLE.load(Ordering::Relaxed) {
        0 => None,
        c => Some(c),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE
// ---------------------------------------------------------------------------

/// The bracketed prefix of a log line.
struct LogLine<'a> {
    elapsed_s: f64,
    cycle: Option<u64>,
    level: Level,
    source: &'a str,
}

impl<'a> LogLine<'a> {
    fn new(record: &'a Record, cycle: Option<u64>) -> Self {
        Self {
            elapsed_s: session::get_elapsed_seconds(),
            cycle,
            level: record.level(),
            source: short_source(record.target()),
        }
    }

    fn header(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LogLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:12.6} ", self.elapsed_s)?;
        match self.cycle {
            Some(c) => write!(f, "#{:06}", c)?,
            None => write!(f, "#------")?,
        }
        write!(f, " {} {}]", level_tag(self.level), self.source)
    }
}

/// Last path segment of a log target, `robot_lib::commands::drive_straight`
/// becomes `drive_straight`.
fn short_source(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info => "INF",
        Level::Warn => "WRN",
        Level::Error => "ERR",
    }
}

fn level_colour(level: Level) -> colored::Color {
    match level {
        Level::Trace | Level::Debug => colored::Color::BrightBlack,
        Level::Info => colored::Color::White,
        Level::Warn => colored::Color::Yellow,
        Level::Error => colored::Color::Red,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn line(cycle: Option<u64>, level: Level, source: &str) -> String {
        LogLine {
            elapsed_s: 1.5,
            cycle,
            level,
            source: short_source(source),
        }
        .header()
    }

    #[test]
    fn test_header_carries_cycle_and_module() {
        assert_eq!(
            line(Some(617), Level::Warn, "robot_lib::commands::drive_straight"),
            "[    1.500000 #000617 WRN drive_straight]"
        );
    }

    #[test]
    fn test_header_outside_loop() {
        assert_eq!(
            line(None, Level::Info, "robot_exec"),
            "[    1.500000 #------ INF robot_exec]"
        );
    }

    #[test]
    fn test_cycle_tag() {
        set_cycle(42);
        assert_eq!(current_cycle(), Some(42));
        clear_cycle();
        assert_eq!(current_cycle(), None);
    }
}
