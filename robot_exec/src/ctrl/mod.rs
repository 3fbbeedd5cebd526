//! Control algorithm primitives

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod gains;
mod pid;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use gains::ProfileGains;
pub use pid::{PidController, PidTelemetry};
