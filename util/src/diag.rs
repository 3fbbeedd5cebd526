//! Diagnostics observations
//!
//! Components expose their internals as named scalars. What is done with
//! them (dashboards, archives) is up to whoever samples them.

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A component which can publish named scalar observations.
pub trait Observable {
    /// Get the current set of observations as `(name, value)` pairs.
    fn observations(&self) -> Vec<(&'static str, f64)>;

    /// Get a single observation by name.
    fn observation(&self, name: &str) -> Option<f64> {
        self.observations()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}
