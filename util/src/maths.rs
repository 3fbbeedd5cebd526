//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into `[min, max]`.
///
/// The bounds are applied literally and in order (upper, then lower), so an
/// inverted range (`min > max`) does not panic, it resolves to `min`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Limit a value to `[-limit, limit]`.
pub fn limit<T>(value: T, limit: T) -> T
where
    T: Float
{
    clamp(value, -limit, limit)
}

/// Returns true if `a` is within `epsilon` of `b`, inclusive.
pub fn epsilon_equals<T>(a: T, b: T, epsilon: T) -> bool
where
    T: Float
{
    (a - epsilon <= b) && (a + epsilon >= b)
}
