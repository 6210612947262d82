//! Pure numeric helpers shared by classification and metrics.
//!
//! Isolated from the rest of the engine because these are the only
//! computations §8's boundary-behavior tests pin down exactly
//! (no tolerance, no rounding beyond `floor`).

/// `floor(capacity * ratio)`, as an exact byte count.
pub fn ratio_to_bytes(capacity: u64, ratio: f64) -> u64 {
    (capacity as f64 * ratio).floor().max(0.0) as u64
}

/// Bytes a node is over the upper limit, clamped to zero.
///
/// Computed in `i128` because `ratioToBytes(capacity, util)` can be smaller
/// than `ratioToBytes(capacity, upperLimit)` in corner cases (the
/// subtraction would otherwise underflow a `u64`).
pub fn bytes_over_upper_limit(capacity: u64, utilization: f64, upper_limit: f64) -> u64 {
    let used = ratio_to_bytes(capacity, utilization) as i128;
    let allowed = ratio_to_bytes(capacity, upper_limit) as i128;
    (used - allowed).max(0) as u64
}
