//! Pure aggregation helpers over normalized device arrays.
//!
//! Empty inputs yield `None` (the derived field is omitted), never `NaN`.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Minimum over an iterator of floats, `None` when empty.
///
/// Used for bottleneck selection, e.g. the slowest module clock in a bank
/// of memory devices.
pub fn min_f64<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(m) => Some(m.min(v)),
    })
}

/// Minimum over an iterator of integers, `None` when empty.
pub fn min_u64<I: IntoIterator<Item = u64>>(values: I) -> Option<u64> {
    values.into_iter().min()
}

/// A utilization ratio defined as 0 when the denominator is 0 and clamped
/// to `[0.0, 1.0]`.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}
