//! Sample statistics over pixel values.

/// Arithmetic mean. Returns `NaN` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of `data`, reordering it in place (quickselect).
///
/// Even-length input averages the two middle values.
pub fn median_mut(data: &mut [f64]) -> f64 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;
    let (left, upper, _) = data.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if len & 1 == 1 {
        return upper;
    }
    // Everything left of `mid` is <= upper; its maximum is the lower middle.
    let lower = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (lower + upper) * 0.5
}

/// Root-mean-square deviation of `values` about `center`.
#[inline]
pub fn rms_about(values: &[f64], center: f64) -> f64 {
    let sum_sq: f64 = values.iter().map(|&v| (v - center) * (v - center)).sum();
    (sum_sq / values.len() as f64).sqrt()
}
