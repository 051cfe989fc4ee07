//! Numeric helpers centralizing currency rounding and safe casts.

use num_traits::cast::cast;

/// Round a currency amount to two decimals, returning 0.0 for non-finite
/// values.
#[must_use]
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Ratio of two counts as f64, returning 0.0 for an empty denominator.
#[must_use]
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    usize_to_f64(numerator) / usize_to_f64(denominator)
}

/// Convert u32 to f64 without truncation concerns.
#[must_use]
pub fn u32_to_f64(value: u32) -> f64 {
    f64::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_truncates_to_cents() {
        assert!((round2(10.625) - 10.63).abs() < f64::EPSILON);
        assert!((round2(1.004) - 1.0).abs() < f64::EPSILON);
        assert!((round2(f64::NAN) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_handles_empty_denominator() {
        assert!((ratio(3, 0) - 0.0).abs() < f64::EPSILON);
        assert!((ratio(1, 4) - 0.25).abs() < f64::EPSILON);
    }
}
