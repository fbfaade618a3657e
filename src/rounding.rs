use serde::{Deserialize, Serialize};

/// How an uncertainty is cut to its reported significant digits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Conventional rounding, halves away from zero
    #[serde(alias = "round_up")]
    HalfUp,
    /// Truncate when the discarded part is at most 5 % of the value, otherwise round up
    #[default]
    #[serde(alias = "5_percent")]
    FivePercent,
}

/// Round `value` to `significant_digits` significant digits
///
/// Zero and non-finite values are returned unchanged; fewer than one digit is treated as one.
///
/// ```
/// use uncertainty_budget::rounding::{round_uncertainty, RoundingMode};
///
/// assert_eq!(round_uncertainty(288.6, 2, RoundingMode::HalfUp), 290.0);
/// assert_eq!(round_uncertainty(288.6, 2, RoundingMode::FivePercent), 280.0);
/// ```
pub fn round_uncertainty(value: f64, significant_digits: u32, mode: RoundingMode) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let digits = i32::try_from(significant_digits.max(1)).unwrap_or(i32::MAX);
    let magnitude = value.abs();

    #[allow(clippy::cast_possible_truncation)]
    let mut shift = magnitude.log10().floor() as i32 - (digits - 1);
    let mut scaled = shift_down(magnitude, shift);
    // `log10` may land one decade off near exact powers of ten
    if scaled >= 10f64.powi(digits) {
        shift += 1;
        scaled = shift_down(magnitude, shift);
    } else if scaled < 10f64.powi(digits - 1) {
        shift -= 1;
        scaled = shift_down(magnitude, shift);
    }

    let rounded = match mode {
        RoundingMode::HalfUp => scaled.round(),
        RoundingMode::FivePercent => {
            let truncated = scaled.floor();
            if (scaled - truncated) / scaled <= 0.05 {
                truncated
            } else {
                truncated + 1.0
            }
        }
    };

    shift_up(rounded, shift).copysign(value)
}

/// `value / 10^shift`, with the representation error of the division removed
fn shift_down(value: f64, shift: i32) -> f64 {
    let scaled = if shift >= 0 {
        value / 10f64.powi(shift)
    } else {
        value * 10f64.powi(-shift)
    };
    (scaled * 1e9).round() / 1e9
}

fn shift_up(value: f64, shift: i32) -> f64 {
    if shift >= 0 {
        value * 10f64.powi(shift)
    } else {
        value / 10f64.powi(-shift)
    }
}
