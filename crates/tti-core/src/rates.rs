//! Rate normalization and plausibility validation.
//!
//! External sources report duty rates in two shapes: percentages
//! (`25`) and decimal fractions (`0.25`). Everything downstream of
//! this module works exclusively in decimal fractions, and composite
//! totals are always recomputed here rather than trusted from the
//! source.

/// Upper bound of the plausible policy-surcharge window (50%).
///
/// Surcharges above this have existed (the 100% List-4 escalations),
/// so out-of-range values are flagged for review rather than rejected.
pub const SURCHARGE_PLAUSIBLE_MAX: f64 = 0.50;

/// Largest magnitude read as an already-decimal fraction (200%).
///
/// Stacked policy actions have pushed real duty rates past 100%, so
/// the decimal band extends past 1: a normalized `1.5` (150%) must
/// survive re-normalization rather than collapse to `0.015`. Bare
/// numeric percentages below 2 are not seen in practice; sub-2%
/// duties arrive in decimal form or with an explicit `%` suffix.
pub const DECIMAL_FORM_MAX: f64 = 2.0;

/// Normalize a numeric rate to a decimal fraction.
///
/// Magnitudes above [`DECIMAL_FORM_MAX`] are read as percentage forms
/// and divided by 100 until they land inside the decimal band. Values
/// already inside the band pass through untouched, so every output is
/// a fixpoint and re-normalizing a cached row is a no-op. Non-finite
/// input fails closed to `0`.
pub fn normalize_rate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 0.0;
    }
    let mut rate = rate;
    while rate.abs() > DECIMAL_FORM_MAX {
        rate /= 100.0;
    }
    rate
}

/// Normalize a raw JSON value to a decimal-fraction rate.
///
/// Accepts numbers and numeric strings; an explicit `%` suffix is
/// always a percentage, with no band guessing, so `"1.3%"` reads as
/// `0.013`. Anything else (null, absent fields surfaced as
/// `Value::Null`, booleans, objects) fails closed to `0` with a log
/// line rather than an error — a malformed rate in one field must not
/// sink the whole breakdown.
pub fn normalize_raw(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => normalize_rate(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => match s.trim().strip_suffix('%') {
            Some(percent) => match percent.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => parsed / 100.0,
                _ => {
                    tracing::debug!(raw = %s, "non-numeric rate string, failing closed to 0");
                    0.0
                }
            },
            None => match s.trim().parse::<f64>() {
                Ok(parsed) => normalize_rate(parsed),
                Err(_) => {
                    tracing::debug!(raw = %s, "non-numeric rate string, failing closed to 0");
                    0.0
                }
            },
        },
        serde_json::Value::Null => 0.0,
        other => {
            tracing::debug!(raw = %other, "non-numeric rate value, failing closed to 0");
            0.0
        }
    }
}

/// Recompute the total duty rate from its layers.
///
/// Each operand is normalized independently before summing. Provider
/// responses carry their own `total_rate`, but that field is never
/// trusted — a source that mixes percentage and decimal forms within
/// one response would otherwise produce a silently wrong total.
pub fn total_rate(base_mfn_rate: f64, section_301: f64, section_232: f64) -> f64 {
    normalize_rate(base_mfn_rate) + normalize_rate(section_301) + normalize_rate(section_232)
}

/// Outcome of a surcharge plausibility check.
///
/// The rate is always carried through, valid or not: plausibility
/// informs confidence, it never drops a possibly-correct extreme rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SurchargeValidation {
    /// Whether the rate fell inside the plausible window.
    pub valid: bool,
    /// The (normalized) rate, returned regardless of validity.
    pub rate: f64,
    /// Human-readable warning when the rate is outside the window.
    pub warning: Option<String>,
}

/// Check a policy surcharge against the plausible `[0, 0.50]` window.
pub fn validate_surcharge(rate: f64) -> SurchargeValidation {
    let rate = normalize_rate(rate);
    if rate < 0.0 {
        SurchargeValidation {
            valid: false,
            rate,
            warning: Some(format!(
                "surcharge rate {rate:.4} is negative — manual review recommended"
            )),
        }
    } else if rate > SURCHARGE_PLAUSIBLE_MAX {
        SurchargeValidation {
            valid: false,
            rate,
            warning: Some(format!(
                "surcharge rate {:.1}% exceeds the plausible {:.0}% ceiling — manual review recommended",
                rate * 100.0,
                SURCHARGE_PLAUSIBLE_MAX * 100.0
            )),
        }
    } else {
        SurchargeValidation {
            valid: true,
            rate,
            warning: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Division by 100 is inexact for most decimals (2.7 / 100.0 is one
    // ulp off the literal 0.027), so rate comparisons use a tolerance.
    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn percentages_divide_by_100() {
        assert!(close(normalize_rate(25.0), 0.25));
        assert!(close(normalize_rate(2.7), 0.027));
        assert!(close(normalize_rate(100.0), 1.0));
    }

    #[test]
    fn decimals_pass_through() {
        assert_eq!(normalize_rate(0.25), 0.25);
        assert_eq!(normalize_rate(0.0), 0.0);
        assert_eq!(normalize_rate(1.0), 1.0);
        // Stacked >100% duties stay in the decimal band.
        assert_eq!(normalize_rate(1.5), 1.5);
    }

    #[test]
    fn rates_above_100_percent_survive_renormalization() {
        let once = normalize_rate(150.0);
        assert!(close(once, 1.5));
        assert_eq!(normalize_rate(once), once);
        // The cache-hit path re-normalizes stored rows via total_rate;
        // the round trip must agree with the fresh value.
        assert!(close(total_rate(once, 0.0, 0.0), once));

        let wild = normalize_rate(-4682.386642450183);
        assert_eq!(normalize_rate(wild), wild);
        assert!(wild.abs() <= DECIMAL_FORM_MAX);
    }

    #[test]
    fn non_finite_fails_closed() {
        assert_eq!(normalize_rate(f64::NAN), 0.0);
        assert_eq!(normalize_rate(f64::INFINITY), 0.0);
    }

    #[test]
    fn raw_values_handle_strings_and_junk() {
        assert_eq!(normalize_raw(&serde_json::json!(25)), 0.25);
        assert_eq!(normalize_raw(&serde_json::json!("25")), 0.25);
        assert_eq!(normalize_raw(&serde_json::json!("25%")), 0.25);
        assert_eq!(normalize_raw(&serde_json::json!("0.25")), 0.25);
        assert_eq!(normalize_raw(&serde_json::json!(null)), 0.0);
        assert_eq!(normalize_raw(&serde_json::json!("free")), 0.0);
        assert_eq!(normalize_raw(&serde_json::json!({"rate": 25})), 0.0);
    }

    #[test]
    fn explicit_percent_suffix_never_band_guesses() {
        assert!(close(normalize_raw(&serde_json::json!("1.3%")), 0.013));
        assert!(close(normalize_raw(&serde_json::json!("150%")), 1.5));
        assert_eq!(normalize_raw(&serde_json::json!("%")), 0.0);
    }

    #[test]
    fn total_is_sum_of_normalized_layers() {
        // Mixed representations in one call still sum correctly.
        let total = total_rate(2.7, 0.25, 0.0);
        assert!((total - 0.277).abs() < 1e-9);
    }

    #[test]
    fn surcharge_window_is_inclusive() {
        assert!(validate_surcharge(0.0).valid);
        assert!(validate_surcharge(0.25).valid);
        assert!(validate_surcharge(0.50).valid);
    }

    #[test]
    fn out_of_range_surcharge_keeps_rate_with_warning() {
        let v = validate_surcharge(1.0);
        assert!(!v.valid);
        assert_eq!(v.rate, 1.0);
        assert!(v.warning.as_deref().unwrap_or("").contains("exceeds"));

        let v = validate_surcharge(-0.05);
        assert!(!v.valid);
        assert_eq!(v.rate, -0.05);
        assert!(v.warning.is_some());
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(rate in -10_000.0f64..10_000.0) {
            let once = normalize_rate(rate);
            prop_assert_eq!(normalize_rate(once), once);
        }

        #[test]
        fn normalized_output_is_bounded(rate in -10_000.0f64..10_000.0) {
            prop_assert!(normalize_rate(rate).abs() <= DECIMAL_FORM_MAX);
        }

        #[test]
        fn total_matches_component_sum(
            base in 0.0f64..50.0,
            s301 in 0.0f64..50.0,
            s232 in 0.0f64..50.0,
        ) {
            let total = total_rate(base, s301, s232);
            let expected = normalize_rate(base) + normalize_rate(s301) + normalize_rate(s232);
            prop_assert!((total - expected).abs() < 1e-9);
        }
    }
}
