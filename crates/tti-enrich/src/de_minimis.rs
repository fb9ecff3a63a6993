//! De minimis threshold advisories.
//!
//! A stateless lookup of per-destination duty-free thresholds, keyed by
//! (destination, origin). Strictly informational: the advisory is
//! attached to every enrichment result and never affects the duty
//! calculation. Thresholds reflect the October 2025 policy landscape;
//! the US elimination is permanent enough to hard-code, the rest is
//! subject to the usual treaty churn.

use tti_core::{normalize_country_code, DeMinimisInfo};

/// Advisory thresholds for a destination/origin pair.
pub fn de_minimis_info(destination_country: &str, origin_country: &str) -> DeMinimisInfo {
    let destination = normalize_country_code(destination_country);
    let origin = normalize_country_code(origin_country);

    match destination.as_str() {
        "US" => DeMinimisInfo {
            destination,
            origin,
            threshold: 0.0,
            currency: "USD".to_string(),
            tax_threshold: None,
            vat_threshold: None,
            applicable: false,
            note: "USA eliminated all de minimis (Aug 2025) — all shipments incur duties"
                .to_string(),
            policy_change: Some(
                "Previously $800. Eliminated for China/HK May 2, 2025; globally August 29, 2025"
                    .to_string(),
            ),
        },
        "CA" => {
            let usmca_origin = origin == "US" || origin == "MX";
            DeMinimisInfo {
                destination,
                origin,
                threshold: if usmca_origin { 150.0 } else { 20.0 },
                currency: "CAD".to_string(),
                tax_threshold: usmca_origin.then_some(40.0),
                vat_threshold: None,
                applicable: true,
                note: if usmca_origin {
                    "USMCA: CAD $150 duty-free / CAD $40 tax-free from USA/Mexico under CUSMA"
                        .to_string()
                } else {
                    "CAD $20 from non-USMCA countries — consider USMCA sourcing for the CAD $150 threshold"
                        .to_string()
                },
                policy_change: None,
            }
        }
        "MX" => {
            let usmca_origin = origin == "US" || origin == "CA";
            DeMinimisInfo {
                destination,
                origin,
                threshold: if usmca_origin { 117.0 } else { 0.0 },
                currency: "USD".to_string(),
                tax_threshold: None,
                vat_threshold: usmca_origin.then_some(50.0),
                applicable: usmca_origin,
                note: if usmca_origin {
                    "USD $117 duty-free under USMCA (VAT applies above $50)".to_string()
                } else {
                    "19% global tax rate applies — no de minimis for non-USMCA goods".to_string()
                },
                policy_change: (!usmca_origin)
                    .then(|| "General $50 threshold abolished December 30, 2024".to_string()),
            }
        }
        _ => DeMinimisInfo {
            destination,
            origin,
            threshold: 0.0,
            currency: "USD".to_string(),
            tax_threshold: None,
            vat_threshold: None,
            applicable: false,
            note: "No de minimis data available for this destination".to_string(),
            policy_change: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_destination_is_eliminated_for_every_origin() {
        for origin in ["CN", "MX", "CA", "DE"] {
            let info = de_minimis_info("US", origin);
            assert_eq!(info.threshold, 0.0);
            assert!(!info.applicable);
            assert!(info.policy_change.is_some());
        }
    }

    #[test]
    fn canada_splits_on_usmca_origin() {
        let usmca = de_minimis_info("CA", "Mexico");
        assert_eq!(usmca.threshold, 150.0);
        assert_eq!(usmca.tax_threshold, Some(40.0));
        assert_eq!(usmca.currency, "CAD");

        let other = de_minimis_info("CA", "CN");
        assert_eq!(other.threshold, 20.0);
        assert_eq!(other.tax_threshold, None);
        assert!(other.applicable);
    }

    #[test]
    fn mexico_only_applies_to_us_and_canada_origins() {
        let usmca = de_minimis_info("MX", "US");
        assert_eq!(usmca.threshold, 117.0);
        assert_eq!(usmca.vat_threshold, Some(50.0));
        assert!(usmca.applicable);

        let other = de_minimis_info("MX", "CN");
        assert_eq!(other.threshold, 0.0);
        assert!(!other.applicable);
        assert!(other.policy_change.is_some());
    }

    #[test]
    fn unknown_destination_gets_a_neutral_advisory() {
        let info = de_minimis_info("DE", "CN");
        assert_eq!(info.threshold, 0.0);
        assert!(!info.applicable);
        assert!(info.note.contains("No de minimis data"));
    }
}
