//! Wire types for the research providers and the normalized results
//! handed back to the enrichment router.

use serde::{Deserialize, Serialize};
use std::fmt;

use tti_core::{normalize_hs_code, normalize_raw, Confidence};

/// Which provider slot answered (or was attempted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Primary,
    Secondary,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Single-item lookup request body.
#[derive(Debug, Serialize)]
pub(crate) struct LookupRequest<'a> {
    pub hs_code: &'a str,
    pub origin_country: &'a str,
    pub destination_country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    /// Explicit applicability flag so the provider researches the
    /// surcharge layers rather than inferring from origin alone.
    pub section_301_applicable: bool,
}

/// One component within a batched lookup request.
#[derive(Debug, Serialize)]
pub(crate) struct BatchItem<'a> {
    pub index: usize,
    pub hs_code: &'a str,
    pub origin_country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

/// Batched lookup request body: one call covering many components.
#[derive(Debug, Serialize)]
pub(crate) struct BatchLookupRequest<'a> {
    pub destination_country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_description: Option<&'a str>,
    pub components: Vec<BatchItem<'a>>,
}

/// Raw provider rate breakdown. Rate fields are raw JSON values
/// because providers mix numeric and string representations; they are
/// normalized in [`RateBreakdownWire::normalize`], and the reported
/// `total_rate` is deliberately ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct RateBreakdownWire {
    pub hs_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_mfn_rate: serde_json::Value,
    #[serde(default)]
    pub section_301: serde_json::Value,
    #[serde(default)]
    pub section_232: serde_json::Value,
    #[serde(default)]
    pub usmca_rate: serde_json::Value,
    #[serde(default)]
    pub policy_adjustments: Vec<String>,
    #[serde(default)]
    pub confidence: Option<String>,
}

impl RateBreakdownWire {
    /// Normalize every rate layer and recompute the total locally.
    pub(crate) fn normalize(self, provider: ProviderKind) -> ResearchResult {
        let base_mfn_rate = normalize_raw(&self.base_mfn_rate);
        let section_301 = normalize_raw(&self.section_301);
        let section_232 = normalize_raw(&self.section_232);
        ResearchResult {
            hs_code: normalize_hs_code(&self.hs_code),
            hs_description: self.description,
            base_mfn_rate,
            section_301,
            section_232,
            usmca_rate: normalize_raw(&self.usmca_rate),
            total_rate: base_mfn_rate + section_301 + section_232,
            confidence: self
                .confidence
                .as_deref()
                .map(Confidence::from_label)
                .unwrap_or(Confidence::Medium),
            policy_adjustments: self.policy_adjustments,
            provider,
        }
    }
}

/// Batched response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponseWire {
    pub results: Vec<BatchResultWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResultWire {
    pub component_index: usize,
    #[serde(flatten)]
    pub breakdown: RateBreakdownWire,
}

/// A normalized research result: canonical decimal rates, locally
/// recomputed total, and provenance.
#[derive(Debug, Clone)]
pub struct ResearchResult {
    pub hs_code: String,
    pub hs_description: Option<String>,
    pub base_mfn_rate: f64,
    pub section_301: f64,
    pub section_232: f64,
    pub usmca_rate: f64,
    pub total_rate: f64,
    pub confidence: Confidence,
    pub policy_adjustments: Vec<String>,
    pub provider: ProviderKind,
}

impl ResearchResult {
    /// Replace the surcharge layer with an authoritative value and
    /// recompute the total.
    pub fn override_section_301(&mut self, rate: f64, note: Option<String>) {
        self.section_301 = rate;
        self.total_rate = self.base_mfn_rate + self.section_301 + self.section_232;
        if let Some(note) = note {
            self.policy_adjustments.push(note);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_breakdown_normalizes_mixed_forms() {
        let wire: RateBreakdownWire = serde_json::from_value(serde_json::json!({
            "hs_code": "8517.62.00",
            "description": "modems",
            "base_mfn_rate": "2.7",
            "section_301": 25,
            "section_232": 0.0,
            "usmca_rate": null,
            "total_rate": 99.9,
            "confidence": "high",
            "policy_adjustments": ["Section 301 List 4A: 25%"]
        }))
        .expect("deserialize");

        let result = wire.normalize(ProviderKind::Primary);
        assert_eq!(result.hs_code, "8517620000");
        assert!((result.base_mfn_rate - 0.027).abs() < 1e-9);
        assert_eq!(result.section_301, 0.25);
        // Reported total (99.9) is ignored; recomputed locally.
        assert!((result.total_rate - 0.277).abs() < 1e-9);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn missing_rate_fields_fail_closed_to_zero() {
        let wire: RateBreakdownWire =
            serde_json::from_value(serde_json::json!({ "hs_code": "9999999999" }))
                .expect("deserialize");
        let result = wire.normalize(ProviderKind::Secondary);
        assert_eq!(result.total_rate, 0.0);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn override_recomputes_total() {
        let wire: RateBreakdownWire = serde_json::from_value(serde_json::json!({
            "hs_code": "8517620000",
            "base_mfn_rate": 0.027,
            "section_301": 0.075,
        }))
        .expect("deserialize");
        let mut result = wire.normalize(ProviderKind::Primary);
        result.override_section_301(0.25, Some("Section 301 validated: 25%".into()));
        assert!((result.total_rate - 0.277).abs() < 1e-9);
        assert_eq!(result.policy_adjustments.len(), 1);
    }
}
