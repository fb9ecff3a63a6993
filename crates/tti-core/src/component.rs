//! Component and quote data model.
//!
//! [`Component`] is the caller-owned input; [`EnrichedComponent`] is
//! the per-component output contract. A failed enrichment is still an
//! `EnrichedComponent` — annotated with `enrichment_error` and the
//! original input fields intact — so downstream consumers can tell
//! "duty-free" apart from "undetermined".

use chrono::{DateTime, Duration, Utc};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::country::normalize_hs_code;
use crate::rates;

/// A physical input needing a duty determination. Created by the
/// caller; immutable within one enrichment call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Country where the component was made (not where it ships from).
    pub origin_country: String,
    /// Country the finished goods are exported to.
    pub destination_country: String,
    /// Tariff classification, if already known. `None` flags that
    /// classification is a prerequisite — this stack never assigns one.
    pub hs_code: Option<String>,
    /// Free-text description, passed to research providers as context.
    pub description: Option<String>,
}

impl Component {
    pub fn new(
        origin_country: impl Into<String>,
        destination_country: impl Into<String>,
        hs_code: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            origin_country: origin_country.into(),
            destination_country: destination_country.into(),
            hs_code,
            description,
        }
    }
}

/// Optional caller-supplied context for one enrichment call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentContext {
    /// Ship-from country when it differs from the country of origin.
    /// Informational only: rate lookups always key on origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_country: Option<String>,
    /// Pre-computed Section 301 applicability, if the caller already
    /// determined it. Recomputed and overridden by the router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_301_applicable: Option<bool>,
}

/// Confidence grade attached to every resolved rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// All fallback tiers exhausted or data gap detected; a human must
    /// verify before the rate is relied on.
    CriticalReviewRequired,
    Error,
}

impl Confidence {
    /// Parse a provider-reported confidence label, defaulting to
    /// `Medium` for anything unrecognized.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
            Self::CriticalReviewRequired => 3,
            Self::Error => 4,
        }
    }

    /// The weaker of two grades. A composed value is only as
    /// trustworthy as its least trustworthy layer.
    pub fn worst(self, other: Self) -> Self {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::CriticalReviewRequired => write!(f, "critical_review_required"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Which tier of the resolution chain produced a value.
///
/// Serialized as the integers `1`–`4` for the surcharge fallback
/// tiers, and as the strings `"database"` / `"error"` otherwise,
/// matching the output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTier {
    /// Fresh policy cache (age ≤ 25 days).
    FreshCache,
    /// Stale policy cache served after a failed rescue (25–60 days).
    StaleCache,
    /// Emergency real-time point fetch.
    EmergencyFetch,
    /// Long-lived static reference table.
    StaticFallback,
    /// Stable treaty reference table (database strategy).
    Database,
    /// Every tier failed.
    Error,
}

impl SourceTier {
    /// Numeric tier for the fallback-chain variants.
    pub fn tier_number(&self) -> Option<u8> {
        match self {
            Self::FreshCache => Some(1),
            Self::StaleCache => Some(2),
            Self::EmergencyFetch => Some(3),
            Self::StaticFallback => Some(4),
            Self::Database | Self::Error => None,
        }
    }
}

impl Serialize for SourceTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.tier_number() {
            Some(n) => serializer.serialize_u8(n),
            None => match self {
                Self::Database => serializer.serialize_str("database"),
                _ => serializer.serialize_str("error"),
            },
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier_number() {
            Some(n) => write!(f, "tier {n}"),
            None => match self {
                Self::Database => write!(f, "database"),
                _ => write!(f, "error"),
            },
        }
    }
}

/// The resolved duty breakdown for one component. All rates are
/// canonical decimal fractions; `total_rate` is always recomputed from
/// its layers, never accepted from a source.
#[derive(Debug, Clone, Serialize)]
pub struct RateQuote {
    pub hs_code: String,
    pub base_mfn_rate: f64,
    pub section_301: f64,
    pub section_232: f64,
    pub usmca_rate: f64,
    pub total_rate: f64,
    pub confidence: Confidence,
    pub source_tier: SourceTier,
    /// Ordered human-readable notes ("Section 301 List 4A: 25%", …).
    pub policy_adjustments: Vec<String>,
    pub verified_at: DateTime<Utc>,
    /// `None` for the database tier, whose reference rows carry no TTL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RateQuote {
    /// Compose a quote from normalized layers, recomputing the total
    /// and deriving `expires_at = verified_at + ttl` when the source
    /// has a TTL.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        hs_code: &str,
        base_mfn_rate: f64,
        section_301: f64,
        section_232: f64,
        usmca_rate: f64,
        confidence: Confidence,
        source_tier: SourceTier,
        policy_adjustments: Vec<String>,
        ttl_hours: Option<i64>,
    ) -> Self {
        let base_mfn_rate = rates::normalize_rate(base_mfn_rate);
        let section_301 = rates::normalize_rate(section_301);
        let section_232 = rates::normalize_rate(section_232);
        let verified_at = Utc::now();
        Self {
            hs_code: normalize_hs_code(hs_code),
            base_mfn_rate,
            section_301,
            section_232,
            usmca_rate: rates::normalize_rate(usmca_rate),
            total_rate: base_mfn_rate + section_301 + section_232,
            confidence,
            source_tier,
            policy_adjustments,
            verified_at,
            expires_at: ttl_hours.map(|hours| verified_at + Duration::hours(hours)),
        }
    }
}

/// Informational duty-free threshold advisory for a destination/origin
/// pair. Never affects the duty calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeMinimisInfo {
    pub destination: String,
    pub origin: String,
    /// Duty-free threshold in the destination's advisory currency.
    pub threshold: f64,
    pub currency: String,
    /// Tax-free threshold where the destination splits duty and tax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_threshold: Option<f64>,
    /// VAT threshold where applicable (Mexico).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_threshold: Option<f64>,
    pub applicable: bool,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_change: Option<String>,
}

/// Per-component enrichment output. Echoes the input fields so a
/// failed component is never omitted from a batch result.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedComponent {
    pub origin_country: String,
    pub destination_country: String,
    /// Canonical 10-digit form when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs_description: Option<String>,
    pub base_mfn_rate: f64,
    pub section_301: f64,
    pub section_232: f64,
    pub usmca_rate: f64,
    pub total_rate: f64,
    /// Duty saved by the preferential rate relative to MFN, percent.
    pub savings_percentage: f64,
    pub confidence: Confidence,
    /// Provenance label: `database`, `ai_fresh_24hr`,
    /// `ai_cached_90day`, `batch_cached`, `error`, …
    pub data_source: String,
    /// Age of the underlying record; `0` when freshly fetched.
    pub cache_age_days: i64,
    pub policy_adjustments: Vec<String>,
    pub section_301_applicable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_301_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub de_minimis_info: Option<DeMinimisInfo>,
    /// Set when the component needs HS classification before rates can
    /// be resolved (`needs_classification`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_status: Option<String>,
    /// Present (true) only on failure.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub enrichment_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl EnrichedComponent {
    /// Zero-rate scaffold echoing a component's input fields.
    pub fn scaffold(component: &Component) -> Self {
        Self {
            origin_country: component.origin_country.clone(),
            destination_country: component.destination_country.clone(),
            hs_code: component.hs_code.as_deref().map(normalize_hs_code),
            description: component.description.clone(),
            hs_description: None,
            base_mfn_rate: 0.0,
            section_301: 0.0,
            section_232: 0.0,
            usmca_rate: 0.0,
            total_rate: 0.0,
            savings_percentage: 0.0,
            confidence: Confidence::Medium,
            data_source: String::new(),
            cache_age_days: 0,
            policy_adjustments: Vec::new(),
            section_301_applicable: false,
            section_301_warning: None,
            staleness_warning: None,
            de_minimis_info: None,
            enrichment_status: None,
            enrichment_error: false,
            error_message: None,
            last_updated: Utc::now(),
        }
    }

    /// Annotate a component as failed, keeping the input fields intact.
    pub fn failed(component: &Component, message: impl Into<String>) -> Self {
        let mut out = Self::scaffold(component);
        out.confidence = Confidence::Error;
        out.data_source = "error".to_string();
        out.enrichment_error = true;
        out.error_message = Some(message.into());
        out
    }

    /// Mark a component as needing HS classification before any rate
    /// lookup can happen.
    pub fn needs_classification(component: &Component, data_source: &str) -> Self {
        let mut out = Self::scaffold(component);
        out.data_source = format!("{data_source}_no_hs_code");
        out.enrichment_status = Some("needs_classification".to_string());
        out
    }

    /// Percent saved by the preferential rate relative to MFN, rounded
    /// to one decimal. Zero when there is no MFN duty to save.
    pub fn savings_percentage(mfn_rate: f64, preferential_rate: f64) -> f64 {
        if mfn_rate <= 0.0 {
            return 0.0;
        }
        let savings = (mfn_rate - preferential_rate) / mfn_rate * 100.0;
        (savings * 10.0).round() / 10.0
    }

    /// Copy a quote's rate breakdown onto this result.
    pub fn apply_quote(&mut self, quote: &RateQuote) {
        self.hs_code = Some(quote.hs_code.clone());
        self.base_mfn_rate = quote.base_mfn_rate;
        self.section_301 = quote.section_301;
        self.section_232 = quote.section_232;
        self.usmca_rate = quote.usmca_rate;
        self.total_rate = quote.total_rate;
        self.savings_percentage = Self::savings_percentage(quote.base_mfn_rate, quote.usmca_rate);
        self.confidence = quote.confidence;
        self.policy_adjustments = quote.policy_adjustments.clone();
        self.last_updated = quote.verified_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tier_serializes_mixed() {
        assert_eq!(serde_json::to_value(SourceTier::FreshCache).unwrap(), serde_json::json!(1));
        assert_eq!(serde_json::to_value(SourceTier::StaticFallback).unwrap(), serde_json::json!(4));
        assert_eq!(
            serde_json::to_value(SourceTier::Database).unwrap(),
            serde_json::json!("database")
        );
        assert_eq!(serde_json::to_value(SourceTier::Error).unwrap(), serde_json::json!("error"));
    }

    #[test]
    fn confidence_labels_round_trip() {
        assert_eq!(Confidence::from_label("High"), Confidence::High);
        assert_eq!(Confidence::from_label("medium"), Confidence::Medium);
        assert_eq!(Confidence::from_label("nonsense"), Confidence::Medium);
        assert_eq!(Confidence::CriticalReviewRequired.to_string(), "critical_review_required");
    }

    #[test]
    fn compose_recomputes_total_and_expiry() {
        let quote = RateQuote::compose(
            "8517.62.00",
            2.7, // percentage form — must normalize
            0.25,
            0.0,
            0.0,
            Confidence::High,
            SourceTier::FreshCache,
            vec!["Section 301 List 4A: 25%".into()],
            Some(24),
        );
        assert_eq!(quote.hs_code, "8517620000");
        assert!((quote.total_rate - (quote.base_mfn_rate + quote.section_301 + quote.section_232)).abs() < 1e-9);
        assert!((quote.total_rate - 0.277).abs() < 1e-9);
        assert_eq!(quote.expires_at, Some(quote.verified_at + Duration::hours(24)));
    }

    #[test]
    fn database_quotes_have_no_expiry() {
        let quote = RateQuote::compose(
            "8708.30.50",
            0.027,
            0.0,
            0.0,
            0.0,
            Confidence::High,
            SourceTier::Database,
            Vec::new(),
            None,
        );
        assert_eq!(quote.expires_at, None);
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json.get("expires_at").is_none());
        assert_eq!(json["source_tier"], serde_json::json!("database"));
    }

    #[test]
    fn failed_component_keeps_input_fields() {
        let component = Component::new("CN", "US", Some("8517620000".into()), Some("modem".into()));
        let result = EnrichedComponent::failed(&component, "both providers down");
        assert!(result.enrichment_error);
        assert_eq!(result.origin_country, "CN");
        assert_eq!(result.hs_code.as_deref(), Some("8517620000"));
        assert_eq!(result.error_message.as_deref(), Some("both providers down"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["enrichment_error"], serde_json::json!(true));
    }

    #[test]
    fn enrichment_error_absent_on_success() {
        let component = Component::new("MX", "MX", Some("8708300000".into()), None);
        let result = EnrichedComponent::scaffold(&component);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("enrichment_error").is_none());
    }

    #[test]
    fn savings_percentage_guards_zero_mfn() {
        assert_eq!(EnrichedComponent::savings_percentage(0.0, 0.0), 0.0);
        assert_eq!(EnrichedComponent::savings_percentage(0.10, 0.0), 100.0);
        assert_eq!(EnrichedComponent::savings_percentage(0.06, 0.03), 50.0);
    }
}
