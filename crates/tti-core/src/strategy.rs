//! Destination cache-strategy selection.
//!
//! Duty rates differ structurally per destination: Mexican T-MEC rates
//! are stable treaty rates servable from the reference table
//! indefinitely, Canadian CUSMA rates are stable enough for a 90-day
//! cache, and US rates are volatile policy (Section 301/232 change on
//! short notice) so research results are only trusted for 24 hours.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::country::normalize_country_code;

/// How rate lookups for a destination are served and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Direct reference-table lookup; treaty rates with no operational
    /// TTL (staleness is advisory, not disqualifying).
    Database,
    /// External research with a 90-day cache horizon.
    Ai90Day,
    /// External research with a 24-hour cache horizon.
    Ai24Hr,
}

impl CacheStrategy {
    /// Pure mapping from destination country to strategy.
    ///
    /// `MX → Database`, `CA → Ai90Day`, `US → Ai24Hr`. Unrecognized
    /// destinations fall back to `Ai24Hr` — the shortest horizon — so
    /// an unmapped country is re-verified aggressively rather than
    /// served stale. The fallback is logged; it is a deliberate
    /// fail-safe, not a silent default.
    pub fn for_destination(destination_country: &str) -> Self {
        match normalize_country_code(destination_country).as_str() {
            "MX" => Self::Database,
            "CA" => Self::Ai90Day,
            "US" => Self::Ai24Hr,
            other => {
                tracing::warn!(
                    destination = other,
                    "unrecognized destination country, defaulting to 24-hour cache strategy"
                );
                Self::Ai24Hr
            }
        }
    }

    /// Cache TTL in hours, or `None` for the database strategy.
    pub fn ttl_hours(&self) -> Option<i64> {
        match self {
            Self::Database => None,
            Self::Ai90Day => Some(90 * 24),
            Self::Ai24Hr => Some(24),
        }
    }

    /// Label used in `data_source` fields for fresh research results.
    pub fn fresh_label(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Ai90Day => "ai_fresh_90day",
            Self::Ai24Hr => "ai_fresh_24hr",
        }
    }

    /// Label used in `data_source` fields for cache hits.
    pub fn cached_label(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Ai90Day => "ai_cached_90day",
            Self::Ai24Hr => "ai_cached_24hr",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Ai90Day => write!(f, "ai_90day"),
            Self::Ai24Hr => write!(f, "ai_24hr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_destinations_map_per_policy() {
        assert_eq!(CacheStrategy::for_destination("MX"), CacheStrategy::Database);
        assert_eq!(CacheStrategy::for_destination("Mexico"), CacheStrategy::Database);
        assert_eq!(CacheStrategy::for_destination("CA"), CacheStrategy::Ai90Day);
        assert_eq!(CacheStrategy::for_destination("US"), CacheStrategy::Ai24Hr);
        assert_eq!(
            CacheStrategy::for_destination("United States"),
            CacheStrategy::Ai24Hr
        );
    }

    #[test]
    fn unrecognized_destination_defaults_to_24hr() {
        assert_eq!(CacheStrategy::for_destination("DE"), CacheStrategy::Ai24Hr);
        assert_eq!(CacheStrategy::for_destination("Narnia"), CacheStrategy::Ai24Hr);
    }

    #[test]
    fn ttls_match_strategy() {
        assert_eq!(CacheStrategy::Database.ttl_hours(), None);
        assert_eq!(CacheStrategy::Ai90Day.ttl_hours(), Some(2160));
        assert_eq!(CacheStrategy::Ai24Hr.ttl_hours(), Some(24));
    }

    #[test]
    fn display_is_stable() {
        assert_eq!(CacheStrategy::Ai90Day.to_string(), "ai_90day");
    }
}
