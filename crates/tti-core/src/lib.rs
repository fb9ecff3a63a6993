//! # tti-core — Domain Types and Pure Rate Logic
//!
//! Foundation crate for the Triangle Trade duty-resolution stack. Holds
//! everything that needs no I/O: country and HS-code normalization, the
//! destination cache-strategy mapping, the rate normalizer, and the
//! component/quote data model shared by the store, research, and
//! enrichment crates.
//!
//! ## Rate Representation
//!
//! Every duty rate crossing a crate boundary is a canonical decimal
//! fraction (`0.25` means 25%; stacked duties past 100% stay decimal,
//! so `1.5` means 150%). External sources report rates inconsistently
//! — sometimes `25`, sometimes `0.25` — so all inbound values pass
//! through [`rates::normalize_rate`] before use, and composite totals
//! are always recomputed locally via [`rates::total_rate`] rather than
//! trusted from the source. Normalized values are fixpoints of the
//! normalizer, so re-normalizing a cached row never shifts it.

pub mod component;
pub mod country;
pub mod rates;
pub mod strategy;

pub use component::{
    Component, Confidence, DeMinimisInfo, EnrichedComponent, EnrichmentContext, RateQuote,
    SourceTier,
};
pub use country::{country_name, normalize_country_code, normalize_hs_code, section_301_applies};
pub use rates::{normalize_raw, normalize_rate, total_rate, validate_surcharge, SurchargeValidation};
pub use strategy::CacheStrategy;
