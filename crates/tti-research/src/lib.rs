//! # tti-research — External Rate Research
//!
//! Wraps the external rate-research capability behind a typed client
//! with two-provider failover, plus the four-tier fallback chain for
//! volatile policy surcharges.
//!
//! ## Architecture
//!
//! [`ResearchClient`] issues structured lookups (single and batched)
//! against up to two configured HTTP providers. The primary is tried
//! first; any failure — missing credentials, transport error, non-2xx
//! status, unparseable body — logs a warning and falls through to the
//! secondary. Only when both fail does an error propagate, and exactly
//! one level up: the enrichment router converts it into per-component
//! fallback, never into a thrown batch.
//!
//! [`PolicySurchargeResolver`] resolves a single volatile surcharge
//! (Section 301) for one HS code with graceful confidence degradation:
//! fresh snapshot → stale snapshot with emergency rescue → emergency
//! real-time fetch → static reference → explicit zero-rate
//! critical-review result. It never returns nothing if any prior data
//! exists.
//!
//! ## Response Parsing
//!
//! Provider responses are parsed with strict serde types. A body that
//! does not match the schema is a transient fetch error that triggers
//! failover — never a silent empty result.

pub mod client;
pub mod config;
pub mod error;
mod retry;
pub mod surcharge;
pub mod types;

pub use client::{BatchQuery, ResearchClient};
pub use config::{ProviderConfig, ResearchConfig};
pub use error::{ConfigError, ResearchError};
pub use surcharge::{
    EmergencyFetch, EmergencySurcharge, HttpEmergencyFetch, PolicySurchargeResolver,
    SurchargeResolution,
};
pub use types::{ProviderKind, ResearchResult};
