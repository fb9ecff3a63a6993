//! # tti-enrich — Enrichment Orchestration
//!
//! The top of the duty-resolution stack. [`EnrichmentRouter`] takes
//! caller-supplied components, selects a lookup strategy per
//! destination (stable treaty reference, 90-day cache, or 24-hour
//! cache), drives single and batched resolution through the store and
//! research layers, and returns one [`tti_core::EnrichedComponent`]
//! per input — always, in order, failures annotated rather than
//! thrown.
//!
//! The de minimis advisory ([`de_minimis_info`]) is attached to every
//! result and is informational only.

pub mod de_minimis;
pub mod router;

pub use de_minimis::de_minimis_info;
pub use router::EnrichmentRouter;
