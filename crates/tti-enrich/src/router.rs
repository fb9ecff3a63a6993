//! # Enrichment Router
//!
//! Top-level orchestrator: picks a lookup strategy per destination,
//! drives single and batched enrichment, merges cached and
//! freshly-researched results, and attaches the Section 301 flag and
//! de minimis advisory to every result.
//!
//! ## Failure policy
//!
//! `enrich_one` and `enrich_batch` never return `Err`. Store failures
//! were already absorbed below this layer; research failures degrade
//! (batch → per-component → annotated failure), and a component that
//! cannot be resolved at all comes back with `enrichment_error: true`
//! and its input fields intact. One component's failure never removes
//! it — or any other component — from a batch result.

use std::sync::Arc;

use futures::future::join_all;

use tti_core::{
    country_name, normalize_country_code, normalize_hs_code, total_rate, CacheStrategy, Component,
    Confidence, EnrichedComponent, EnrichmentContext, RateQuote, SourceTier,
};
use tti_research::{BatchQuery, ResearchClient, ResearchResult};
use tti_store::{CachedRate, RateCache, RateCacheEntry, TreatyReference};

use crate::de_minimis::de_minimis_info;

/// Treaty reference rows older than this get a staleness warning.
const REFERENCE_STALE_DAYS: i64 = 90;
/// Older than this, the warning escalates and confidence drops to low.
const REFERENCE_CRITICAL_DAYS: i64 = 180;

/// Destination-aware enrichment orchestrator.
///
/// All collaborators are injected at construction and dropped with the
/// router; there is no process-global state.
pub struct EnrichmentRouter {
    rate_cache: Arc<dyn RateCache>,
    treaty: Arc<dyn TreatyReference>,
    research: Arc<ResearchClient>,
}

impl EnrichmentRouter {
    pub fn new(
        rate_cache: Arc<dyn RateCache>,
        treaty: Arc<dyn TreatyReference>,
        research: Arc<ResearchClient>,
    ) -> Self {
        Self {
            rate_cache,
            treaty,
            research,
        }
    }

    /// Enrich a single component. Infallible: failures come back as an
    /// annotated result, never as an error.
    pub async fn enrich_one(
        &self,
        component: &Component,
        context: &EnrichmentContext,
    ) -> EnrichedComponent {
        let strategy = CacheStrategy::for_destination(&component.destination_country);
        let mut out = match &component.hs_code {
            None => EnrichedComponent::needs_classification(component, &strategy.to_string()),
            Some(hs_code) => match strategy {
                CacheStrategy::Database => self.database_enrich(component, hs_code).await,
                ai => self.ai_enrich(component, hs_code, ai).await,
            },
        };
        self.finalize(&mut out, component, context);
        out
    }

    /// Enrich a batch of components sharing one destination.
    ///
    /// The output always has the same length and order as the input.
    /// Database-strategy destinations fan out to independent
    /// `enrich_one` calls; AI strategies probe the cache concurrently,
    /// send the misses as one batched research call, and degrade to
    /// per-component enrichment if the batched call fails entirely.
    pub async fn enrich_batch(
        &self,
        components: &[Component],
        destination_country: &str,
        product_description: Option<&str>,
        context: &EnrichmentContext,
    ) -> Vec<EnrichedComponent> {
        let strategy = CacheStrategy::for_destination(destination_country);
        let destination = normalize_country_code(destination_country);

        if strategy == CacheStrategy::Database {
            return join_all(components.iter().map(|c| self.enrich_one(c, context))).await;
        }

        // Concurrent cache probes for every classified component.
        let probes = join_all(components.iter().enumerate().map(|(index, component)| {
            let destination = &destination;
            async move {
                let Some(hs_code) = &component.hs_code else {
                    return (index, Probe::NoHsCode);
                };
                let origin = normalize_country_code(&component.origin_country);
                let hs_code = normalize_hs_code(hs_code);
                match self.rate_cache.get(&origin, destination, &hs_code).await {
                    Some(row) => (index, Probe::Hit(row)),
                    None => (index, Probe::Miss),
                }
            }
        }))
        .await;

        let mut slots: Vec<Option<EnrichedComponent>> =
            (0..components.len()).map(|_| None).collect();
        let mut misses: Vec<usize> = Vec::new();
        for (index, probe) in probes {
            let component = &components[index];
            match probe {
                Probe::NoHsCode => {
                    slots[index] = Some(EnrichedComponent::needs_classification(
                        component,
                        &strategy.to_string(),
                    ));
                }
                Probe::Hit(row) => {
                    slots[index] = Some(self.from_cached(component, &row, "batch_cached"));
                }
                Probe::Miss => misses.push(index),
            }
        }

        if !misses.is_empty() {
            self.research_batch(components, &misses, &destination, product_description, strategy, &mut slots, context)
                .await;
        }

        slots
            .into_iter()
            .zip(components)
            .map(|(slot, component)| {
                let mut out = slot
                    .unwrap_or_else(|| EnrichedComponent::failed(component, "enrichment slot unfilled"));
                self.finalize(&mut out, component, context);
                out
            })
            .collect()
    }

    /// One batched research call for the cache misses, degrading to
    /// per-component enrichment if the whole call fails.
    #[allow(clippy::too_many_arguments)]
    async fn research_batch(
        &self,
        components: &[Component],
        misses: &[usize],
        destination: &str,
        product_description: Option<&str>,
        strategy: CacheStrategy,
        slots: &mut [Option<EnrichedComponent>],
        context: &EnrichmentContext,
    ) {
        let queries: Vec<BatchQuery> = misses
            .iter()
            .map(|&index| {
                let component = &components[index];
                BatchQuery {
                    hs_code: component.hs_code.clone().unwrap_or_default(),
                    origin_country: component.origin_country.clone(),
                    description: component.description.clone(),
                }
            })
            .collect();

        match self
            .research
            .lookup_batch(destination, product_description, &queries)
            .await
        {
            Ok(results) => {
                for (&index, result) in misses.iter().zip(&results) {
                    let component = &components[index];
                    self.persist(component, destination, result, strategy).await;
                    slots[index] = Some(self.from_research(component, result, "batch_ai"));
                }
            }
            Err(e) => {
                tracing::warn!(
                    destination,
                    misses = misses.len(),
                    "batched research failed, degrading to per-component enrichment: {e}"
                );
                let fallbacks = join_all(
                    misses
                        .iter()
                        .map(|&index| self.enrich_one(&components[index], context)),
                )
                .await;
                for (&index, result) in misses.iter().zip(fallbacks) {
                    slots[index] = Some(result);
                }
            }
        }
    }

    /// Database strategy: stable treaty rates straight from the
    /// reference table, with staleness grading instead of a TTL.
    async fn database_enrich(&self, component: &Component, hs_code: &str) -> EnrichedComponent {
        let Some(record) = self.treaty.lookup(hs_code).await else {
            // The reference table is curated, not exhaustive. An
            // unlisted code gets the short-horizon research path.
            tracing::info!(
                hs_code,
                "HS code not in treaty reference, falling back to research"
            );
            return self.ai_enrich(component, hs_code, CacheStrategy::Ai24Hr).await;
        };

        let age_days = record.age_days();
        let (confidence, staleness_warning) = if age_days > REFERENCE_CRITICAL_DAYS {
            tracing::warn!(hs_code, age_days, "critically stale treaty reference row");
            (
                Confidence::Low,
                Some(format!(
                    "tariff reference data is {age_days} days old — rates may have changed significantly, re-verification recommended"
                )),
            )
        } else if age_days > REFERENCE_STALE_DAYS {
            (
                Confidence::Medium,
                Some(format!(
                    "tariff reference data is {age_days} days old — consider re-verification for current rates"
                )),
            )
        } else {
            (Confidence::High, None)
        };

        let quote = RateQuote::compose(
            hs_code,
            record.mfn_rate,
            0.0,
            0.0,
            record.usmca_rate,
            confidence,
            SourceTier::Database,
            Vec::new(),
            None,
        );
        let mut out = EnrichedComponent::scaffold(component);
        out.apply_quote(&quote);
        out.hs_description = record.description.clone();
        out.data_source = "database".to_string();
        out.cache_age_days = age_days;
        out.staleness_warning = staleness_warning;
        out
    }

    /// AI strategies: cache first, research on miss, write-back.
    async fn ai_enrich(
        &self,
        component: &Component,
        hs_code: &str,
        strategy: CacheStrategy,
    ) -> EnrichedComponent {
        let origin = normalize_country_code(&component.origin_country);
        let destination = normalize_country_code(&component.destination_country);
        let hs_code = normalize_hs_code(hs_code);

        if let Some(row) = self.rate_cache.get(&origin, &destination, &hs_code).await {
            return self.from_cached(component, &row, strategy.cached_label());
        }

        match self
            .research
            .lookup_one(&hs_code, &origin, &destination, component.description.as_deref())
            .await
        {
            Ok(result) => {
                self.persist(component, &destination, &result, strategy).await;
                self.from_research(component, &result, strategy.fresh_label())
            }
            Err(e) => {
                tracing::warn!(
                    hs_code,
                    origin = %origin,
                    destination = %destination,
                    "research failed for component: {e}"
                );
                EnrichedComponent::failed(component, e.to_string())
            }
        }
    }

    fn from_cached(
        &self,
        component: &Component,
        row: &CachedRate,
        data_source: &str,
    ) -> EnrichedComponent {
        let mut out = EnrichedComponent::scaffold(component);
        out.hs_code = Some(row.hs_code.clone());
        out.hs_description = row.hs_description.clone();
        out.base_mfn_rate = row.base_mfn_rate;
        out.section_301 = row.section_301;
        out.section_232 = row.section_232;
        out.usmca_rate = row.usmca_rate;
        out.total_rate = total_rate(row.base_mfn_rate, row.section_301, row.section_232);
        out.savings_percentage =
            EnrichedComponent::savings_percentage(row.base_mfn_rate, row.usmca_rate);
        out.confidence = row.confidence;
        out.policy_adjustments = row.policy_adjustments.clone();
        out.data_source = data_source.to_string();
        out.cache_age_days = row.age_days();
        out
    }

    fn from_research(
        &self,
        component: &Component,
        result: &ResearchResult,
        data_source: &str,
    ) -> EnrichedComponent {
        let mut out = EnrichedComponent::scaffold(component);
        out.hs_code = Some(result.hs_code.clone());
        out.hs_description = result.hs_description.clone();
        out.base_mfn_rate = result.base_mfn_rate;
        out.section_301 = result.section_301;
        out.section_232 = result.section_232;
        out.usmca_rate = result.usmca_rate;
        out.total_rate = result.total_rate;
        out.savings_percentage =
            EnrichedComponent::savings_percentage(result.base_mfn_rate, result.usmca_rate);
        out.confidence = result.confidence;
        out.policy_adjustments = result.policy_adjustments.clone();
        out.data_source = data_source.to_string();
        out.cache_age_days = 0;
        out
    }

    /// Best-effort write-back of a fresh research result.
    async fn persist(
        &self,
        component: &Component,
        destination: &str,
        result: &ResearchResult,
        strategy: CacheStrategy,
    ) {
        let Some(ttl_hours) = strategy.ttl_hours() else {
            return;
        };
        let entry = RateCacheEntry {
            origin_country: normalize_country_code(&component.origin_country),
            destination_country: destination.to_string(),
            hs_code: result.hs_code.clone(),
            hs_description: result.hs_description.clone(),
            base_mfn_rate: result.base_mfn_rate,
            section_301: result.section_301,
            section_232: result.section_232,
            usmca_rate: result.usmca_rate,
            confidence: result.confidence,
            policy_adjustments: result.policy_adjustments.clone(),
            data_source: strategy.fresh_label().to_string(),
        };
        self.rate_cache.upsert(&entry, ttl_hours).await;
    }

    /// Attach the Section 301 flag, via-country warning, and de
    /// minimis advisory. Runs on every result, whatever path produced
    /// it.
    fn finalize(
        &self,
        out: &mut EnrichedComponent,
        component: &Component,
        context: &EnrichmentContext,
    ) {
        let origin = normalize_country_code(&component.origin_country);
        let destination = normalize_country_code(&component.destination_country);

        // Always recomputed from true origin, overriding any
        // caller-supplied flag: the ship-from country never decides
        // Section 301 applicability.
        let applicable = tti_core::section_301_applies(&origin, &destination);
        out.section_301_applicable = applicable;
        if applicable {
            if let Some(supplier) = &context.supplier_country {
                let supplier = normalize_country_code(supplier);
                if supplier != origin {
                    out.section_301_warning = Some(format!(
                        "Chinese-origin goods shipped via {} still incur Section 301 tariffs",
                        country_name(&supplier)
                    ));
                }
            }
        }

        out.de_minimis_info = Some(de_minimis_info(&destination, &origin));
    }
}

enum Probe {
    Hit(CachedRate),
    Miss,
    NoHsCode,
}
