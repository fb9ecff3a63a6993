//! Typed research client with two-provider failover.
//!
//! Both provider slots speak the same wire protocol. Every lookup
//! walks the slots in order (primary, then secondary); any failure at
//! one slot — missing credentials, transport error, non-2xx status,
//! unparseable body — logs a warning and falls through to the next.
//! Only when every slot has failed does [`ResearchError::AllProvidersFailed`]
//! propagate to the caller.
//!
//! Batched lookups issue exactly one HTTP call per provider attempt
//! regardless of batch size, and the response is validated against the
//! request: every component index must be answered exactly once.
//! When a surcharge resolver is attached, Section 301 rates in batch
//! results for applicable lanes are re-validated concurrently against
//! the four-tier fallback chain, and the authoritative value replaces
//! whatever the provider reported.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;

use tti_core::{normalize_country_code, normalize_hs_code, section_301_applies};

use crate::config::{ProviderConfig, ResearchConfig};
use crate::error::{ConfigError, ResearchError};
use crate::retry::retry_send;
use crate::surcharge::{PolicySurchargeResolver, SurchargeResolution};
use crate::types::{
    BatchItem, BatchLookupRequest, BatchResponseWire, LookupRequest, ProviderKind,
    RateBreakdownWire, ResearchResult,
};

/// One component of a batched research query.
#[derive(Debug, Clone)]
pub struct BatchQuery {
    pub hs_code: String,
    pub origin_country: String,
    pub description: Option<String>,
}

struct ProviderSlot {
    kind: ProviderKind,
    http: reqwest::Client,
    base_url: String,
}

impl ProviderSlot {
    fn build(kind: ProviderKind, config: ProviderConfig) -> Result<Self, ConfigError> {
        url::Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            provider: kind,
            reason: e.to_string(),
        })?;
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| ConfigError::InvalidApiKey { provider: kind })?,
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self {
            kind,
            http,
            base_url: config.base_url,
        })
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ResearchError> {
        let url = format!("{}{path}", self.base_url);
        let resp = retry_send(|| self.http.post(&url).json(body).send())
            .await
            .map_err(|e| ResearchError::Transport {
                provider: self.kind,
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ResearchError::BadStatus {
                provider: self.kind,
                status,
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ResearchError::UnparseableResponse {
                provider: self.kind,
                reason: e.to_string(),
            })
    }
}

/// Rate research client over up to two interchangeable HTTP providers.
pub struct ResearchClient {
    primary: Option<ProviderSlot>,
    secondary: Option<ProviderSlot>,
    surcharge: Option<Arc<PolicySurchargeResolver>>,
}

impl ResearchClient {
    pub fn new(config: ResearchConfig) -> Result<Self, ConfigError> {
        let primary = config
            .primary
            .map(|c| ProviderSlot::build(ProviderKind::Primary, c))
            .transpose()?;
        let secondary = config
            .secondary
            .map(|c| ProviderSlot::build(ProviderKind::Secondary, c))
            .transpose()?;
        Ok(Self {
            primary,
            secondary,
            surcharge: None,
        })
    }

    /// Attach a surcharge resolver for batch-result re-validation.
    pub fn with_surcharge_resolver(mut self, resolver: Arc<PolicySurchargeResolver>) -> Self {
        self.surcharge = Some(resolver);
        self
    }

    /// Look up the full rate breakdown for a single component lane.
    pub async fn lookup_one(
        &self,
        hs_code: &str,
        origin_country: &str,
        destination_country: &str,
        description: Option<&str>,
    ) -> Result<ResearchResult, ResearchError> {
        let hs_code = normalize_hs_code(hs_code);
        let origin = normalize_country_code(origin_country);
        let destination = normalize_country_code(destination_country);
        let request = LookupRequest {
            hs_code: &hs_code,
            origin_country: &origin,
            destination_country: &destination,
            description,
            section_301_applicable: section_301_applies(&origin, &destination),
        };

        let (wire, provider) = self
            .post_failover::<_, RateBreakdownWire>("/v1/rates/lookup", &request)
            .await?;
        Ok(wire.normalize(provider))
    }

    /// Look up rate breakdowns for a whole batch of components in a
    /// single provider call.
    ///
    /// The returned vector is index-aligned with `components`. A
    /// response that does not answer every component exactly once is
    /// treated as unparseable and triggers failover.
    pub async fn lookup_batch(
        &self,
        destination_country: &str,
        product_description: Option<&str>,
        components: &[BatchQuery],
    ) -> Result<Vec<ResearchResult>, ResearchError> {
        let destination = normalize_country_code(destination_country);
        let normalized: Vec<(String, String)> = components
            .iter()
            .map(|c| {
                (
                    normalize_hs_code(&c.hs_code),
                    normalize_country_code(&c.origin_country),
                )
            })
            .collect();
        let items: Vec<BatchItem<'_>> = components
            .iter()
            .zip(&normalized)
            .enumerate()
            .map(|(index, (c, (hs, origin)))| BatchItem {
                index,
                hs_code: hs.as_str(),
                origin_country: origin.as_str(),
                description: c.description.as_deref(),
            })
            .collect();
        let request = BatchLookupRequest {
            destination_country: &destination,
            product_description,
            components: items,
        };

        tracing::info!(
            destination = %destination,
            batch_size = components.len(),
            "issuing batched rate lookup"
        );

        let mut failures: Vec<String> = Vec::new();
        let mut answered: Option<(Vec<ResearchResult>, ProviderKind)> = None;
        for (kind, slot) in self.slots() {
            match slot {
                None => {
                    failures.push(ResearchError::NotConfigured { provider: kind }.to_string());
                }
                Some(slot) => {
                    match slot
                        .post_json::<_, BatchResponseWire>("/v1/rates/lookup-batch", &request)
                        .await
                        .and_then(|wire| align_batch(wire, components.len(), slot.kind))
                    {
                        Ok(results) => {
                            answered = Some((results, slot.kind));
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                provider = %slot.kind,
                                "batched rate lookup failed, trying next provider: {e}"
                            );
                            failures.push(e.to_string());
                        }
                    }
                }
            }
        }

        let (mut results, provider) = match answered {
            Some(r) => r,
            None => return Err(all_failed(failures)),
        };

        tracing::debug!(provider = %provider, results = results.len(), "batched rate lookup answered");

        self.revalidate_surcharges(&destination, &normalized, &mut results)
            .await;
        Ok(results)
    }

    fn slots(&self) -> [(ProviderKind, Option<&ProviderSlot>); 2] {
        [
            (ProviderKind::Primary, self.primary.as_ref()),
            (ProviderKind::Secondary, self.secondary.as_ref()),
        ]
    }

    async fn post_failover<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(T, ProviderKind), ResearchError> {
        let mut failures: Vec<String> = Vec::new();
        for (kind, slot) in self.slots() {
            match slot {
                None => failures.push(ResearchError::NotConfigured { provider: kind }.to_string()),
                Some(slot) => match slot.post_json::<B, T>(path, body).await {
                    Ok(value) => return Ok((value, slot.kind)),
                    Err(e) => {
                        tracing::warn!(
                            provider = %slot.kind,
                            path,
                            "research lookup failed, trying next provider: {e}"
                        );
                        failures.push(e.to_string());
                    }
                },
            }
        }
        Err(all_failed(failures))
    }

    /// Concurrently re-validate Section 301 layers for applicable
    /// lanes. Provider-reported surcharges are advisory; the fallback
    /// chain is authoritative. A panicked re-validation task degrades
    /// that one component to the error state rather than failing the
    /// batch.
    async fn revalidate_surcharges(
        &self,
        destination: &str,
        lanes: &[(String, String)],
        results: &mut [ResearchResult],
    ) {
        let Some(resolver) = &self.surcharge else {
            return;
        };

        let mut tasks = Vec::new();
        for (index, (hs_code, origin)) in lanes.iter().enumerate() {
            if !section_301_applies(origin, destination) {
                continue;
            }
            let resolver = Arc::clone(resolver);
            let hs_code = hs_code.clone();
            tasks.push((
                index,
                tokio::spawn(async move { resolver.resolve(&hs_code).await }),
            ));
        }

        let (indices, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        for (index, outcome) in indices.into_iter().zip(join_all(handles).await) {
            let resolution = match outcome {
                Ok(resolution) => resolution,
                Err(e) => SurchargeResolution::error(&results[index].hs_code, e.to_string()),
            };
            apply_surcharge(&mut results[index], resolution);
        }
    }
}

fn apply_surcharge(result: &mut ResearchResult, resolution: SurchargeResolution) {
    let note = resolution
        .source_tier
        .tier_number()
        .map(|tier| format!("Section 301 validated (tier {tier}): {:.1}%", resolution.rate * 100.0));
    result.override_section_301(resolution.rate, note);
    result.confidence = result.confidence.worst(resolution.confidence);
    result.policy_adjustments.extend(resolution.notes);
}

/// Validate a batch response against the request shape and return the
/// results ordered by component index.
fn align_batch(
    wire: BatchResponseWire,
    expected: usize,
    provider: ProviderKind,
) -> Result<Vec<ResearchResult>, ResearchError> {
    if wire.results.len() != expected {
        return Err(ResearchError::UnparseableResponse {
            provider,
            reason: format!(
                "batch answered {} of {expected} components",
                wire.results.len()
            ),
        });
    }
    let mut slots: Vec<Option<ResearchResult>> = (0..expected).map(|_| None).collect();
    for item in wire.results {
        let index = item.component_index;
        if index >= expected || slots[index].is_some() {
            return Err(ResearchError::UnparseableResponse {
                provider,
                reason: format!("duplicate or out-of-range component index {index}"),
            });
        }
        slots[index] = Some(item.breakdown.normalize(provider));
    }
    // Length and uniqueness checks above guarantee every slot filled.
    Ok(slots.into_iter().flatten().collect())
}

fn all_failed(mut failures: Vec<String>) -> ResearchError {
    let secondary = failures.pop().unwrap_or_else(|| "not attempted".to_string());
    let primary = failures.pop().unwrap_or_else(|| "not attempted".to_string());
    ResearchError::AllProvidersFailed { primary, secondary }
}
