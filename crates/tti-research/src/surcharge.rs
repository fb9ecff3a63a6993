//! Four-tier policy surcharge resolution.
//!
//! Volatile unilateral surcharges (Section 301) carry real financial
//! and legal risk when served stale, so a single lookup is not enough.
//! The resolver walks a fixed fallback chain, first success wins:
//!
//! 1. **Fresh snapshot** (age ≤ 25 days) — `high` confidence up to
//!    14 days, `medium` after.
//! 2. **Stale snapshot** (25–60 days) — attempts the emergency fetch
//!    as a rescue; if that also fails, serves the stale value at `low`
//!    confidence with an explicit staleness warning. Never returns
//!    nothing if any prior data exists.
//! 3. **Emergency real-time fetch** — point lookup for the single HS
//!    code, `medium` confidence; successful fetches are written back
//!    to the snapshot cache (best effort).
//! 4. **Static reference table** — `critical_review_required`; if even
//!    that is absent, a zero rate at `critical_review_required` with an
//!    explicit manual-verification notice. The system never claims
//!    certainty it does not have.
//!
//! A fifth error state (zero rate, `error` confidence) exists for the
//! composition layer: a panicked or aborted resolution task maps to it
//! rather than sinking the batch it was part of.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tti_core::{normalize_hs_code, normalize_rate, validate_surcharge, Confidence, SourceTier};
use tti_store::{PolicyCache, PolicyCacheRecord};

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ResearchError};
use crate::retry::retry_send;
use crate::types::ProviderKind;

/// Snapshot age bounds for the tier transitions, in days.
const FRESH_HIGH_MAX_DAYS: i64 = 14;
const FRESH_MAX_DAYS: i64 = 25;
const STALE_MAX_DAYS: i64 = 60;

/// A surcharge value from the emergency point-lookup capability.
#[derive(Debug, Clone, Deserialize)]
pub struct EmergencySurcharge {
    pub hs_code: String,
    /// Surcharge rate, raw; normalized by the resolver.
    pub section_301: f64,
    pub verified_date: DateTime<Utc>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// External emergency fetch capability: a bounded-latency point lookup
/// for one HS code, used only as a rescue path.
#[async_trait]
pub trait EmergencyFetch: Send + Sync {
    async fn fetch(&self, hs_code: &str) -> Result<EmergencySurcharge, ResearchError>;
}

/// HTTP implementation of the emergency fetch capability.
#[derive(Debug)]
pub struct HttpEmergencyFetch {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEmergencyFetch {
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        url::Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            provider: ProviderKind::Primary,
            reason: e.to_string(),
        })?;
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| ConfigError::InvalidApiKey {
                    provider: ProviderKind::Primary,
                })?,
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl EmergencyFetch for HttpEmergencyFetch {
    async fn fetch(&self, hs_code: &str) -> Result<EmergencySurcharge, ResearchError> {
        let url = format!("{}/v1/policy/section-301/{hs_code}", self.base_url);
        let resp = retry_send(|| self.http.get(&url).send())
            .await
            .map_err(|e| ResearchError::Transport {
                provider: ProviderKind::Primary,
                reason: e.to_string(),
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResearchError::NotFound {
                hs_code: hs_code.to_string(),
            });
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ResearchError::BadStatus {
                provider: ProviderKind::Primary,
                status,
                body,
            });
        }

        resp.json::<EmergencySurcharge>()
            .await
            .map_err(|e| ResearchError::UnparseableResponse {
                provider: ProviderKind::Primary,
                reason: e.to_string(),
            })
    }
}

/// Terminal output of the fallback chain: one surcharge contribution,
/// composed into the larger quote by the caller.
#[derive(Debug, Clone)]
pub struct SurchargeResolution {
    pub hs_code: String,
    /// Surcharge as a decimal fraction.
    pub rate: f64,
    pub confidence: Confidence,
    pub source_tier: SourceTier,
    /// Human-readable notes: staleness warnings, plausibility
    /// warnings, manual-verification notices.
    pub notes: Vec<String>,
}

impl SurchargeResolution {
    /// The error state: every tier failed outright. Zero rate, maximal
    /// severity, never silent.
    pub fn error(hs_code: &str, reason: impl Into<String>) -> Self {
        Self {
            hs_code: normalize_hs_code(hs_code),
            rate: 0.0,
            confidence: Confidence::Error,
            source_tier: SourceTier::Error,
            notes: vec![format!("surcharge resolution failed: {}", reason.into())],
        }
    }
}

/// The four-tier fallback chain for one volatile policy surcharge.
///
/// Collaborators are injected with an explicit lifecycle (construct →
/// use → dispose); there is no process-global cache.
pub struct PolicySurchargeResolver {
    policy_cache: Arc<dyn PolicyCache>,
    emergency: Arc<dyn EmergencyFetch>,
}

impl PolicySurchargeResolver {
    pub fn new(policy_cache: Arc<dyn PolicyCache>, emergency: Arc<dyn EmergencyFetch>) -> Self {
        Self {
            policy_cache,
            emergency,
        }
    }

    /// Resolve the surcharge for one HS code. Infallible by design:
    /// every failure degrades to a lower tier, terminating in the
    /// zero-rate critical-review result.
    pub async fn resolve(&self, hs_code: &str) -> SurchargeResolution {
        let hs_code = normalize_hs_code(hs_code);

        match self.policy_cache.get_policy(&hs_code).await {
            Some(snapshot) if snapshot.age_days() <= FRESH_MAX_DAYS => {
                self.from_fresh_snapshot(&hs_code, &snapshot)
            }
            Some(snapshot) if snapshot.age_days() <= STALE_MAX_DAYS => {
                // Tier 2: stale window. Try the emergency fetch as a
                // rescue before settling for the stale value.
                match self.emergency_lookup(&hs_code).await {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        tracing::warn!(
                            hs_code,
                            age_days = snapshot.age_days(),
                            "emergency rescue failed, serving stale surcharge snapshot: {e}"
                        );
                        self.from_stale_snapshot(&hs_code, &snapshot)
                    }
                }
            }
            _ => {
                // Cache miss, or a snapshot too old to serve at all.
                match self.emergency_lookup(&hs_code).await {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        tracing::warn!(hs_code, "emergency fetch failed, trying static fallback: {e}");
                        self.from_static_fallback(&hs_code).await
                    }
                }
            }
        }
    }

    /// Tier 1: fresh snapshot.
    fn from_fresh_snapshot(
        &self,
        hs_code: &str,
        snapshot: &PolicyCacheRecord,
    ) -> SurchargeResolution {
        let validation = validate_surcharge(snapshot.section_301);
        let confidence = if snapshot.age_days() <= FRESH_HIGH_MAX_DAYS {
            Confidence::High
        } else {
            Confidence::Medium
        };
        let mut notes = Vec::new();
        if let Some(warning) = validation.warning {
            notes.push(warning);
        }
        SurchargeResolution {
            hs_code: hs_code.to_string(),
            rate: validation.rate,
            confidence,
            source_tier: SourceTier::FreshCache,
            notes,
        }
    }

    /// Tier 2 terminal: stale snapshot after a failed rescue.
    fn from_stale_snapshot(
        &self,
        hs_code: &str,
        snapshot: &PolicyCacheRecord,
    ) -> SurchargeResolution {
        let validation = validate_surcharge(snapshot.section_301);
        let mut notes = vec![format!(
            "surcharge snapshot is {} days old and real-time verification failed — rate may not reflect current policy",
            snapshot.age_days()
        )];
        if let Some(warning) = validation.warning {
            notes.push(warning);
        }
        SurchargeResolution {
            hs_code: hs_code.to_string(),
            rate: validation.rate,
            confidence: Confidence::Low,
            source_tier: SourceTier::StaleCache,
            notes,
        }
    }

    /// Tier 3: emergency real-time point lookup, with best-effort
    /// write-back into the snapshot cache.
    async fn emergency_lookup(&self, hs_code: &str) -> Result<SurchargeResolution, ResearchError> {
        let fetched = self.emergency.fetch(hs_code).await?;
        let rate = normalize_rate(fetched.section_301);
        let validation = validate_surcharge(rate);

        self.policy_cache
            .put_policy(&PolicyCacheRecord {
                hs_code: hs_code.to_string(),
                section_301: validation.rate,
                verified_date: fetched.verified_date,
                expires_at: None,
                is_stale: false,
                data_source: "emergency_fetch".to_string(),
                source_url: fetched.source_url,
            })
            .await;

        let mut notes = Vec::new();
        if let Some(warning) = validation.warning {
            notes.push(warning);
        }
        Ok(SurchargeResolution {
            hs_code: hs_code.to_string(),
            rate: validation.rate,
            confidence: Confidence::Medium,
            source_tier: SourceTier::EmergencyFetch,
            notes,
        })
    }

    /// Tier 4: static reference table, or the explicit zero-rate
    /// worst case.
    async fn from_static_fallback(&self, hs_code: &str) -> SurchargeResolution {
        match self.policy_cache.get_static_rate(hs_code).await {
            Some(rate) => SurchargeResolution {
                hs_code: hs_code.to_string(),
                rate: normalize_rate(rate),
                confidence: Confidence::CriticalReviewRequired,
                source_tier: SourceTier::StaticFallback,
                notes: vec![
                    "surcharge served from long-lived static reference — manual verification recommended before filing".to_string(),
                ],
            },
            None => SurchargeResolution {
                hs_code: hs_code.to_string(),
                rate: 0.0,
                confidence: Confidence::CriticalReviewRequired,
                source_tier: SourceTier::StaticFallback,
                notes: vec![
                    "no surcharge data available from any source — manual verification required".to_string(),
                ],
            },
        }
    }
}
