//! TTL-bounded rate cache.
//!
//! Reads are filtered to non-expired rows; writes are idempotent
//! upserts on `(hs_code, destination_country)` so concurrent writers
//! for the same key simply race to the latest write. All data here is
//! re-verifiable, which is what makes last-write-wins acceptable.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sqlx::PgPool;

use tti_core::Confidence;

/// A non-expired cache row as returned to the router.
#[derive(Debug, Clone)]
pub struct CachedRate {
    pub hs_code: String,
    pub hs_description: Option<String>,
    pub base_mfn_rate: f64,
    pub section_301: f64,
    pub section_232: f64,
    pub usmca_rate: f64,
    pub confidence: Confidence,
    pub policy_adjustments: Vec<String>,
    pub data_source: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedRate {
    /// Whole days since this row was cached.
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.cached_at).num_days()
    }
}

/// Fields written on a fresh research result. Keys and TTL are
/// supplied at the call site.
#[derive(Debug, Clone)]
pub struct RateCacheEntry {
    pub origin_country: String,
    pub destination_country: String,
    pub hs_code: String,
    pub hs_description: Option<String>,
    pub base_mfn_rate: f64,
    pub section_301: f64,
    pub section_232: f64,
    pub usmca_rate: f64,
    pub confidence: Confidence,
    pub policy_adjustments: Vec<String>,
    pub data_source: String,
}

/// Point get / upsert access to the rate cache.
///
/// Both operations absorb backend failures: `get` treats errors as
/// misses and `upsert` is best-effort, because a cache problem must
/// never fail the enrichment it was meant to speed up.
#[async_trait]
pub trait RateCache: Send + Sync {
    /// Non-expired row for the key, or `None` on miss or error.
    async fn get(&self, origin: &str, destination: &str, hs_code: &str) -> Option<CachedRate>;

    /// Write a fresh result with `expires_at = now + ttl_hours`.
    /// Last write wins on conflict.
    async fn upsert(&self, entry: &RateCacheEntry, ttl_hours: i64);
}

// ─── PostgreSQL ──────────────────────────────────────────────────────────

/// PostgreSQL-backed rate cache over `tariff_rates_cache`.
#[derive(Debug, Clone)]
pub struct PgRateCache {
    pool: PgPool,
}

impl PgRateCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateCache for PgRateCache {
    async fn get(&self, origin: &str, destination: &str, hs_code: &str) -> Option<CachedRate> {
        let result = sqlx::query_as::<_, CachedRateRow>(
            "SELECT hs_code, hs_description, base_mfn_rate, section_301, section_232,
                    usmca_rate, confidence, policy_adjustments, data_source, cached_at, expires_at
             FROM tariff_rates_cache
             WHERE origin_country = $1 AND destination_country = $2 AND hs_code = $3
               AND expires_at >= now()
             ORDER BY cached_at DESC
             LIMIT 1",
        )
        .bind(origin)
        .bind(destination)
        .bind(hs_code)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.map(CachedRateRow::into_cached),
            Err(e) => {
                tracing::warn!(
                    origin, destination, hs_code,
                    "rate cache read failed, treating as miss: {e}"
                );
                None
            }
        }
    }

    async fn upsert(&self, entry: &RateCacheEntry, ttl_hours: i64) {
        let adjustments = serde_json::to_value(&entry.policy_adjustments)
            .unwrap_or_else(|_| serde_json::json!([]));
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tariff_rates_cache
                (origin_country, destination_country, hs_code, hs_description,
                 base_mfn_rate, section_301, section_232, usmca_rate,
                 confidence, policy_adjustments, data_source,
                 cache_ttl_hours, cached_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (hs_code, destination_country) DO UPDATE SET
                origin_country = EXCLUDED.origin_country,
                hs_description = EXCLUDED.hs_description,
                base_mfn_rate = EXCLUDED.base_mfn_rate,
                section_301 = EXCLUDED.section_301,
                section_232 = EXCLUDED.section_232,
                usmca_rate = EXCLUDED.usmca_rate,
                confidence = EXCLUDED.confidence,
                policy_adjustments = EXCLUDED.policy_adjustments,
                data_source = EXCLUDED.data_source,
                cache_ttl_hours = EXCLUDED.cache_ttl_hours,
                cached_at = EXCLUDED.cached_at,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(&entry.origin_country)
        .bind(&entry.destination_country)
        .bind(&entry.hs_code)
        .bind(&entry.hs_description)
        .bind(entry.base_mfn_rate)
        .bind(entry.section_301)
        .bind(entry.section_232)
        .bind(entry.usmca_rate)
        .bind(entry.confidence.to_string())
        .bind(&adjustments)
        .bind(&entry.data_source)
        .bind(ttl_hours)
        .bind(now)
        .bind(now + Duration::hours(ttl_hours))
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(
                hs_code = %entry.hs_code,
                destination = %entry.destination_country,
                "rate cache write failed (enrichment continues): {e}"
            );
        }
    }
}

#[derive(sqlx::FromRow)]
struct CachedRateRow {
    hs_code: String,
    hs_description: Option<String>,
    base_mfn_rate: f64,
    section_301: f64,
    section_232: f64,
    usmca_rate: f64,
    confidence: String,
    policy_adjustments: serde_json::Value,
    data_source: String,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CachedRateRow {
    fn into_cached(self) -> CachedRate {
        CachedRate {
            hs_code: self.hs_code,
            hs_description: self.hs_description,
            base_mfn_rate: self.base_mfn_rate,
            section_301: self.section_301,
            section_232: self.section_232,
            usmca_rate: self.usmca_rate,
            confidence: parse_confidence(&self.confidence),
            policy_adjustments: serde_json::from_value(self.policy_adjustments)
                .unwrap_or_default(),
            data_source: self.data_source,
            cached_at: self.cached_at,
            expires_at: self.expires_at,
        }
    }
}

fn parse_confidence(s: &str) -> Confidence {
    match s {
        "high" => Confidence::High,
        "medium" => Confidence::Medium,
        "low" => Confidence::Low,
        "critical_review_required" => Confidence::CriticalReviewRequired,
        "error" => Confidence::Error,
        other => {
            tracing::warn!(value = other, "unrecognized confidence in cache row, defaulting to medium");
            Confidence::Medium
        }
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────

/// In-memory rate cache with the same expiry and upsert semantics as
/// the PostgreSQL backend. Used in tests and DB-less deployments.
#[derive(Debug, Default)]
pub struct MemoryRateCache {
    rows: DashMap<(String, String), (String, CachedRate)>,
}

impl MemoryRateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row with an explicit `cached_at`, for tests exercising
    /// cache-age behavior.
    pub fn insert_raw(&self, origin: &str, destination: &str, row: CachedRate) {
        self.rows.insert(
            (row.hs_code.clone(), destination.to_string()),
            (origin.to_string(), row),
        );
    }
}

#[async_trait]
impl RateCache for MemoryRateCache {
    async fn get(&self, origin: &str, destination: &str, hs_code: &str) -> Option<CachedRate> {
        let key = (hs_code.to_string(), destination.to_string());
        let entry = self.rows.get(&key)?;
        let (row_origin, row) = entry.value();
        if row_origin != origin || row.expires_at < Utc::now() {
            return None;
        }
        Some(row.clone())
    }

    async fn upsert(&self, entry: &RateCacheEntry, ttl_hours: i64) {
        let now = Utc::now();
        let row = CachedRate {
            hs_code: entry.hs_code.clone(),
            hs_description: entry.hs_description.clone(),
            base_mfn_rate: entry.base_mfn_rate,
            section_301: entry.section_301,
            section_232: entry.section_232,
            usmca_rate: entry.usmca_rate,
            confidence: entry.confidence,
            policy_adjustments: entry.policy_adjustments.clone(),
            data_source: entry.data_source.clone(),
            cached_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        };
        self.rows.insert(
            (entry.hs_code.clone(), entry.destination_country.clone()),
            (entry.origin_country.clone(), row),
        );
    }
}
