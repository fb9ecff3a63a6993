//! Policy surcharge cache and static fallback table.
//!
//! The snapshot cache (`policy_surcharge_cache`) is populated by an
//! external periodic synchronization process; this stack reads it and
//! may supplement rows after a successful emergency fetch. Unlike the
//! rate cache, reads are NOT expiry-filtered: the surcharge resolver
//! serves 25–60-day-old snapshots at degraded confidence rather than
//! pretending they do not exist, so it needs to see stale rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;

/// One per-HS-code surcharge snapshot.
#[derive(Debug, Clone)]
pub struct PolicyCacheRecord {
    pub hs_code: String,
    /// Surcharge as a decimal fraction.
    pub section_301: f64,
    pub verified_date: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub data_source: String,
    pub source_url: Option<String>,
}

impl PolicyCacheRecord {
    /// Whole days since this snapshot was verified.
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.verified_date).num_days()
    }
}

/// Access to the surcharge snapshot cache and the static fallback
/// reference. Backend failures surface as `None` / no-ops.
#[async_trait]
pub trait PolicyCache: Send + Sync {
    /// Latest snapshot for the HS code, stale or not.
    async fn get_policy(&self, hs_code: &str) -> Option<PolicyCacheRecord>;

    /// Upsert a snapshot (emergency-fetch write-back). Best effort.
    async fn put_policy(&self, record: &PolicyCacheRecord);

    /// Tier-4 static fallback rate, if the HS code is listed.
    async fn get_static_rate(&self, hs_code: &str) -> Option<f64>;
}

// ─── PostgreSQL ──────────────────────────────────────────────────────────

/// PostgreSQL-backed policy cache over `policy_surcharge_cache` and
/// `policy_static_rates`.
#[derive(Debug, Clone)]
pub struct PgPolicyCache {
    pool: PgPool,
}

impl PgPolicyCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyCache for PgPolicyCache {
    async fn get_policy(&self, hs_code: &str) -> Option<PolicyCacheRecord> {
        let result = sqlx::query_as::<_, PolicyRow>(
            "SELECT hs_code, section_301, verified_date, expires_at, is_stale, data_source, source_url
             FROM policy_surcharge_cache
             WHERE hs_code = $1",
        )
        .bind(hs_code)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.map(PolicyRow::into_record),
            Err(e) => {
                tracing::warn!(hs_code, "policy cache read failed, treating as miss: {e}");
                None
            }
        }
    }

    async fn put_policy(&self, record: &PolicyCacheRecord) {
        let result = sqlx::query(
            "INSERT INTO policy_surcharge_cache
                (hs_code, section_301, verified_date, expires_at, is_stale, data_source, source_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (hs_code) DO UPDATE SET
                section_301 = EXCLUDED.section_301,
                verified_date = EXCLUDED.verified_date,
                expires_at = EXCLUDED.expires_at,
                is_stale = EXCLUDED.is_stale,
                data_source = EXCLUDED.data_source,
                source_url = EXCLUDED.source_url",
        )
        .bind(&record.hs_code)
        .bind(record.section_301)
        .bind(record.verified_date)
        .bind(record.expires_at)
        .bind(record.is_stale)
        .bind(&record.data_source)
        .bind(&record.source_url)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(hs_code = %record.hs_code, "policy cache write failed: {e}");
        }
    }

    async fn get_static_rate(&self, hs_code: &str) -> Option<f64> {
        let result = sqlx::query_as::<_, (f64,)>(
            "SELECT section_301 FROM policy_static_rates WHERE hs_code = $1",
        )
        .bind(hs_code)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.map(|(rate,)| rate),
            Err(e) => {
                tracing::warn!(hs_code, "static fallback read failed, treating as miss: {e}");
                None
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    hs_code: String,
    section_301: f64,
    verified_date: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_stale: bool,
    data_source: String,
    source_url: Option<String>,
}

impl PolicyRow {
    fn into_record(self) -> PolicyCacheRecord {
        PolicyCacheRecord {
            hs_code: self.hs_code,
            section_301: self.section_301,
            verified_date: self.verified_date,
            expires_at: self.expires_at,
            is_stale: self.is_stale,
            data_source: self.data_source,
            source_url: self.source_url,
        }
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────

/// In-memory policy cache for tests and DB-less deployments.
#[derive(Debug, Default)]
pub struct MemoryPolicyCache {
    snapshots: DashMap<String, PolicyCacheRecord>,
    static_rates: DashMap<String, f64>,
}

impl MemoryPolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a static fallback rate.
    pub fn insert_static(&self, hs_code: &str, section_301: f64) {
        self.static_rates.insert(hs_code.to_string(), section_301);
    }
}

#[async_trait]
impl PolicyCache for MemoryPolicyCache {
    async fn get_policy(&self, hs_code: &str) -> Option<PolicyCacheRecord> {
        self.snapshots.get(hs_code).map(|r| r.value().clone())
    }

    async fn put_policy(&self, record: &PolicyCacheRecord) {
        self.snapshots.insert(record.hs_code.clone(), record.clone());
    }

    async fn get_static_rate(&self, hs_code: &str) -> Option<f64> {
        self.static_rates.get(hs_code).map(|r| *r.value())
    }
}
