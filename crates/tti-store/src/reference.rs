//! Stable treaty-rate reference table.
//!
//! Serves database-strategy destinations (Mexico). Treaty rates carry
//! no operational TTL — rows never expire out of queries — but each
//! row's `updated_at` feeds the router's staleness grading.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;

use tti_core::normalize_hs_code;

/// One treaty reference row, keyed by 8-digit HTS code.
#[derive(Debug, Clone)]
pub struct TreatyRateRecord {
    pub hts8: String,
    pub description: Option<String>,
    /// General import duty as a decimal fraction.
    pub mfn_rate: f64,
    /// Preferential treaty rate as a decimal fraction.
    pub usmca_rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl TreatyRateRecord {
    /// Whole days since the row was last refreshed.
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.updated_at).num_days()
    }
}

/// Point lookup into the treaty reference table. Backend failures
/// surface as `None`.
#[async_trait]
pub trait TreatyReference: Send + Sync {
    async fn lookup(&self, hs_code: &str) -> Option<TreatyRateRecord>;
}

/// PostgreSQL-backed reference over `tariff_reference`.
#[derive(Debug, Clone)]
pub struct PgTreatyReference {
    pool: PgPool,
}

impl PgTreatyReference {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TreatyReference for PgTreatyReference {
    async fn lookup(&self, hs_code: &str) -> Option<TreatyRateRecord> {
        // The reference table keys on 8 digits; inbound codes may be
        // dotted or 10-digit.
        let hts8: String = normalize_hs_code(hs_code).chars().take(8).collect();

        let result = sqlx::query_as::<_, TreatyRow>(
            "SELECT hts8, description, mfn_rate, usmca_rate, updated_at
             FROM tariff_reference
             WHERE hts8 = $1",
        )
        .bind(&hts8)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.map(TreatyRow::into_record),
            Err(e) => {
                tracing::warn!(hs_code, "treaty reference read failed, treating as miss: {e}");
                None
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct TreatyRow {
    hts8: String,
    description: Option<String>,
    mfn_rate: f64,
    usmca_rate: f64,
    updated_at: DateTime<Utc>,
}

impl TreatyRow {
    fn into_record(self) -> TreatyRateRecord {
        TreatyRateRecord {
            hts8: self.hts8,
            description: self.description,
            mfn_rate: self.mfn_rate,
            usmca_rate: self.usmca_rate,
            updated_at: self.updated_at,
        }
    }
}

/// In-memory reference table for tests and DB-less deployments.
#[derive(Debug, Default)]
pub struct MemoryTreatyReference {
    rows: DashMap<String, TreatyRateRecord>,
}

impl MemoryTreatyReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TreatyRateRecord) {
        self.rows.insert(record.hts8.clone(), record);
    }
}

#[async_trait]
impl TreatyReference for MemoryTreatyReference {
    async fn lookup(&self, hs_code: &str) -> Option<TreatyRateRecord> {
        let hts8: String = normalize_hs_code(hs_code).chars().take(8).collect();
        self.rows.get(&hts8).map(|r| r.value().clone())
    }
}
