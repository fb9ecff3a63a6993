//! # tti-store — Persistence Layer
//!
//! Provides the three persisted record families the duty-resolution
//! engine reads and writes, each behind an object-safe async trait so
//! the router and resolver never know which backing store they talk to:
//!
//! - [`cache::RateCache`] — TTL-bounded rate quotes keyed by
//!   `(origin, destination, hs_code)`, unique per
//!   `(hs_code, destination_country)`, last-write-wins upserts.
//! - [`policy::PolicyCache`] — per-HS-code policy surcharge snapshots
//!   maintained by an external synchronization process, plus the
//!   long-lived static fallback table.
//! - [`reference::TreatyReference`] — stable treaty rates for
//!   database-strategy destinations.
//!
//! ## Error Policy
//!
//! Store failures must never fail an enrichment. Read errors are
//! logged and surfaced as cache misses (`None`); writes are best
//! effort. [`StoreError`] exists only for pool initialization and
//! migrations, where failing fast is correct.
//!
//! ## Backends
//!
//! The PostgreSQL implementations use runtime SQLx queries with
//! `ON CONFLICT` upserts; expiry is enforced purely by query-time
//! filtering (`expires_at >= now()`) — nothing is ever deleted. The
//! in-memory implementations (dashmap) carry the same trait-level
//! semantics and back tests and DB-less deployments.

pub mod cache;
pub mod policy;
pub mod reference;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub use cache::{CachedRate, MemoryRateCache, PgRateCache, RateCache, RateCacheEntry};
pub use policy::{MemoryPolicyCache, PgPolicyCache, PolicyCache, PolicyCacheRecord};
pub use reference::{MemoryTreatyReference, PgTreatyReference, TreatyRateRecord, TreatyReference};

/// Errors from store initialization. Query-time errors never surface
/// through this type; see the crate-level error policy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connecting to PostgreSQL failed.
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),
    /// Applying embedded migrations failed.
    #[error("database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Initialize the connection pool and run embedded migrations.
///
/// Returns `None` when `DATABASE_URL` is not set — the stack then runs
/// on the in-memory stores, suitable for development and testing.
pub async fn init_pool() -> Result<Option<PgPool>, StoreError> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running on in-memory stores. \
                 Cached rates will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await
        .map_err(StoreError::Connect)?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
