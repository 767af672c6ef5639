//! Async cache store trait.
//!
//! One persisted row per `(member_id, period)`. Reads only ever return
//! live rows; expired rows linger until the maintenance sweep removes them.

use std::collections::HashMap;

use ::async_trait::async_trait;
use rook_core::{CachedPlayer, FideId, MemberId, RatingPeriod, StoreError};

/// Result type for cache store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted snapshot cache keyed by member and rating period.
#[async_trait]
pub trait CacheStore: Send + Sync {
    // ========================================================================
    // READS (live rows only)
    // ========================================================================

    /// Live record for one member and period.
    async fn get(&self, member_id: MemberId, period: RatingPeriod)
        -> StoreResult<Option<CachedPlayer>>;

    /// Live record for the member whose payload carries `fide_id`.
    async fn get_by_fide_id(
        &self,
        fide_id: FideId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>>;

    /// Live records for many members in one period. Absent ids are simply missing.
    async fn get_batch(
        &self,
        member_ids: &[MemberId],
        period: RatingPeriod,
    ) -> StoreResult<HashMap<MemberId, CachedPlayer>>;

    /// Live records for one member across several periods.
    async fn get_range(
        &self,
        member_id: MemberId,
        periods: &[RatingPeriod],
    ) -> StoreResult<HashMap<RatingPeriod, CachedPlayer>>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert or overwrite the record for `(member_id, period)`.
    async fn save(&self, record: &CachedPlayer) -> StoreResult<()>;

    /// Physically remove expired rows. Returns the number removed.
    async fn delete_expired(&self) -> StoreResult<u64>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    async fn health_check(&self) -> StoreResult<()>;
}
