//! In-memory cache store used by tests and database-less runs.

use std::collections::HashMap;
use std::sync::RwLock;

use ::async_trait::async_trait;
use chrono::Utc;
use rook_core::{CachedPlayer, FideId, MemberId, RatingPeriod, StoreError};

use crate::{CacheStore, StoreResult};

type Key = (MemberId, RatingPeriod);

/// `HashMap` backed [`CacheStore`] with the same lazy-expiry semantics as
/// the Postgres table.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    records: RwLock<HashMap<Key, CachedPlayer>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored rows, expired ones included.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw row lookup that ignores expiry.
    pub fn get_raw(&self, member_id: MemberId, period: RatingPeriod) -> Option<CachedPlayer> {
        self.records
            .read()
            .ok()
            .and_then(|r| r.get(&(member_id, period)).cloned())
    }

    /// Seed a row directly, bypassing nothing but the async interface.
    pub fn insert(&self, record: CachedPlayer) -> StoreResult<()> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        records.insert((record.member_id, record.period), record);
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(
        &self,
        member_id: MemberId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now();
        Ok(records
            .get(&(member_id, period))
            .filter(|r| r.is_live(now))
            .cloned())
    }

    async fn get_by_fide_id(
        &self,
        fide_id: FideId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now();
        Ok(records
            .values()
            .filter(|r| r.period == period && r.fide_id() == Some(fide_id.get()) && r.is_live(now))
            .max_by_key(|r| r.fetched_at)
            .cloned())
    }

    async fn get_batch(
        &self,
        member_ids: &[MemberId],
        period: RatingPeriod,
    ) -> StoreResult<HashMap<MemberId, CachedPlayer>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now();
        Ok(member_ids
            .iter()
            .filter_map(|id| records.get(&(*id, period)))
            .filter(|r| r.is_live(now))
            .map(|r| (r.member_id, r.clone()))
            .collect())
    }

    async fn get_range(
        &self,
        member_id: MemberId,
        periods: &[RatingPeriod],
    ) -> StoreResult<HashMap<RatingPeriod, CachedPlayer>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now();
        Ok(periods
            .iter()
            .filter_map(|p| records.get(&(member_id, *p)))
            .filter(|r| r.is_live(now))
            .map(|r| (r.period, r.clone()))
            .collect())
    }

    async fn save(&self, record: &CachedPlayer) -> StoreResult<()> {
        self.insert(record.clone())
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, r| r.expires_at.map_or(true, |at| at >= now));
        Ok((before - records.len()) as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.records
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeDelta};
    use rook_core::PlayerInfo;

    fn member(id: i32) -> MemberId {
        MemberId::new(id).unwrap()
    }

    fn period(y: i32, m: u32) -> RatingPeriod {
        RatingPeriod::containing(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
    }

    fn record(id: i32, p: RatingPeriod, expires_at: Option<DateTime<Utc>>) -> CachedPlayer {
        let payload: PlayerInfo = serde_json::from_value(serde_json::json!({
            "id": id,
            "firstName": "Test",
            "lastName": format!("Player{}", id),
            "fideid": id + 1_000_000
        }))
        .unwrap();
        CachedPlayer::new(member(id), p, payload, Utc::now(), expires_at)
    }

    #[tokio::test]
    async fn test_get_returns_live_record() {
        let store = InMemoryCacheStore::new();
        store.save(&record(1, period(2024, 6), None)).await.unwrap();

        let hit = store.get(member(1), period(2024, 6)).await.unwrap();
        assert_eq!(hit.map(|r| r.payload.id), Some(1));
        assert!(store.get(member(1), period(2024, 5)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_absent_but_is_kept() {
        let store = InMemoryCacheStore::new();
        let expired = Utc::now() - TimeDelta::minutes(1);
        store.save(&record(1, period(2024, 6), Some(expired))).await.unwrap();

        assert!(store.get(member(1), period(2024, 6)).await.unwrap().is_none());
        assert!(store.get_raw(member(1), period(2024, 6)).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites_same_key() {
        let store = InMemoryCacheStore::new();
        let mut first = record(1, period(2024, 6), None);
        store.save(&first).await.unwrap();
        first.payload.first_name = "Updated".to_string();
        store.save(&first).await.unwrap();

        assert_eq!(store.len(), 1);
        let hit = store.get(member(1), period(2024, 6)).await.unwrap().unwrap();
        assert_eq!(hit.payload.first_name, "Updated");
    }

    #[tokio::test]
    async fn test_get_batch_skips_missing_and_expired() {
        let store = InMemoryCacheStore::new();
        let p = period(2024, 6);
        store.save(&record(1, p, None)).await.unwrap();
        store
            .save(&record(2, p, Some(Utc::now() - TimeDelta::seconds(1))))
            .await
            .unwrap();
        store.save(&record(3, period(2024, 5), None)).await.unwrap();

        let found = store
            .get_batch(&[member(1), member(2), member(3), member(4)], p)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&member(1)));
    }

    #[tokio::test]
    async fn test_get_range_keys_by_period() {
        let store = InMemoryCacheStore::new();
        store.save(&record(1, period(2024, 1), None)).await.unwrap();
        store.save(&record(1, period(2024, 3), None)).await.unwrap();
        store.save(&record(2, period(2024, 2), None)).await.unwrap();

        let found = store
            .get_range(member(1), &[period(2024, 1), period(2024, 2), period(2024, 3)])
            .await
            .unwrap();
        let mut periods: Vec<_> = found.keys().copied().collect();
        periods.sort();
        assert_eq!(periods, vec![period(2024, 1), period(2024, 3)]);
    }

    #[tokio::test]
    async fn test_get_by_fide_id() {
        let store = InMemoryCacheStore::new();
        store.save(&record(7, period(2024, 6), None)).await.unwrap();

        let fide = FideId::new(1_000_007).unwrap();
        let hit = store.get_by_fide_id(fide, period(2024, 6)).await.unwrap();
        assert_eq!(hit.map(|r| r.member_id), Some(member(7)));
        assert!(store.get_by_fide_id(fide, period(2024, 7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_fide_id_prefers_most_recent_fetch() {
        let store = InMemoryCacheStore::new();
        let p = period(2024, 6);
        let now = Utc::now();
        let mut older = record(7, p, None);
        older.fetched_at = now - TimeDelta::hours(2);
        let mut newer = record(8, p, None);
        newer.payload.fide_id = older.payload.fide_id;
        newer.fetched_at = now - TimeDelta::minutes(5);
        let mut stale = record(9, p, None);
        stale.payload.fide_id = older.payload.fide_id;
        stale.fetched_at = now - TimeDelta::days(1);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        store.save(&stale).await.unwrap();

        let fide = FideId::new(1_000_007).unwrap();
        let hit = store.get_by_fide_id(fide, p).await.unwrap();
        assert_eq!(hit.map(|r| r.member_id), Some(member(8)));
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_and_historical_rows() {
        let store = InMemoryCacheStore::new();
        let p = period(2024, 6);
        store.save(&record(1, p, None)).await.unwrap();
        store
            .save(&record(2, p, Some(Utc::now() + TimeDelta::hours(1))))
            .await
            .unwrap();
        store
            .save(&record(3, p, Some(Utc::now() - TimeDelta::hours(1))))
            .await
            .unwrap();

        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get_raw(member(3), p).is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(InMemoryCacheStore::new().health_check().await.is_ok());
    }
}
