//! rook test utilities
//!
//! Shared test infrastructure for the rook workspace:
//! - Call-counting fakes for the upstream source and the cache store
//! - Fixtures for members, periods and player payloads
//! - Proptest generators for dates and ids

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use proptest::prelude::*;

pub use rook_core::{
    CachedPlayer, EloRating, FideId, LaskRating, MemberId, PlayerInfo, RatingPeriod,
    RequestContext, RookError, RookResult, StoreError, UpstreamError,
};
pub use rook_storage::{CacheStore, InMemoryCacheStore, StoreResult};
pub use rook_upstream::PlayerSource;

/// Fixture players carry FIDE id `member id + FIDE_OFFSET`.
pub const FIDE_OFFSET: i32 = 1_000_000;

// ============================================================================
// FIXTURES
// ============================================================================

pub fn member(id: i32) -> MemberId {
    MemberId::new(id).unwrap_or_else(|_| panic!("fixture member id must be positive: {}", id))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| panic!("invalid fixture date {}-{}-{}", year, month, day))
}

pub fn period(year: i32, month: u32) -> RatingPeriod {
    RatingPeriod::containing(date(year, month, 1))
}

/// Payload for member `id`, with the LASK rating dated `as_of`.
pub fn sample_player(id: i32, as_of: NaiveDate) -> PlayerInfo {
    PlayerInfo {
        id,
        first_name: format!("First{}", id),
        last_name: format!("Last{}", id),
        birthdate: Some("1990".to_string()),
        sex: 1,
        fide_id: Some(id + FIDE_OFFSET),
        country: Some("SWE".to_string()),
        club: Some("Stockholms SS".to_string()),
        club_id: Some(101),
        elo: Some(EloRating {
            rating: 2000 + id % 500,
            title: None,
            date: None,
            k: Some(20),
            rapid_rating: Some(1950),
            rapid_k: Some(20),
            blitz_rating: Some(1900),
            blitz_k: Some(20),
        }),
        lask: Some(LaskRating {
            rating: 1800 + id % 400,
            date: as_of.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        }),
    }
}

/// A cached row for `id` in `period` with the given expiry.
pub fn cached_player(
    id: i32,
    period: RatingPeriod,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> CachedPlayer {
    CachedPlayer::new(
        member(id),
        period,
        sample_player(id, period.start()),
        chrono::Utc::now(),
        expires_at,
    )
}

// ============================================================================
// UPSTREAM FAKE
// ============================================================================

/// [`PlayerSource`] stand-in that counts calls and fails on demand.
#[derive(Debug, Default)]
pub struct CountingSource {
    calls: AtomicUsize,
    fide_calls: AtomicUsize,
    search_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    failing_ids: HashSet<i32>,
    panicking_ids: HashSet<i32>,
    failing_dates: HashSet<NaiveDate>,
    fide_aliases: HashMap<i32, i32>,
    delay: Option<Duration>,
    requests: Mutex<Vec<(MemberId, NaiveDate)>>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches for these member ids answer with an upstream 500.
    pub fn failing_for(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.failing_ids.extend(ids);
        self
    }

    /// Fetches for these member ids panic, as a buggy decoder would.
    pub fn panicking_for(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.panicking_ids.extend(ids);
        self
    }

    /// Fetches dated exactly `date` answer with an upstream 500.
    pub fn failing_on(mut self, date: NaiveDate) -> Self {
        self.failing_dates.insert(date);
        self
    }

    /// Resolve `fide_id` to `member_id` for FIDE lookups. Unknown FIDE ids are 404.
    pub fn with_fide_alias(mut self, fide_id: i32, member_id: i32) -> Self {
        self.fide_aliases.insert(fide_id, member_id);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Member-id fetches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most member-id fetches ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn fide_calls(&self) -> usize {
        self.fide_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Every `(member, date)` pair requested, in call order.
    pub fn requests(&self) -> Vec<(MemberId, NaiveDate)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn simulated_failure(status: u16) -> RookError {
        UpstreamError::Status {
            status,
            body: "simulated failure".to_string(),
        }
        .into()
    }
}

/// Counts a fetch as running until dropped, unwinding included.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlayerSource for CountingSource {
    async fn fetch_player(
        &self,
        _ctx: &RequestContext,
        member_id: MemberId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((member_id, date));
        }
        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        self.simulate_latency().await;

        if self.panicking_ids.contains(&member_id.get()) {
            panic!("simulated fetch panic for member {}", member_id);
        }
        if self.failing_ids.contains(&member_id.get()) || self.failing_dates.contains(&date) {
            return Err(Self::simulated_failure(500));
        }
        Ok(sample_player(member_id.get(), date))
    }

    async fn fetch_player_by_fide_id(
        &self,
        _ctx: &RequestContext,
        fide_id: FideId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo> {
        self.fide_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let member_id = self
            .fide_aliases
            .get(&fide_id.get())
            .copied()
            .ok_or_else(|| Self::simulated_failure(404))?;
        let mut player = sample_player(member_id, date);
        player.fide_id = Some(fide_id.get());
        Ok(player)
    }

    async fn search_players(
        &self,
        _ctx: &RequestContext,
        first_name: &str,
        last_name: &str,
    ) -> RookResult<Vec<PlayerInfo>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let mut player = sample_player(1, date(2024, 1, 1));
        player.first_name = first_name.to_string();
        player.last_name = last_name.to_string();
        Ok(vec![player])
    }
}

// ============================================================================
// STORE FAKES
// ============================================================================

/// Wraps a [`CacheStore`] and counts reads and writes.
#[derive(Debug, Default)]
pub struct CountingStore<S = InMemoryCacheStore> {
    inner: S,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl<S: CacheStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: CacheStore> CacheStore for CountingStore<S> {
    async fn get(
        &self,
        member_id: MemberId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>> {
        self.read();
        self.inner.get(member_id, period).await
    }

    async fn get_by_fide_id(
        &self,
        fide_id: FideId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>> {
        self.read();
        self.inner.get_by_fide_id(fide_id, period).await
    }

    async fn get_batch(
        &self,
        member_ids: &[MemberId],
        period: RatingPeriod,
    ) -> StoreResult<HashMap<MemberId, CachedPlayer>> {
        self.read();
        self.inner.get_batch(member_ids, period).await
    }

    async fn get_range(
        &self,
        member_id: MemberId,
        periods: &[RatingPeriod],
    ) -> StoreResult<HashMap<RatingPeriod, CachedPlayer>> {
        self.read();
        self.inner.get_range(member_id, periods).await
    }

    async fn save(&self, record: &CachedPlayer) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record).await
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_expired().await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}

/// A cache store whose every operation fails, as during a database outage.
#[derive(Debug, Default)]
pub struct FailingCacheStore {
    calls: AtomicUsize,
}

impl FailingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Connection {
            reason: "simulated outage".to_string(),
        })
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _: MemberId, _: RatingPeriod) -> StoreResult<Option<CachedPlayer>> {
        self.fail()
    }

    async fn get_by_fide_id(&self, _: FideId, _: RatingPeriod) -> StoreResult<Option<CachedPlayer>> {
        self.fail()
    }

    async fn get_batch(
        &self,
        _: &[MemberId],
        _: RatingPeriod,
    ) -> StoreResult<HashMap<MemberId, CachedPlayer>> {
        self.fail()
    }

    async fn get_range(
        &self,
        _: MemberId,
        _: &[RatingPeriod],
    ) -> StoreResult<HashMap<RatingPeriod, CachedPlayer>> {
        self.fail()
    }

    async fn save(&self, _: &CachedPlayer) -> StoreResult<()> {
        self.fail()
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        self.fail()
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.fail()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Any calendar date within roughly five centuries of 2000-01-01.
pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (-200_000i64..200_000).prop_map(|offset| date(2000, 1, 1) + chrono::Duration::days(offset))
}

pub fn arb_member_id() -> impl Strategy<Value = MemberId> {
    (1i32..10_000_000).prop_map(member)
}

/// A non-empty list of distinct member ids, at most `max` long.
pub fn arb_member_ids(max: usize) -> impl Strategy<Value = Vec<MemberId>> {
    proptest::collection::hash_set(1i32..100_000, 1..=max.max(1))
        .prop_map(|ids| ids.into_iter().map(member).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_source_counts_and_fails() {
        let source = CountingSource::new().failing_for([2]);
        let ctx = RequestContext::with_timeout(Duration::from_secs(1));

        assert!(source.fetch_player(&ctx, member(1), date(2024, 6, 1)).await.is_ok());
        assert!(source.fetch_player(&ctx, member(2), date(2024, 6, 1)).await.is_err());
        assert_eq!(source.calls(), 2);
        assert_eq!(source.requests()[1], (member(2), date(2024, 6, 1)));
    }

    #[tokio::test]
    async fn test_counting_source_resolves_fide_aliases() {
        let source = CountingSource::new().with_fide_alias(1503014, 42);
        let ctx = RequestContext::with_timeout(Duration::from_secs(1));

        let fide = FideId::new(1503014).unwrap();
        let player = source.fetch_player_by_fide_id(&ctx, fide, date(2024, 6, 1)).await.unwrap();
        assert_eq!(player.id, 42);
        assert_eq!(player.fide_id, Some(1503014));

        let unknown = FideId::new(7).unwrap();
        let err = source.fetch_player_by_fide_id(&ctx, unknown, date(2024, 6, 1)).await.unwrap_err();
        assert!(matches!(err, RookError::Upstream(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_counting_source_tracks_peak_in_flight() {
        let source = CountingSource::new().with_delay(Duration::from_millis(20));
        let ctx = RequestContext::with_timeout(Duration::from_secs(1));

        let (a, b) = tokio::join!(
            source.fetch_player(&ctx, member(1), date(2024, 6, 1)),
            source.fetch_player(&ctx, member(2), date(2024, 6, 1)),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.peak_in_flight(), 2);

        source.fetch_player(&ctx, member(3), date(2024, 6, 1)).await.unwrap();
        assert_eq!(source.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_counting_store_tracks_reads_and_writes() {
        let store = CountingStore::new(InMemoryCacheStore::new());
        store.save(&cached_player(1, period(2024, 6), None)).await.unwrap();
        assert!(store.get(member(1), period(2024, 6)).await.unwrap().is_some());
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(store.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_store_always_fails() {
        let store = FailingCacheStore::new();
        assert!(store.get(member(1), period(2024, 6)).await.is_err());
        assert!(store.save(&cached_player(1, period(2024, 6), None)).await.is_err());
        assert_eq!(store.calls(), 2);
    }
}
