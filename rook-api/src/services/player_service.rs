//! Cache-aside orchestration for player snapshots.
//!
//! Every lookup normalizes the requested date to its rating period, reads
//! the cache store, fetches only what is missing from the upstream source,
//! stamps an expiry (historical periods never expire, the current one gets
//! the configured TTL) and writes the result back.
//!
//! Cache faults never fail a request: a failed read is a miss and a failed
//! write is logged. Upstream failures fail single lookups, are reported per
//! id in batches, and skip the period in rating history.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use rook_core::{
    CacheConfig, CachedPlayer, ExpiryPolicy, FideId, MemberId, PlayerError, PlayerInfo,
    PlayersResponse, RatingHistoryResponse, RatingPeriod, RatingSnapshot, RequestContext,
    RookError, RookResult,
};
use rook_storage::CacheStore;
use rook_upstream::PlayerSource;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::telemetry::{LookupOutcome, ServiceMetrics};

/// Cache-aside front for the upstream member API.
#[derive(Clone)]
pub struct PlayerService {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn PlayerSource>,
    config: CacheConfig,
    expiry: ExpiryPolicy,
    metrics: Arc<ServiceMetrics>,
}

impl PlayerService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn PlayerSource>,
        config: CacheConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let expiry = config.expiry();
        Self {
            store,
            source,
            config,
            expiry,
            metrics,
        }
    }

    // ========================================================================
    // SINGLE LOOKUPS
    // ========================================================================

    /// Snapshot of `member_id` for the period containing `date`.
    ///
    /// # Errors
    ///
    /// Upstream failures and deadline expiry propagate; cache faults do not.
    pub async fn get_player(
        &self,
        ctx: &RequestContext,
        member_id: MemberId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo> {
        const OP: &str = "get_player";
        let period = RatingPeriod::containing(date);

        let cached = ctx.run("cache lookup", self.store.get(member_id, period)).await;
        if let Some(record) = self.observe_lookup(OP, cached, member_id, period)? {
            tracing::debug!(%member_id, %period, "Cache hit");
            return Ok(record.payload);
        }

        tracing::debug!(%member_id, %period, "Cache miss, fetching from upstream");
        let started = Instant::now();
        let fetched = ctx
            .run("upstream fetch", self.source.fetch_player(ctx, member_id, date))
            .await;
        self.metrics.record_fetch(OP, fetched.is_ok(), started.elapsed());
        let player = fetched?;

        let now = Utc::now();
        let record = CachedPlayer::new(
            member_id,
            period,
            player.clone(),
            now,
            self.expiry.expires_at(period, now),
        );
        persist(self.store.as_ref(), &self.metrics, ctx, &record).await;

        Ok(player)
    }

    /// Snapshot of the member registered under `fide_id`.
    ///
    /// The fetched record is cached under the member id the upstream reports,
    /// so later member-id lookups hit the same row.
    pub async fn get_player_by_fide_id(
        &self,
        ctx: &RequestContext,
        fide_id: FideId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo> {
        const OP: &str = "get_player_by_fide_id";
        let period = RatingPeriod::containing(date);

        let cached = ctx
            .run("cache lookup", self.store.get_by_fide_id(fide_id, period))
            .await;
        if let Some(record) = self.observe_lookup(OP, cached, fide_id, period)? {
            tracing::debug!(%fide_id, %period, "Cache hit by FIDE id");
            return Ok(record.payload);
        }

        let started = Instant::now();
        let fetched = ctx
            .run(
                "upstream fetch",
                self.source.fetch_player_by_fide_id(ctx, fide_id, date),
            )
            .await;
        self.metrics.record_fetch(OP, fetched.is_ok(), started.elapsed());
        let player = fetched?;

        match MemberId::new(player.id) {
            Ok(member_id) => {
                let now = Utc::now();
                let record = CachedPlayer::new(
                    member_id,
                    period,
                    player.clone(),
                    now,
                    self.expiry.expires_at(period, now),
                );
                persist(self.store.as_ref(), &self.metrics, ctx, &record).await;
            }
            Err(_) => {
                tracing::warn!(
                    %fide_id,
                    upstream_id = player.id,
                    "Upstream player has no usable member id, not caching"
                );
            }
        }

        Ok(player)
    }

    // ========================================================================
    // BATCH LOOKUP
    // ========================================================================

    /// Snapshots for many members in one period.
    ///
    /// Misses are fetched concurrently. A failed fetch becomes an entry in
    /// `errors` and never aborts the others. `players` follows the order of
    /// `member_ids`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty or oversized id list (before any I/O),
    /// `Cancelled` when the request deadline passes while fetching.
    pub async fn get_players(
        &self,
        ctx: &RequestContext,
        member_ids: &[MemberId],
        date: NaiveDate,
    ) -> RookResult<PlayersResponse> {
        const OP: &str = "get_players";
        self.validate_batch(member_ids)?;
        let period = RatingPeriod::containing(date);

        let mut found: HashMap<MemberId, PlayerInfo> = match ctx
            .run("cache batch lookup", self.store.get_batch(member_ids, period))
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|(id, record)| (id, record.payload))
                .collect(),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, %period, "Cache batch lookup failed, fetching all");
                self.metrics.record_lookup(OP, LookupOutcome::Error);
                HashMap::new()
            }
        };

        let mut seen = HashSet::new();
        let missing: Vec<MemberId> = member_ids
            .iter()
            .copied()
            .filter(|id| !found.contains_key(id) && seen.insert(*id))
            .collect();

        for _ in member_ids.iter().filter(|id| found.contains_key(id)) {
            self.metrics.record_lookup(OP, LookupOutcome::Hit);
        }

        let mut failures: HashMap<MemberId, RookError> = HashMap::new();
        if !missing.is_empty() {
            tracing::debug!(
                %period,
                requested = member_ids.len(),
                missing = missing.len(),
                "Fetching batch misses"
            );
            let (fetched, failed) = self.fetch_missing(ctx, &missing, date, period).await;
            found.extend(fetched);
            failures = failed;
        }

        if let Some(cancelled) = failures.values().find(|e| e.is_cancelled()) {
            return Err(cancelled.clone());
        }

        let players = member_ids
            .iter()
            .filter_map(|id| found.get(id).cloned())
            .collect();
        let mut reported = HashSet::new();
        let errors = member_ids
            .iter()
            .filter(|id| reported.insert(**id))
            .filter_map(|id| failures.get(id).map(|e| PlayerError::new(*id, e)))
            .collect();

        Ok(PlayersResponse { players, errors })
    }

    /// One task per missing id; all share a single expiry stamp.
    async fn fetch_missing(
        &self,
        ctx: &RequestContext,
        missing: &[MemberId],
        date: NaiveDate,
        period: RatingPeriod,
    ) -> (HashMap<MemberId, PlayerInfo>, HashMap<MemberId, RookError>) {
        let expires_at = self.expiry.expires_at(period, Utc::now());
        let permits = Arc::new(Semaphore::new(self.config.fetch_concurrency.max(1)));

        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(missing.len());
        for &member_id in missing {
            let job = BatchFetch {
                store: Arc::clone(&self.store),
                source: Arc::clone(&self.source),
                metrics: Arc::clone(&self.metrics),
                permits: Arc::clone(&permits),
                ctx: *ctx,
                member_id,
                date,
                period,
                expires_at,
            };
            let handle = tasks.spawn(job.run());
            owners.insert(handle.id(), member_id);
        }

        let mut fetched = HashMap::with_capacity(missing.len());
        let mut failed = HashMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (member_id, Ok(player)))) => {
                    fetched.insert(member_id, player);
                }
                Ok((_, (member_id, Err(e)))) => {
                    tracing::warn!(%member_id, %period, error = %e, "Batch fetch failed");
                    failed.insert(member_id, e);
                }
                Err(join_error) => {
                    let Some(member_id) = owners.get(&join_error.id()).copied() else {
                        tracing::error!(
                            error = %join_error,
                            "Batch fetch task failed with unknown owner"
                        );
                        continue;
                    };
                    tracing::error!(%member_id, error = %join_error, "Batch fetch task aborted");
                    failed.insert(
                        member_id,
                        RookError::internal(format!("fetch task failed: {}", join_error)),
                    );
                }
            }
        }

        // Every missing id ends up in exactly one of the two maps.
        for member_id in missing {
            if !fetched.contains_key(member_id) && !failed.contains_key(member_id) {
                failed.insert(
                    *member_id,
                    RookError::internal("fetch task finished without a result"),
                );
            }
        }

        (fetched, failed)
    }

    fn validate_batch(&self, member_ids: &[MemberId]) -> RookResult<()> {
        if member_ids.is_empty() {
            return Err(RookError::invalid_input("at least one member id is required"));
        }
        if member_ids.len() > self.config.max_batch_size {
            return Err(RookError::invalid_input(format!(
                "too many ids: {} requested, maximum is {}",
                member_ids.len(),
                self.config.max_batch_size
            )));
        }
        Ok(())
    }

    // ========================================================================
    // RATING HISTORY
    // ========================================================================

    /// One snapshot per month from `from` to `to`, newest first.
    ///
    /// Missing months are fetched one at a time. A month the upstream cannot
    /// serve is left out of the result.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `from` is after `to` or the range is wider than
    /// `max_history_months`; `Cancelled` at the request deadline.
    pub async fn get_rating_history(
        &self,
        ctx: &RequestContext,
        member_id: MemberId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RookResult<RatingHistoryResponse> {
        const OP: &str = "get_rating_history";
        if from > to {
            return Err(RookError::invalid_input(format!(
                "from ({}) must not be after to ({})",
                from, to
            )));
        }
        let span = RatingPeriod::count_between(from, to);
        if span > self.config.max_history_months {
            return Err(RookError::invalid_input(format!(
                "range covers {} months, maximum is {}",
                span, self.config.max_history_months
            )));
        }

        let periods = RatingPeriod::expand(from, to);
        let mut found: HashMap<RatingPeriod, PlayerInfo> = match ctx
            .run("cache range lookup", self.store.get_range(member_id, &periods))
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|(period, record)| (period, record.payload))
                .collect(),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::error!(%member_id, error = %e, "Cache range lookup failed, fetching all");
                self.metrics.record_lookup(OP, LookupOutcome::Error);
                HashMap::new()
            }
        };

        for period in &periods {
            if found.contains_key(period) {
                self.metrics.record_lookup(OP, LookupOutcome::Hit);
                continue;
            }
            self.metrics.record_lookup(OP, LookupOutcome::Miss);

            let started = Instant::now();
            let fetched = ctx
                .run(
                    "upstream fetch",
                    self.source.fetch_player(ctx, member_id, period.start()),
                )
                .await;
            self.metrics.record_fetch(OP, fetched.is_ok(), started.elapsed());

            match fetched {
                Ok(player) => {
                    let now = Utc::now();
                    let record = CachedPlayer::new(
                        member_id,
                        *period,
                        player.clone(),
                        now,
                        self.expiry.expires_at(*period, now),
                    );
                    persist(self.store.as_ref(), &self.metrics, ctx, &record).await;
                    found.insert(*period, player);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(%member_id, %period, error = %e, "Skipping unavailable period");
                }
            }
        }

        let ratings = periods
            .iter()
            .rev()
            .filter_map(|period| {
                found.remove(period).map(|player| RatingSnapshot {
                    period: *period,
                    player,
                })
            })
            .collect();

        Ok(RatingHistoryResponse {
            player_id: member_id,
            ratings,
        })
    }

    // ========================================================================
    // PASS-THROUGH
    // ========================================================================

    /// Upstream name search. Results are not cached.
    pub async fn search_players(
        &self,
        ctx: &RequestContext,
        first_name: &str,
        last_name: &str,
    ) -> RookResult<Vec<PlayerInfo>> {
        let (first_name, last_name) = (first_name.trim(), last_name.trim());
        if first_name.is_empty() || last_name.is_empty() {
            return Err(RookError::invalid_input(
                "both first and last name are required",
            ));
        }
        ctx.run(
            "upstream search",
            self.source.search_players(ctx, first_name, last_name),
        )
        .await
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Turn a cache read into a hit or a miss. Only cancellation escapes.
    fn observe_lookup(
        &self,
        operation: &str,
        result: RookResult<Option<CachedPlayer>>,
        key: impl std::fmt::Display,
        period: RatingPeriod,
    ) -> RookResult<Option<CachedPlayer>> {
        match result {
            Ok(Some(record)) => {
                self.metrics.record_lookup(operation, LookupOutcome::Hit);
                Ok(Some(record))
            }
            Ok(None) => {
                self.metrics.record_lookup(operation, LookupOutcome::Miss);
                Ok(None)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::error!(%key, %period, error = %e, "Cache lookup failed, treating as miss");
                self.metrics.record_lookup(operation, LookupOutcome::Error);
                Ok(None)
            }
        }
    }
}

/// Upsert a fetched record. Failures are logged and swallowed.
async fn persist(
    store: &dyn CacheStore,
    metrics: &ServiceMetrics,
    ctx: &RequestContext,
    record: &CachedPlayer,
) {
    let result = ctx.run("cache save", store.save(record)).await;
    metrics.record_write(result.is_ok());
    if let Err(e) = result {
        tracing::warn!(
            member_id = %record.member_id,
            period = %record.period,
            error = %e,
            "Failed to cache player"
        );
    }
}

/// A single spawned fetch inside a batch.
struct BatchFetch {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn PlayerSource>,
    metrics: Arc<ServiceMetrics>,
    permits: Arc<Semaphore>,
    ctx: RequestContext,
    member_id: MemberId,
    date: NaiveDate,
    period: RatingPeriod,
    expires_at: Option<DateTime<Utc>>,
}

impl BatchFetch {
    async fn run(self) -> (MemberId, RookResult<PlayerInfo>) {
        let result = self.fetch_and_store().await;
        (self.member_id, result)
    }

    async fn fetch_and_store(&self) -> RookResult<PlayerInfo> {
        let _permit = self
            .ctx
            .run("fetch slot", async {
                self.permits
                    .acquire()
                    .await
                    .map_err(|e| RookError::internal(format!("fetch slots closed: {}", e)))
            })
            .await?;

        self.metrics.record_lookup("get_players", LookupOutcome::Miss);
        let started = Instant::now();
        let fetched = self
            .ctx
            .run(
                "upstream fetch",
                self.source.fetch_player(&self.ctx, self.member_id, self.date),
            )
            .await;
        self.metrics
            .record_fetch("get_players", fetched.is_ok(), started.elapsed());
        let player = fetched?;

        let record = CachedPlayer::new(
            self.member_id,
            self.period,
            player.clone(),
            Utc::now(),
            self.expires_at,
        );
        persist(self.store.as_ref(), &self.metrics, &self.ctx, &record).await;
        Ok(player)
    }
}
