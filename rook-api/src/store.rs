//! Postgres-backed cache store.
//!
//! Reads always filter `expires_at IS NULL OR expires_at > NOW()`; writes are
//! `INSERT .. ON CONFLICT (member_id, rating_date) DO UPDATE`, so concurrent
//! misses for the same key converge on one row.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rook_core::{CachedPlayer, FideId, MemberId, PlayerInfo, RatingPeriod, StoreError};
use rook_storage::{CacheStore, StoreResult};
use tokio_postgres::Row;

use crate::db::{query_error, serialization_error, DbClient};

const SELECT_COLUMNS: &str = "member_id, rating_date, data, fetched_at, expires_at";

const LIVE: &str = "(expires_at IS NULL OR expires_at > NOW())";

const UPSERT_SQL: &str = "\
INSERT INTO player_cache (
    member_id, rating_date, first_name, last_name, club, club_id, fide_id,
    elo_standard, elo_rapid, elo_blitz, lask_rating, data, fetched_at, expires_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
ON CONFLICT (member_id, rating_date) DO UPDATE SET
    first_name = EXCLUDED.first_name,
    last_name = EXCLUDED.last_name,
    club = EXCLUDED.club,
    club_id = EXCLUDED.club_id,
    fide_id = EXCLUDED.fide_id,
    elo_standard = EXCLUDED.elo_standard,
    elo_rapid = EXCLUDED.elo_rapid,
    elo_blitz = EXCLUDED.elo_blitz,
    lask_rating = EXCLUDED.lask_rating,
    data = EXCLUDED.data,
    fetched_at = EXCLUDED.fetched_at,
    expires_at = EXCLUDED.expires_at";

const DELETE_EXPIRED_SQL: &str =
    "DELETE FROM player_cache WHERE expires_at IS NOT NULL AND expires_at < NOW()";

/// [`CacheStore`] over the shared deadpool-postgres pool.
#[derive(Clone)]
pub struct PgCacheStore {
    db: DbClient,
}

impl PgCacheStore {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(
        &self,
        member_id: MemberId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>> {
        let conn = self.db.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM player_cache WHERE member_id = $1 AND rating_date = $2 AND {}",
            SELECT_COLUMNS, LIVE
        );
        let row = conn
            .query_opt(sql.as_str(), &[&member_id.get(), &period.start()])
            .await
            .map_err(query_error)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_by_fide_id(
        &self,
        fide_id: FideId,
        period: RatingPeriod,
    ) -> StoreResult<Option<CachedPlayer>> {
        let conn = self.db.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM player_cache WHERE fide_id = $1 AND rating_date = $2 AND {} \
             ORDER BY fetched_at DESC LIMIT 1",
            SELECT_COLUMNS, LIVE
        );
        let row = conn
            .query_opt(sql.as_str(), &[&fide_id.get(), &period.start()])
            .await
            .map_err(query_error)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_batch(
        &self,
        member_ids: &[MemberId],
        period: RatingPeriod,
    ) -> StoreResult<HashMap<MemberId, CachedPlayer>> {
        if member_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.db.get_conn().await?;
        let ids: Vec<i32> = member_ids.iter().map(|id| id.get()).collect();
        let sql = format!(
            "SELECT {} FROM player_cache WHERE member_id = ANY($1) AND rating_date = $2 AND {}",
            SELECT_COLUMNS, LIVE
        );
        let rows = conn
            .query(sql.as_str(), &[&ids, &period.start()])
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| row_to_record(row).map(|r| (r.member_id, r)))
            .collect()
    }

    async fn get_range(
        &self,
        member_id: MemberId,
        periods: &[RatingPeriod],
    ) -> StoreResult<HashMap<RatingPeriod, CachedPlayer>> {
        if periods.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.db.get_conn().await?;
        let dates: Vec<NaiveDate> = periods.iter().map(|p| p.start()).collect();
        let sql = format!(
            "SELECT {} FROM player_cache WHERE member_id = $1 AND rating_date = ANY($2) AND {}",
            SELECT_COLUMNS, LIVE
        );
        let rows = conn
            .query(sql.as_str(), &[&member_id.get(), &dates])
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| row_to_record(row).map(|r| (r.period, r)))
            .collect()
    }

    async fn save(&self, record: &CachedPlayer) -> StoreResult<()> {
        let conn = self.db.get_conn().await?;
        let fields = record.payload.denormalized();
        let data = serde_json::to_value(&record.payload).map_err(serialization_error)?;

        conn.execute(
            UPSERT_SQL,
            &[
                &record.member_id.get(),
                &record.period.start(),
                &fields.first_name,
                &fields.last_name,
                &fields.club,
                &fields.club_id,
                &fields.fide_id,
                &fields.elo_standard,
                &fields.elo_rapid,
                &fields.elo_blitz,
                &fields.lask_rating,
                &data,
                &record.fetched_at,
                &record.expires_at,
            ],
        )
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let conn = self.db.get_conn().await?;
        conn.execute(DELETE_EXPIRED_SQL, &[]).await.map_err(query_error)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.db.health_check().await.map(|_| ())
    }
}

fn row_to_record(row: &Row) -> StoreResult<CachedPlayer> {
    let member_id: i32 = row.try_get("member_id").map_err(query_error)?;
    let rating_date: NaiveDate = row.try_get("rating_date").map_err(query_error)?;
    let data: serde_json::Value = row.try_get("data").map_err(query_error)?;
    let fetched_at: DateTime<Utc> = row.try_get("fetched_at").map_err(query_error)?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at").map_err(query_error)?;

    let member_id = MemberId::new(member_id).map_err(|e| StoreError::Serialization {
        reason: e.to_string(),
    })?;
    let payload: PlayerInfo = serde_json::from_value(data).map_err(serialization_error)?;

    Ok(CachedPlayer::new(
        member_id,
        RatingPeriod::containing(rating_date),
        payload,
        fetched_at,
        expires_at,
    ))
}
