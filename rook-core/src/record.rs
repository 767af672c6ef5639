//! Cached snapshot records and the expiry policy that stamps them.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{MemberId, PlayerInfo, RatingPeriod};

/// A persisted snapshot of one member at one rating period.
///
/// At most one record exists per `(member_id, period)`; saving again
/// overwrites payload and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPlayer {
    pub member_id: MemberId,
    pub period: RatingPeriod,
    pub payload: PlayerInfo,
    pub fetched_at: DateTime<Utc>,
    /// `None` marks a closed historical period that never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedPlayer {
    pub fn new(
        member_id: MemberId,
        period: RatingPeriod,
        payload: PlayerInfo,
        fetched_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            member_id,
            period,
            payload,
            fetched_at,
            expires_at,
        }
    }

    /// Live records are served from cache; expired ones read as absent.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }

    pub fn fide_id(&self) -> Option<i32> {
        self.payload.fide_id()
    }
}

/// Decides when a freshly fetched snapshot stops being served.
///
/// Periods before the current month are closed upstream and never expire.
/// The current month (or a future one) is still moving and gets the
/// configured TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    ttl: TimeDelta,
}

impl ExpiryPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Expiry for a record of `period` written at `now`.
    pub fn expires_at(&self, period: RatingPeriod, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if period < RatingPeriod::containing_instant(now) {
            return None;
        }
        Some(now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn player(id: i32) -> PlayerInfo {
        serde_json::from_value(serde_json::json!({ "id": id, "firstName": "T", "lastName": "P" }))
            .unwrap()
    }

    fn record(expires_at: Option<DateTime<Utc>>) -> CachedPlayer {
        CachedPlayer::new(
            MemberId::new(1).unwrap(),
            RatingPeriod::containing(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            player(1),
            Utc::now(),
            expires_at,
        )
    }

    #[test]
    fn test_record_without_expiry_is_always_live() {
        assert!(record(None).is_live(Utc::now() + TimeDelta::days(10_000)));
    }

    #[test]
    fn test_record_expires_strictly_after_deadline() {
        let at = Utc::now();
        let rec = record(Some(at));
        assert!(rec.is_live(at - TimeDelta::seconds(1)));
        assert!(!rec.is_live(at));
        assert!(!rec.is_live(at + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_historical_period_never_expires() {
        let policy = ExpiryPolicy::new(Duration::from_secs(86_400));
        let now = Utc::now();
        let last_year = NaiveDate::from_ymd_opt(now.year() - 1, now.month(), 1).unwrap();
        assert_eq!(policy.expires_at(RatingPeriod::containing(last_year), now), None);
    }

    #[test]
    fn test_current_period_gets_ttl() {
        let policy = ExpiryPolicy::new(Duration::from_secs(86_400));
        let now = Utc::now();
        let expires = policy.expires_at(RatingPeriod::containing_instant(now), now);
        assert_eq!(expires, Some(now + TimeDelta::seconds(86_400)));
    }

    #[test]
    fn test_future_period_gets_ttl() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        let now = Utc::now();
        let future = RatingPeriod::containing_instant(now).next().unwrap();
        assert_eq!(policy.expires_at(future, now), Some(now + TimeDelta::seconds(60)));
    }

    #[test]
    fn test_previous_month_boundary() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        let now = DateTime::parse_from_rfc3339("2024-07-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let june = RatingPeriod::containing(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        let july = RatingPeriod::containing(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(policy.expires_at(june, now), None);
        assert!(policy.expires_at(july, now).is_some());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let policy = ExpiryPolicy::new(Duration::from_secs(u64::MAX));
        let now = Utc::now();
        let expires = policy.expires_at(RatingPeriod::containing_instant(now), now);
        assert_eq!(expires, Some(DateTime::<Utc>::MAX_UTC));
    }
}
