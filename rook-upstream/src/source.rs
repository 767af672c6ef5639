//! The upstream player source seam.

use ::async_trait::async_trait;
use chrono::NaiveDate;
use rook_core::{FideId, MemberId, PlayerInfo, RequestContext, RookResult};

/// Read-only access to the member API.
///
/// Implementations honor the caller's deadline and surface failures as
/// `RookError::Upstream` or `RookError::Cancelled`.
#[async_trait]
pub trait PlayerSource: Send + Sync {
    /// Snapshot of a member as of `date`.
    async fn fetch_player(
        &self,
        ctx: &RequestContext,
        member_id: MemberId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo>;

    /// Snapshot of the member registered under a FIDE id.
    async fn fetch_player_by_fide_id(
        &self,
        ctx: &RequestContext,
        fide_id: FideId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo>;

    /// Name search. Never cached.
    async fn search_players(
        &self,
        ctx: &RequestContext,
        first_name: &str,
        last_name: &str,
    ) -> RookResult<Vec<PlayerInfo>>;
}
