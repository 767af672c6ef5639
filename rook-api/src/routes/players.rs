//! Player REST API Routes
//!
//! Thin handlers over [`PlayerService`]: parse path and query parameters,
//! open a request deadline, delegate, and serialize the result.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{Months, NaiveDate, Utc};
use rook_core::{parse_request_date, FideId, MemberId, RatingPeriod, RequestContext};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    services::PlayerService,
};

/// Months of history returned when the caller gives no range.
pub const DEFAULT_HISTORY_MONTHS: u32 = 12;

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared application state for player routes.
#[derive(Clone)]
pub struct PlayerState {
    pub service: Arc<PlayerService>,
    pub request_timeout: Duration,
}

impl PlayerState {
    pub fn new(service: Arc<PlayerService>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    fn context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    /// Comma-separated member ids.
    pub ids: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatingsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Number of months ending today. Takes precedence over `from` and `to`.
    pub months: Option<u32>,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /player/:id/date/:date - Snapshot for the month containing `date`
pub async fn get_player(
    State(state): State<Arc<PlayerState>>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let member_id: MemberId = id.parse()?;
    let date = parse_request_date(&date)?;

    let player = state
        .service
        .get_player(&state.context(), member_id, date)
        .await?;
    Ok(Json(player))
}

/// GET /player/:id - Snapshot for the current month
pub async fn get_current_player(
    State(state): State<Arc<PlayerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let member_id: MemberId = id.parse()?;

    let player = state
        .service
        .get_player(&state.context(), member_id, today())
        .await?;
    Ok(Json(player))
}

/// GET /player/fideid/:id/date/:date - Snapshot looked up by FIDE id
pub async fn get_player_by_fide_id(
    State(state): State<Arc<PlayerState>>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let fide_id: FideId = id.parse()?;
    let date = parse_request_date(&date)?;

    let player = state
        .service
        .get_player_by_fide_id(&state.context(), fide_id, date)
        .await?;
    Ok(Json(player))
}

/// GET /player/batch?ids=1,2,3&date=2024-06 - Snapshots for many members
pub async fn get_players(
    State(state): State<Arc<PlayerState>>,
    Query(query): Query<BatchQuery>,
) -> ApiResult<impl IntoResponse> {
    let raw_ids = query
        .ids
        .as_deref()
        .filter(|ids| !ids.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("ids"))?;
    let member_ids = MemberId::parse_list(raw_ids)?;
    let date = optional_date(query.date.as_deref())?.unwrap_or_else(today);

    let response = state
        .service
        .get_players(&state.context(), &member_ids, date)
        .await?;
    Ok(Json(response))
}

/// GET /player/:id/ratings?from=&to= | ?months=N - Monthly rating history
pub async fn get_rating_history(
    State(state): State<Arc<PlayerState>>,
    Path(id): Path<String>,
    Query(query): Query<RatingsQuery>,
) -> ApiResult<impl IntoResponse> {
    let member_id: MemberId = id.parse()?;
    let (from, to) = history_range(&query, today())?;

    let history = state
        .service
        .get_rating_history(&state.context(), member_id, from, to)
        .await?;
    Ok(Json(history))
}

/// GET /player/fornamn/:first/efternamn/:last - Upstream name search
pub async fn search_players(
    State(state): State<Arc<PlayerState>>,
    Path((first_name, last_name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let players = state
        .service
        .search_players(&state.context(), &first_name, &last_name)
        .await?;
    Ok(Json(players))
}

// ============================================================================
// HELPERS
// ============================================================================

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn optional_date(raw: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_request_date)
        .transpose()
        .map_err(ApiError::from)
}

/// Resolve the requested history window.
///
/// `months=N` selects the N months ending today and overrides `from`/`to`.
/// Otherwise `to` defaults to `today` and `from` to the 12 months ending at
/// `to`.
fn history_range(query: &RatingsQuery, today: NaiveDate) -> ApiResult<(NaiveDate, NaiveDate)> {
    if let Some(months) = query.months {
        return Ok((months_back(today, months)?, today));
    }

    let to = optional_date(query.to.as_deref())?.unwrap_or(today);
    let from = match optional_date(query.from.as_deref())? {
        Some(from) => from,
        None => months_back(to, DEFAULT_HISTORY_MONTHS)?,
    };
    Ok((from, to))
}

/// Start of the earliest period in the `months` periods ending at `to`.
fn months_back(to: NaiveDate, months: u32) -> ApiResult<NaiveDate> {
    if months == 0 {
        return Err(ApiError::invalid_range("months", "must be at least 1"));
    }
    RatingPeriod::containing(to)
        .start()
        .checked_sub_months(Months::new(months - 1))
        .ok_or_else(|| ApiError::invalid_range("months", "reaches before the supported calendar"))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the player router.
pub fn create_router(service: Arc<PlayerService>, request_timeout: Duration) -> Router {
    let state = Arc::new(PlayerState::new(service, request_timeout));

    Router::new()
        .route("/player/batch", get(get_players))
        .route("/player/fideid/:id/date/:date", get(get_player_by_fide_id))
        .route("/player/fornamn/:first/efternamn/:last", get(search_players))
        .route("/player/:id", get(get_current_player))
        .route("/player/:id/date/:date", get(get_player))
        .route("/player/:id/ratings", get(get_rating_history))
        .with_state(state)
}
