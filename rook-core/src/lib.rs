//! rook core types
//!
//! Identity newtypes, calendar-month rating periods, the upstream player
//! model, cached record and expiry policy, request deadlines and the error
//! taxonomy shared by every rook crate.

pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod period;
pub mod player;
pub mod record;
pub mod response;

pub use config::{
    CacheConfig, DEFAULT_CACHE_TTL, DEFAULT_FETCH_CONCURRENCY, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_MAX_HISTORY_MONTHS,
};
pub use context::RequestContext;
pub use error::{RookError, RookResult, StoreError, UpstreamError};
pub use identity::{FideId, MemberId};
pub use period::{parse_request_date, RatingPeriod};
pub use player::{parse_upstream_date, DenormalizedFields, EloRating, LaskRating, PlayerInfo};
pub use record::{CachedPlayer, ExpiryPolicy};
pub use response::{PlayerError, PlayersResponse, RatingHistoryResponse, RatingSnapshot};
