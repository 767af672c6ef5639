//! reqwest client for the member API.

use std::sync::Arc;

use ::async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use rook_core::{FideId, MemberId, PlayerInfo, RequestContext, RookResult, UpstreamError};
use serde::de::DeserializeOwned;

use crate::{PlayerSource, RequestLimiter, UpstreamConfig};

/// Longest upstream error body kept in an `UpstreamError::Status`.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Rate-limited HTTP client for the member API.
///
/// Cloning is cheap and clones share one token bucket.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RequestLimiter>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> RookResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| UpstreamError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(default_headers)
            .build()
            .map_err(|e| UpstreamError::Transport {
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            limiter: Arc::new(RequestLimiter::per_second(config.rate_limit)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rate-limited GET returning the raw body of a 2xx response.
    pub async fn get_raw(&self, ctx: &RequestContext, path: &str) -> RookResult<Vec<u8>> {
        self.limiter.acquire(ctx).await?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "Upstream request");

        let response = ctx
            .run("upstream request", async {
                self.http.get(&url).send().await.map_err(transport_error)
            })
            .await?;

        let status = response.status();
        let body = ctx
            .run("upstream response body", async {
                response.bytes().await.map_err(transport_error)
            })
            .await?;

        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "Upstream returned an error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            }
            .into());
        }

        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, ctx: &RequestContext, path: &str) -> RookResult<T> {
        let body = self.get_raw(ctx, path).await?;
        serde_json::from_slice(&body).map_err(|e| {
            UpstreamError::Decode {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl PlayerSource for UpstreamClient {
    async fn fetch_player(
        &self,
        ctx: &RequestContext,
        member_id: MemberId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo> {
        self.get_json(ctx, &player_path(member_id, date)).await
    }

    async fn fetch_player_by_fide_id(
        &self,
        ctx: &RequestContext,
        fide_id: FideId,
        date: NaiveDate,
    ) -> RookResult<PlayerInfo> {
        self.get_json(ctx, &fide_player_path(fide_id, date)).await
    }

    async fn search_players(
        &self,
        ctx: &RequestContext,
        first_name: &str,
        last_name: &str,
    ) -> RookResult<Vec<PlayerInfo>> {
        self.get_json(ctx, &search_path(first_name, last_name)).await
    }
}

fn player_path(member_id: MemberId, date: NaiveDate) -> String {
    format!("/player/{}/date/{}", member_id, date.format("%Y-%m-%d"))
}

fn fide_player_path(fide_id: FideId, date: NaiveDate) -> String {
    format!("/player/fideid/{}/date/{}", fide_id, date.format("%Y-%m-%d"))
}

fn search_path(first_name: &str, last_name: &str) -> String {
    format!(
        "/player/fornamn/{}/efternamn/{}",
        urlencoding::encode(first_name),
        urlencoding::encode(last_name)
    )
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    let reason = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        err.to_string()
    };
    UpstreamError::Transport { reason }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_ERROR_BODY_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}
