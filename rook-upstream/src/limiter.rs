//! Token-bucket limiter shared by every upstream call.

use std::fmt;
use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rook_core::{RequestContext, RookError, RookResult};

/// Process-wide token bucket: capacity and refill rate are both
/// `rate` permits per second.
pub struct RequestLimiter {
    inner: DefaultDirectRateLimiter,
    rate: NonZeroU32,
}

impl RequestLimiter {
    /// A rate of zero is clamped to one request per second.
    pub fn per_second(rate: u32) -> Self {
        let rate = NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(rate);
        Self {
            inner: RateLimiter::direct(quota),
            rate,
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate.get()
    }

    /// Wait for a permit, giving up with `Cancelled` at the request deadline.
    pub async fn acquire(&self, ctx: &RequestContext) -> RookResult<()> {
        ctx.run("rate limiter wait", async {
            self.inner.until_ready().await;
            Ok::<_, RookError>(())
        })
        .await
    }
}

impl fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLimiter").field("rate", &self.rate).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_burst_up_to_capacity_is_immediate() {
        let limiter = RequestLimiter::per_second(5);
        let ctx = RequestContext::with_timeout(Duration::from_millis(200));
        for _ in 0..5 {
            limiter.acquire(&ctx).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_exhausted_bucket_cancels_at_deadline() {
        let limiter = RequestLimiter::per_second(1);
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        limiter.acquire(&ctx).await.unwrap();

        let err = limiter.acquire(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        assert_eq!(RequestLimiter::per_second(0).rate(), 1);
    }
}
