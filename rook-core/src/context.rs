//! Per-request deadline propagation.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::{RookError, RookResult};

/// Timeouts are clamped to about thirty years so an oversized value still
/// yields a deadline in the future.
const MAX_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Deadline carried through every store call, limiter wait and upstream
/// request made on behalf of one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    deadline: Instant,
}

impl RequestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = [timeout.min(MAX_TIMEOUT), Duration::from_secs(86_400)]
            .into_iter()
            .find_map(|t| now.checked_add(t))
            .unwrap_or(now);
        Self { deadline }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Fail fast with `Cancelled` once the deadline has passed.
    pub fn ensure_active(&self, operation: &str) -> RookResult<()> {
        if self.is_expired() {
            return Err(RookError::cancelled(operation));
        }
        Ok(())
    }

    /// Drive `future` to completion unless the deadline elapses first.
    ///
    /// The future is never polled when the deadline has already passed.
    pub async fn run<F, T, E>(&self, operation: &str, future: F) -> RookResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<RookError>,
    {
        self.ensure_active(operation)?;
        match tokio::time::timeout_at(self.deadline.into(), future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(RookError::cancelled(operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_run_returns_inner_result() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run("noop", async { Ok::<_, RookError>(7) }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_run_times_out_slow_future() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        let result = ctx
            .run("slow call", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, RookError>(())
            })
            .await;
        assert_eq!(result, Err(RookError::cancelled("slow call")));
    }

    #[tokio::test]
    async fn test_expired_context_never_polls_future() {
        let ctx = RequestContext::with_deadline(Instant::now());
        let polled = AtomicBool::new(false);
        let result = ctx
            .run("fetch", async {
                polled.store(true, Ordering::SeqCst);
                Ok::<_, RookError>(())
            })
            .await;
        assert!(matches!(result, Err(RookError::Cancelled { .. })));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_oversized_timeout_is_not_expired() {
        let ctx = RequestContext::with_timeout(Duration::MAX);
        assert!(!ctx.is_expired());
        assert!(ctx.remaining() > Duration::from_secs(86_400 * 365));

        let value = ctx.run("noop", async { Ok::<_, RookError>(1) }).await;
        assert_eq!(value, Ok(1));
    }

    #[test]
    fn test_remaining_saturates() {
        let ctx = RequestContext::with_deadline(Instant::now());
        assert_eq!(ctx.remaining(), Duration::ZERO);
        assert!(ctx.is_expired());
    }
}
