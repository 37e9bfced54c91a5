//! Fixed-window rate limiting over the cache counter.

use std::time::Duration;

use shelfmark_core::ApiError;

use super::backend::CacheBackend;
use super::keys;

/// Fixed-window request limiter.
///
/// A cache-backend failure reads as a missing counter, so the limiter
/// degrades open rather than rejecting traffic.
#[derive(Clone)]
pub struct RateLimiter {
    cache: CacheBackend,
    window: Duration,
    max_requests: i64,
    enabled: bool,
}

impl RateLimiter {
    #[must_use]
    pub fn new(cache: CacheBackend, window: Duration, max_requests: i64, enabled: bool) -> Self {
        Self {
            cache,
            window,
            max_requests,
            enabled,
        }
    }

    /// Counts a request for the identifier and rejects once the window cap
    /// is exceeded.
    pub async fn check(&self, identifier: &str) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        match self
            .cache
            .increment(&keys::rate_limit_key(identifier), self.window)
            .await
        {
            Some(count) if count > self.max_requests => {
                tracing::debug!(identifier = %identifier, count, "Rate limit exceeded");
                Err(ApiError::rate_limited("Too many requests, try again later"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_cap() {
        let limiter = RateLimiter::new(
            CacheBackend::new_local(),
            Duration::from_secs(60),
            3,
            true,
        );
        for _ in 0..3 {
            limiter.check("1.2.3.4").await.unwrap();
        }
        let err = limiter.check("1.2.3.4").await.unwrap_err();
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(
            CacheBackend::new_local(),
            Duration::from_secs(60),
            1,
            true,
        );
        limiter.check("1.2.3.4").await.unwrap();
        limiter.check("5.6.7.8").await.unwrap();
        assert!(limiter.check("1.2.3.4").await.is_err());
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(
            CacheBackend::new_local(),
            Duration::from_millis(20),
            1,
            true,
        );
        limiter.check("1.2.3.4").await.unwrap();
        assert!(limiter.check("1.2.3.4").await.is_err());
        tokio::time::sleep(Duration::from_millis(30)).await;
        limiter.check("1.2.3.4").await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(
            CacheBackend::new_local(),
            Duration::from_secs(60),
            1,
            false,
        );
        for _ in 0..10 {
            limiter.check("1.2.3.4").await.unwrap();
        }
    }
}
