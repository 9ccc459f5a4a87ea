//! Fixed-window rate limiting over the shared key-value store.

use super::errors::RateLimiterResult;
use crate::kv::KeyValueStore;
use std::{sync::Arc, time::Duration};

/// Rate limit configuration for a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub max_attempts: u32,

    /// Window length in seconds, opened by the first request
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub const fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window_secs,
        }
    }

    /// Signup code request, resend and check
    pub const fn signup() -> Self {
        Self::new(3, 60)
    }

    /// Account creation
    pub const fn create_account() -> Self {
        Self::new(5, 60)
    }

    /// Email/password and OAuth sign-in
    pub const fn sign_in() -> Self {
        Self::new(7, 60)
    }

    /// Password reset request, code check and confirmation
    pub const fn password_reset() -> Self {
        Self::new(5, 300)
    }

    /// Listing endpoints of an authenticated user
    pub const fn user_read() -> Self {
        Self::new(30, 60)
    }

    /// Creation endpoints of an authenticated user (new email, new mask, codes)
    pub const fn user_create() -> Self {
        Self::new(5, 60)
    }

    /// Mutations of existing resources (delete, verify, status)
    pub const fn user_modify() -> Self {
        Self::new(15, 60)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Which counters a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    /// Only `ratelimit:{route}:{identity}`
    PerRoute,

    /// `ratelimit:{identity}:global` first, then the route counter
    Compound {
        global_limit: u32,
        global_window: Duration,
    },
}

/// Rate limiter with counters in a [`KeyValueStore`]
///
/// Every check is one atomic increment per counter, so concurrent requests on any
/// number of server instances can never over-admit. With a limit of `n`, requests
/// `1..=n` of a window are admitted and request `n + 1` is the first one blocked.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    mode: RateLimitMode,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    ///
    /// * `store` - Shared counter store
    /// * `mode` - Per-route or compound accounting
    pub fn new(store: Arc<dyn KeyValueStore>, mode: RateLimitMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> RateLimitMode {
        self.mode
    }

    /// Atomically record a request and decide whether it is admitted
    ///
    /// In compound mode the global counter is charged unconditionally and checked
    /// before the route counter; a request blocked by the global budget does not
    /// touch the route counter.
    ///
    /// # Arguments
    ///
    /// * `route` - Route name, part of the counter key
    /// * `identity` - User id, email or client IP
    /// * `config` - Limit for this route
    ///
    /// # Errors
    ///
    /// * `RateLimitError::Store` - the counter store failed; callers decide
    ///   whether to fail open or closed
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use maskr::security::{RateLimitConfig, RateLimitResult, RateLimiter};
    /// # async fn example(limiter: &RateLimiter) {
    /// match limiter
    ///     .check_and_record("signup", "alice@example.com", &RateLimitConfig::signup())
    ///     .await
    /// {
    ///     Ok(RateLimitResult::Allowed { remaining }) => {
    ///         println!("Request allowed, {} attempts remaining", remaining);
    ///     }
    ///     Ok(RateLimitResult::Locked { retry_after }) => {
    ///         println!("Rate limited, retry after {} seconds", retry_after);
    ///     }
    ///     Err(e) => println!("Error: {}", e),
    /// }
    /// # }
    /// ```
    pub async fn check_and_record(
        &self,
        route: &str,
        identity: &str,
        config: &RateLimitConfig,
    ) -> RateLimiterResult<RateLimitResult> {
        if let RateLimitMode::Compound {
            global_limit,
            global_window,
        } = self.mode
        {
            let global_key = Self::global_key(identity);
            let count = self.store.incr_window(&global_key, global_window).await?;
            if count > i64::from(global_limit) {
                log::debug!("Global rate limit hit for {}", identity);
                return Ok(RateLimitResult::Locked {
                    retry_after: global_window.as_secs(),
                });
            }
        }

        let route_key = Self::route_key(route, identity);
        let count = self.store.incr_window(&route_key, config.window()).await?;
        let limit = i64::from(config.max_attempts);

        if count > limit {
            log::debug!("Rate limit hit on {} for {}", route, identity);
            return Ok(RateLimitResult::Locked {
                retry_after: config.window_secs,
            });
        }

        Ok(RateLimitResult::Allowed {
            remaining: u32::try_from(limit - count).unwrap_or(0),
        })
    }

    /// Counter key for one route and identity
    pub fn route_key(route: &str, identity: &str) -> String {
        format!("ratelimit:{}:{}", route, identity)
    }

    /// Counter key for the cross-route budget of an identity
    pub fn global_key(identity: &str) -> String {
        format!("ratelimit:{}:global", identity)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Action is allowed
    Allowed { remaining: u32 },

    /// Action is blocked until the window closes
    Locked { retry_after: u64 },
}

impl RateLimitResult {
    /// Check if action is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Get remaining attempts (if allowed)
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Get retry after seconds (if locked)
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RateLimitResult::Locked { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use tokio::task::JoinSet;

    fn limiter(mode: RateLimitMode) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryKeyValueStore::new()), mode)
    }

    #[tokio::test]
    async fn test_admits_exactly_limit_requests() {
        let limiter = limiter(RateLimitMode::PerRoute);
        let config = RateLimitConfig::new(3, 60);

        for i in 1..=3u32 {
            let result = limiter
                .check_and_record("signup", "alice@example.com", &config)
                .await
                .unwrap();
            assert_eq!(
                result,
                RateLimitResult::Allowed { remaining: 3 - i },
                "Attempt {} should be allowed",
                i
            );
        }

        let result = limiter
            .check_and_record("signup", "alice@example.com", &config)
            .await
            .unwrap();
        assert_eq!(result, RateLimitResult::Locked { retry_after: 60 });
    }

    #[tokio::test]
    async fn test_routes_and_identities_are_independent() {
        let limiter = limiter(RateLimitMode::PerRoute);
        let config = RateLimitConfig::new(1, 60);

        assert!(limiter.check_and_record("a", "u1", &config).await.unwrap().is_allowed());
        assert!(!limiter.check_and_record("a", "u1", &config).await.unwrap().is_allowed());
        assert!(limiter.check_and_record("b", "u1", &config).await.unwrap().is_allowed());
        assert!(limiter.check_and_record("a", "u2", &config).await.unwrap().is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset_allows_new_requests() {
        let limiter = limiter(RateLimitMode::PerRoute);
        let config = RateLimitConfig::new(3, 1);

        for _ in 0..3 {
            limiter.check_and_record("r", "id", &config).await.unwrap();
        }
        assert!(!limiter.check_and_record("r", "id", &config).await.unwrap().is_allowed());

        tokio::time::advance(Duration::from_secs(2)).await;

        let result = limiter.check_and_record("r", "id", &config).await.unwrap();
        assert_eq!(result.remaining(), Some(2));
    }

    #[tokio::test]
    async fn test_compound_global_budget_spans_routes() {
        let limiter = limiter(RateLimitMode::Compound {
            global_limit: 2,
            global_window: Duration::from_secs(60),
        });
        let config = RateLimitConfig::new(10, 60);

        assert!(limiter.check_and_record("a", "u1", &config).await.unwrap().is_allowed());
        assert!(limiter.check_and_record("b", "u1", &config).await.unwrap().is_allowed());

        let blocked = limiter.check_and_record("c", "u1", &config).await.unwrap();
        assert_eq!(blocked.retry_after(), Some(60));

        assert!(limiter.check_and_record("c", "u2", &config).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_compound_route_limit_still_applies() {
        let limiter = limiter(RateLimitMode::Compound {
            global_limit: 50,
            global_window: Duration::from_secs(60),
        });
        let config = RateLimitConfig::new(1, 60);

        assert!(limiter.check_and_record("a", "u1", &config).await.unwrap().is_allowed());
        assert!(!limiter.check_and_record("a", "u1", &config).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_concurrent_requests_no_race_condition() {
        let limiter = Arc::new(limiter(RateLimitMode::PerRoute));
        let config = RateLimitConfig::new(5, 60);

        let mut join_set = JoinSet::new();
        for _ in 0..100 {
            let limiter = Arc::clone(&limiter);
            join_set.spawn(async move {
                limiter
                    .check_and_record("test_endpoint", "concurrent_user", &config)
                    .await
            });
        }

        let mut allowed_count = 0;
        let mut locked_count = 0;
        while let Some(result) = join_set.join_next().await {
            match result.unwrap().unwrap() {
                RateLimitResult::Allowed { .. } => allowed_count += 1,
                RateLimitResult::Locked { .. } => locked_count += 1,
            }
        }

        assert_eq!(allowed_count, 5);
        assert_eq!(locked_count, 95);
    }

    #[test]
    fn test_key_construction() {
        assert_eq!(
            RateLimiter::route_key("emails_new", "42"),
            "ratelimit:emails_new:42"
        );
        assert_eq!(RateLimiter::global_key("42"), "ratelimit:42:global");
    }
}
