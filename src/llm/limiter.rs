//! Rolling-window rate limiting.
//!
//! [`RateLimiter`] counts dispatched calls inside a fixed rolling window
//! behind one mutex, so concurrent sends can never oversubscribe the
//! ceiling. Acquisition hands out a [`Permit`] that must be committed once
//! the call has actually reached the upstream; an uncommitted permit rolls
//! its slot back when dropped, which keeps cancelled sends from burning
//! budget.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::config::{RateLimitConfig, RateLimitScope};

use super::error::ApiError;

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    dispatched: u32,
}

/// Rolling-window call budget shared by every dispatch path that holds a
/// clone of its `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    ceiling: u32,
    window: Duration,
    block_on_limit: bool,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(ceiling: u32, window: Duration, block_on_limit: bool) -> Self {
        Self {
            ceiling,
            window,
            block_on_limit,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                dispatched: 0,
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.ceiling, config.window(), config.block_on_limit)
    }

    /// Reserve one call slot in the current window.
    ///
    /// When the ceiling is reached this either waits for the window to
    /// reset or fails with [`ApiError::RateLimitExceeded`], depending on
    /// the blocking mode.
    pub async fn acquire(&self) -> Result<Permit<'_>, ApiError> {
        loop {
            let wait = {
                let mut state = self.lock_state();
                let now = Instant::now();
                if now.duration_since(state.window_start) >= self.window {
                    state.window_start = now;
                    state.dispatched = 0;
                }
                if state.dispatched < self.ceiling {
                    state.dispatched += 1;
                    return Ok(Permit {
                        limiter: self,
                        window_start: state.window_start,
                        committed: false,
                    });
                }
                let remaining = self.window - now.duration_since(state.window_start);
                if !self.block_on_limit {
                    return Err(ApiError::RateLimitExceeded {
                        retry_after_ms: remaining.as_millis() as u64,
                    });
                }
                remaining
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate ceiling reached, waiting for window reset");
            tokio::time::sleep(wait).await;
        }
    }

    /// Dispatched calls counted in the current window.
    pub fn in_flight(&self) -> u32 {
        self.lock_state().dispatched
    }

    fn release(&self, window_start: Instant) {
        let mut state = self.lock_state();
        // Only roll back inside the window the slot was taken from; a reset
        // window already forgot the increment.
        if state.window_start == window_start && state.dispatched > 0 {
            state.dispatched -= 1;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        // Held for arithmetic only, never across an await.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A reserved call slot. Commit once the upstream has seen the call;
/// dropping without committing returns the slot to the window.
#[derive(Debug)]
pub struct Permit<'a> {
    limiter: &'a RateLimiter,
    window_start: Instant,
    committed: bool,
}

impl Permit<'_> {
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limiter.release(self.window_start);
        }
    }
}

// ============================================================================
// LimiterRegistry
// ============================================================================

/// Resolves which [`RateLimiter`] a session uses, per the configured scope:
/// one process-wide budget for a shared API key, or an independent budget
/// per user session.
pub struct LimiterRegistry {
    config: RateLimitConfig,
    global: Arc<RateLimiter>,
    per_session: DashMap<String, Arc<RateLimiter>>,
}

impl LimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        let global = Arc::new(RateLimiter::from_config(&config));
        Self {
            config,
            global,
            per_session: DashMap::new(),
        }
    }

    pub fn for_session(&self, session: &str) -> Arc<RateLimiter> {
        match self.config.scope {
            RateLimitScope::Global => Arc::clone(&self.global),
            RateLimitScope::PerSession => self
                .per_session
                .entry(session.to_string())
                .or_insert_with(|| Arc::new(RateLimiter::from_config(&self.config)))
                .clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sixth_call_fails_fast_at_ceiling_five() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), false);
        for _ in 0..5 {
            limiter.acquire().await.unwrap().commit();
        }
        let err = limiter.acquire().await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimitExceeded { .. }));
        assert_eq!(limiter.in_flight(), 5);
    }

    #[tokio::test]
    async fn window_reset_restores_budget() {
        let limiter = RateLimiter::new(1, Duration::from_millis(40), false);
        limiter.acquire().await.unwrap().commit();
        assert!(limiter.acquire().await.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        limiter.acquire().await.unwrap().commit();
    }

    #[tokio::test]
    async fn blocking_mode_waits_for_the_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(60), true);
        limiter.acquire().await.unwrap().commit();

        let started = Instant::now();
        limiter.acquire().await.unwrap().commit();
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn uncommitted_permit_rolls_back() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), false);
        {
            let _permit = limiter.acquire().await.unwrap();
            assert_eq!(limiter.in_flight(), 1);
        }
        assert_eq!(limiter.in_flight(), 0);
        // The slot is usable again.
        limiter.acquire().await.unwrap().commit();
    }

    #[tokio::test]
    async fn concurrent_acquires_never_exceed_ceiling() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60), false));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                match limiter.acquire().await {
                    Ok(permit) => {
                        permit.commit();
                        true
                    }
                    Err(_) => false,
                }
            }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
        assert_eq!(limiter.in_flight(), 5);
    }

    #[tokio::test]
    async fn registry_scopes_budgets() {
        let config = RateLimitConfig {
            ceiling: 1,
            window_seconds: 60,
            block_on_limit: false,
            scope: RateLimitScope::Global,
        };
        let registry = LimiterRegistry::new(config.clone());
        let a = registry.for_session("alice");
        let b = registry.for_session("bob");
        a.acquire().await.unwrap().commit();
        // Global scope: bob shares alice's budget.
        assert!(b.acquire().await.is_err());

        let registry = LimiterRegistry::new(RateLimitConfig {
            scope: RateLimitScope::PerSession,
            ..config
        });
        let a = registry.for_session("alice");
        let b = registry.for_session("bob");
        a.acquire().await.unwrap().commit();
        // Per-session scope: bob has his own.
        assert!(b.acquire().await.is_ok());
    }
}
