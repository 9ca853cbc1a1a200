//! # Login Rate Limiter
//!
//! Sliding-window limiter over recent authentication attempts per client
//! address. The attempt list is pruned on every check, idle addresses are
//! dropped by `sweep`, and the tracked-key count is hard-capped, so the
//! map cannot grow without bound over the life of the process.
//!
//! This is an injected instance, not a process-wide singleton.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::errors::{AuthError, AuthResult};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sliding window size
    pub window: Duration,
    /// Maximum attempts per address within the window
    pub max_attempts: usize,
    /// Hard cap on tracked addresses; the stalest entry is evicted
    /// when a new address arrives at the cap
    pub max_tracked_addrs: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_attempts: 5,
            max_tracked_addrs: 10_000,
        }
    }
}

/// Per-address sliding-window login rate limiter
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    // Read-modify-write of an attempt list is a critical section;
    // one mutex covers the whole map.
    attempts: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record an attempt from this address
    pub fn check(&self, addr: IpAddr) -> AuthResult<()> {
        self.check_at(addr, Instant::now())
    }

    /// Check with an explicit clock reading
    pub fn check_at(&self, addr: IpAddr, now: Instant) -> AuthResult<()> {
        let window = self.config.window;
        let mut attempts = self.attempts.lock().unwrap();

        if !attempts.contains_key(&addr) && attempts.len() >= self.config.max_tracked_addrs {
            Self::evict_stalest(&mut attempts);
        }

        let list = attempts.entry(addr).or_default();
        list.retain(|t| now.saturating_duration_since(*t) < window);

        if list.len() >= self.config.max_attempts {
            return Err(AuthError::TooManyAttempts);
        }

        list.push(now);
        Ok(())
    }

    /// Drop addresses with no attempt inside the window. Intended to be
    /// called from a periodic background task.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let window = self.config.window;
        let mut attempts = self.attempts.lock().unwrap();
        attempts.retain(|_, list| {
            list.retain(|t| now.saturating_duration_since(*t) < window);
            !list.is_empty()
        });
    }

    /// Number of addresses currently tracked
    pub fn tracked_addrs(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn evict_stalest(attempts: &mut HashMap<IpAddr, Vec<Instant>>) {
        let stalest = attempts
            .iter()
            .min_by_key(|(_, list)| list.last().copied())
            .map(|(addr, _)| *addr);
        if let Some(addr) = stalest {
            attempts.remove(&addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: usize, window_secs: u64) -> LoginRateLimiter {
        LoginRateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(window_secs),
            max_attempts,
            max_tracked_addrs: 10_000,
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_sixth_attempt_within_window_rejected() {
        let limiter = limiter(5, 60);
        let addr = ip("127.0.0.1");
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at(addr, now).is_ok());
        }
        assert!(matches!(
            limiter.check_at(addr, now),
            Err(AuthError::TooManyAttempts)
        ));
    }

    #[test]
    fn test_allowed_again_after_window_elapses() {
        let limiter = limiter(5, 60);
        let addr = ip("127.0.0.1");
        let start = Instant::now();

        for _ in 0..5 {
            limiter.check_at(addr, start).unwrap();
        }
        assert!(limiter.check_at(addr, start).is_err());

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at(addr, later).is_ok());
    }

    #[test]
    fn test_addresses_are_independent() {
        let limiter = limiter(2, 60);
        let now = Instant::now();

        limiter.check_at(ip("10.0.0.1"), now).unwrap();
        limiter.check_at(ip("10.0.0.1"), now).unwrap();
        assert!(limiter.check_at(ip("10.0.0.1"), now).is_err());

        // A different address is unaffected
        assert!(limiter.check_at(ip("10.0.0.2"), now).is_ok());
    }

    #[test]
    fn test_rejection_does_not_consume_a_slot() {
        let limiter = limiter(2, 60);
        let addr = ip("10.0.0.1");
        let start = Instant::now();

        limiter.check_at(addr, start).unwrap();
        limiter.check_at(addr, start).unwrap();
        for _ in 0..10 {
            assert!(limiter.check_at(addr, start).is_err());
        }

        // Only the two recorded attempts age out; rejections left no trace
        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at(addr, later).is_ok());
    }

    #[test]
    fn test_sweep_drops_idle_addresses() {
        let limiter = limiter(5, 60);
        let start = Instant::now();

        limiter.check_at(ip("10.0.0.1"), start).unwrap();
        limiter.check_at(ip("10.0.0.2"), start).unwrap();
        assert_eq!(limiter.tracked_addrs(), 2);

        limiter.sweep_at(start + Duration::from_secs(120));
        assert_eq!(limiter.tracked_addrs(), 0);
    }

    #[test]
    fn test_tracked_addresses_are_capped() {
        let limiter = LoginRateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_attempts: 5,
            max_tracked_addrs: 3,
        });
        let t0 = Instant::now();

        limiter.check_at(ip("10.0.0.1"), t0).unwrap();
        limiter
            .check_at(ip("10.0.0.2"), t0 + Duration::from_secs(1))
            .unwrap();
        limiter
            .check_at(ip("10.0.0.3"), t0 + Duration::from_secs(2))
            .unwrap();

        // Fourth address evicts the stalest (10.0.0.1)
        limiter
            .check_at(ip("10.0.0.4"), t0 + Duration::from_secs(3))
            .unwrap();
        assert_eq!(limiter.tracked_addrs(), 3);

        // 10.0.0.1 starts from a clean slate again
        for _ in 0..5 {
            limiter
                .check_at(ip("10.0.0.1"), t0 + Duration::from_secs(4))
                .unwrap();
        }
    }

    #[test]
    fn test_concurrent_bursts_do_not_undercount() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter(5, 60));
        let addr = ip("127.0.0.1");

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check(addr).is_ok())
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(allowed, 5);
    }
}
