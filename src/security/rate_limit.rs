// src/security/rate_limit.rs — Login attempt limiter
//
// Counts failed logins per client address. Once a client reaches
// `max_attempts` it is locked out until `lockout` has passed since its last
// failure. A successful login clears the counter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::infra::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct Attempts {
    count: u32,
    last_failure: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: u32,
    lockout: Duration,
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts,
            lockout,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.lockout_seconds),
        )
    }

    /// Seconds of lockout left for `client`, or `None` when it may try again.
    pub fn lockout_remaining(&self, client: &str) -> Option<u64> {
        self.lockout_remaining_at(client, Instant::now())
    }

    fn lockout_remaining_at(&self, client: &str, now: Instant) -> Option<u64> {
        let mut attempts = self.attempts.lock().unwrap_or_else(|p| p.into_inner());
        let entry = *attempts.get(client)?;
        if entry.count < self.max_attempts {
            return None;
        }

        let elapsed = now.saturating_duration_since(entry.last_failure);
        if elapsed >= self.lockout {
            attempts.remove(client);
            return None;
        }

        let remaining = (self.lockout - elapsed).as_secs().max(1);
        tracing::warn!(client, remaining, "Rate limit active");
        Some(remaining)
    }

    pub fn record_failure(&self, client: &str) {
        let mut attempts = self.attempts.lock().unwrap_or_else(|p| p.into_inner());
        let entry = attempts.entry(client.to_string()).or_insert(Attempts {
            count: 0,
            last_failure: Instant::now(),
        });
        entry.count += 1;
        entry.last_failure = Instant::now();

        if entry.count >= self.max_attempts {
            tracing::warn!(client, "Client locked out after too many failed logins");
        }
    }

    pub fn reset(&self, client: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(client);
    }

    pub fn attempt_count(&self, client: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(client)
            .map_or(0, |a| a.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locks_out_after_max_attempts() {
        let limiter = RateLimiter::new(3, Duration::from_secs(900));
        for _ in 0..2 {
            limiter.record_failure("10.0.0.1");
            assert_eq!(limiter.lockout_remaining("10.0.0.1"), None);
        }
        limiter.record_failure("10.0.0.1");
        let remaining = limiter.lockout_remaining("10.0.0.1").unwrap();
        assert!(remaining > 890 && remaining <= 900);

        // other clients are unaffected
        assert_eq!(limiter.lockout_remaining("10.0.0.2"), None);
    }

    #[test]
    fn test_lockout_expires() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.record_failure("c");
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(limiter.lockout_remaining_at("c", later), None);
        assert_eq!(limiter.attempt_count("c"), 0);
    }

    #[test]
    fn test_reset_clears_attempts() {
        let limiter = RateLimiter::new(5, Duration::from_secs(900));
        limiter.record_failure("c");
        limiter.record_failure("c");
        assert_eq!(limiter.attempt_count("c"), 2);
        limiter.reset("c");
        assert_eq!(limiter.attempt_count("c"), 0);
    }

    #[test]
    fn test_from_config_defaults() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        for _ in 0..4 {
            limiter.record_failure("c");
        }
        assert_eq!(limiter.lockout_remaining("c"), None);
        limiter.record_failure("c");
        assert!(limiter.lockout_remaining("c").is_some());
    }
}
