//! Rolling-window limiter for DNS verification attempts

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Decides whether another verification attempt may run for a key
pub trait AttemptLimiter: Send + Sync {
    /// Record an attempt for `key` if one is allowed; `false` means rejected
    fn try_acquire(&self, key: &str) -> bool;

    /// Attempts still allowed for `key` in the current window
    fn remaining(&self, key: &str) -> u32;
}

/// In-memory sliding-window limiter keyed by domain
pub struct SlidingWindowLimiter {
    max_attempts: u32,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Drop attempts older than the window and return how many remain
    fn prune(&self, attempts: &mut HashMap<String, Vec<Instant>>, key: &str, now: Instant) -> usize {
        let count = match attempts.get_mut(key) {
            Some(times) => {
                times.retain(|t| now.saturating_duration_since(*t) < self.window);
                times.len()
            }
            None => return 0,
        };
        if count == 0 {
            attempts.remove(key);
        }
        count
    }

    pub(crate) fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        if self.prune(&mut attempts, key, now) >= self.max_attempts as usize {
            return false;
        }
        attempts.entry(key.to_string()).or_default().push(now);
        true
    }

    pub(crate) fn remaining_at(&self, key: &str, now: Instant) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let count = self.prune(&mut attempts, key, now) as u32;
        self.max_attempts.saturating_sub(count)
    }
}

impl AttemptLimiter for SlidingWindowLimiter {
    fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    fn remaining(&self, key: &str) -> u32 {
        self.remaining_at(key, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_sixth_attempt_within_window_is_rejected() {
        let limiter = SlidingWindowLimiter::new(5, HOUR);
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.try_acquire_at("blog.example-user.com", start + Duration::from_secs(i)));
        }
        assert!(!limiter.try_acquire_at("blog.example-user.com", start + Duration::from_secs(10)));
        assert_eq!(limiter.remaining_at("blog.example-user.com", start + Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_window_rolls_forward() {
        let limiter = SlidingWindowLimiter::new(5, HOUR);
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.try_acquire_at("blog.example-user.com", start));
        }
        let later = start + HOUR + Duration::from_secs(1);
        assert_eq!(limiter.remaining_at("blog.example-user.com", later), 5);
        assert!(limiter.try_acquire_at("blog.example-user.com", later));
        assert_eq!(limiter.remaining_at("blog.example-user.com", later), 4);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, HOUR);
        let now = Instant::now();

        assert!(limiter.try_acquire_at("a.example-user.com", now));
        assert!(!limiter.try_acquire_at("a.example-user.com", now));
        assert!(limiter.try_acquire_at("b.example-user.com", now));
    }

    #[test]
    fn test_rejected_attempts_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(2, HOUR);
        let start = Instant::now();

        assert!(limiter.try_acquire_at("k.example-user.com", start));
        assert!(limiter.try_acquire_at("k.example-user.com", start + Duration::from_secs(1800)));
        assert!(!limiter.try_acquire_at("k.example-user.com", start + Duration::from_secs(1900)));

        // Only the first attempt has aged out
        let later = start + HOUR + Duration::from_secs(1);
        assert_eq!(limiter.remaining_at("k.example-user.com", later), 1);
    }
}
