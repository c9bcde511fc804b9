// Submission rate limiting keyed by (email, ip)
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::error::ServiceError;
use crate::config::Config;

#[derive(Debug, Default, Clone)]
struct RateLimitEntry {
    attempts: Vec<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub remaining_attempts: usize,
    pub cooldown_remaining_ms: i64,
    pub is_blocked: bool,
}

#[derive(Debug)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    identity_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    max_attempts: usize,
    window: Duration,
    cooldown: Duration,
}

fn identity_key(email: &str, ip: &str) -> String {
    format!("{}|{}", email.trim().to_lowercase(), ip.trim())
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_minutes: i64, cooldown_minutes: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            identity_locks: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::minutes(window_minutes),
            cooldown: Duration::minutes(cooldown_minutes),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_max_attempts,
            config.rate_limit_window_minutes,
            config.rate_limit_cooldown_minutes,
        )
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serializes the check-then-record sequence of one identity. Hold the
    /// guard from `can_submit` until `record_submission` (or failure).
    pub async fn lock_identity(&self, email: &str, ip: &str) -> OwnedMutexGuard<()> {
        let key = identity_key(email, ip);
        let lock = {
            let mut locks = self.identity_locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop locks nobody is waiting on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn can_submit(&self, email: &str, ip: &str) -> Result<(), ServiceError> {
        self.can_submit_at(email, ip, Utc::now())
    }

    /// Read-only check. Never records anything.
    pub fn can_submit_at(&self, email: &str, ip: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let status = self.get_status_at(email, ip, now);
        if status.is_blocked || status.remaining_attempts == 0 {
            return Err(ServiceError::RateLimitExceeded {
                remaining_attempts: status.remaining_attempts,
                cooldown_remaining_ms: status.cooldown_remaining_ms,
            });
        }
        Ok(())
    }

    pub fn record_submission(&self, email: &str, ip: &str) {
        self.record_submission_at(email, ip, Utc::now())
    }

    pub fn record_submission_at(&self, email: &str, ip: &str, now: DateTime<Utc>) {
        let mut entries = self.entries();
        let entry = entries.entry(identity_key(email, ip)).or_default();

        if entry.blocked_until.is_some_and(|until| until <= now) {
            *entry = RateLimitEntry::default();
        }

        let window_start = now - self.window;
        entry.attempts.retain(|&at| at > window_start);
        entry.attempts.push(now);

        if entry.attempts.len() >= self.max_attempts {
            entry.blocked_until = Some(now + self.cooldown);
            tracing::warn!(
                "Submission limit reached for {}, blocked until {}",
                email,
                now + self.cooldown
            );
        }
    }

    pub fn get_status(&self, email: &str, ip: &str) -> RateLimitStatus {
        self.get_status_at(email, ip, Utc::now())
    }

    pub fn get_status_at(&self, email: &str, ip: &str, now: DateTime<Utc>) -> RateLimitStatus {
        let entries = self.entries();
        let Some(entry) = entries.get(&identity_key(email, ip)) else {
            return RateLimitStatus {
                remaining_attempts: self.max_attempts,
                cooldown_remaining_ms: 0,
                is_blocked: false,
            };
        };

        match entry.blocked_until {
            Some(until) if until > now => RateLimitStatus {
                remaining_attempts: 0,
                cooldown_remaining_ms: (until - now).num_milliseconds(),
                is_blocked: true,
            },
            // An expired block resets the history.
            Some(_) => RateLimitStatus {
                remaining_attempts: self.max_attempts,
                cooldown_remaining_ms: 0,
                is_blocked: false,
            },
            None => {
                let window_start = now - self.window;
                let recent = entry.attempts.iter().filter(|&&at| at > window_start).count();
                RateLimitStatus {
                    remaining_attempts: self.max_attempts.saturating_sub(recent),
                    cooldown_remaining_ms: 0,
                    is_blocked: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "teacher@deped.gov.ph";
    const IP: &str = "10.0.0.8";

    #[test]
    fn test_remaining_attempts_decrease_until_blocked() {
        let limiter = RateLimiter::new(5, 60, 60);
        let now = Utc::now();

        let mut previous = limiter.get_status_at(EMAIL, IP, now).remaining_attempts;
        assert_eq!(previous, 5);

        for i in 0..5 {
            assert!(limiter.can_submit_at(EMAIL, IP, now).is_ok());
            limiter.record_submission_at(EMAIL, IP, now + Duration::seconds(i));
            let remaining = limiter.get_status_at(EMAIL, IP, now + Duration::seconds(i)).remaining_attempts;
            assert!(remaining < previous);
            previous = remaining;
        }

        let blocked_at = now + Duration::seconds(10);
        match limiter.can_submit_at(EMAIL, IP, blocked_at) {
            Err(ServiceError::RateLimitExceeded {
                remaining_attempts,
                cooldown_remaining_ms,
            }) => {
                assert_eq!(remaining_attempts, 0);
                assert!(cooldown_remaining_ms > 0);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_cooldown_expiry_allows_submission_again() {
        let limiter = RateLimiter::new(5, 60, 60);
        let now = Utc::now();
        for _ in 0..5 {
            limiter.record_submission_at(EMAIL, IP, now);
        }

        let later = now + Duration::minutes(61);
        assert!(limiter.can_submit_at(EMAIL, IP, later).is_ok());
        assert_eq!(limiter.get_status_at(EMAIL, IP, later).remaining_attempts, 5);

        limiter.record_submission_at(EMAIL, IP, later);
        assert_eq!(limiter.get_status_at(EMAIL, IP, later).remaining_attempts, 4);
    }

    #[test]
    fn test_can_submit_does_not_record() {
        let limiter = RateLimiter::new(2, 60, 60);
        for _ in 0..10 {
            assert!(limiter.can_submit(EMAIL, IP).is_ok());
        }
        assert_eq!(limiter.get_status(EMAIL, IP).remaining_attempts, 2);
    }

    #[test]
    fn test_identities_are_independent_and_email_is_case_insensitive() {
        let limiter = RateLimiter::new(1, 60, 60);
        limiter.record_submission("Teacher@DepEd.gov.ph ", IP);

        assert!(limiter.can_submit(EMAIL, IP).is_err());
        assert!(limiter.can_submit(EMAIL, "10.0.0.9").is_ok());
        assert!(limiter.can_submit("other@deped.gov.ph", IP).is_ok());
    }

    #[test]
    fn test_attempts_outside_window_are_forgotten() {
        let limiter = RateLimiter::new(5, 60, 60);
        let now = Utc::now();
        for _ in 0..3 {
            limiter.record_submission_at(EMAIL, IP, now - Duration::minutes(90));
        }
        assert_eq!(limiter.get_status_at(EMAIL, IP, now).remaining_attempts, 5);
    }

    #[tokio::test]
    async fn test_identity_lock_serializes_same_identity() {
        let limiter = Arc::new(RateLimiter::new(5, 60, 60));
        let guard = limiter.lock_identity(EMAIL, IP).await;

        let other = limiter.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.lock_identity(EMAIL, IP).await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
