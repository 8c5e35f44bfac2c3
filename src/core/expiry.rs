//! Expiry Policy
//!
//! Pure expiry arithmetic. Nothing here reads a clock; "now" is always passed in.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default lead time before expiry at which renewal starts (5 minutes).
pub const DEFAULT_LEAD_TIME: Duration = Duration::from_secs(300);

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Time left until `expires_at`; negative once expired.
pub fn time_until_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> chrono::Duration {
    expires_at - now
}

/// True iff the token has no time left.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    time_until_expiry(expires_at, now) <= chrono::Duration::zero()
}

/// True iff the token is still valid but within `lead_time` of expiring.
pub fn should_renew_soon(expires_at: DateTime<Utc>, lead_time: Duration, now: DateTime<Utc>) -> bool {
    let remaining = time_until_expiry(expires_at, now);
    remaining > chrono::Duration::zero() && remaining <= to_chrono(lead_time)
}

/// Expiry decisions bound to a fixed lead time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    lead_time: Duration,
}

impl ExpiryPolicy {
    /// Create policy with the given lead time.
    pub fn new(lead_time: Duration) -> Self {
        Self { lead_time }
    }

    /// Configured lead time.
    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    /// See [`is_expired`].
    pub fn is_expired(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_expired(expires_at, now)
    }

    /// See [`should_renew_soon`].
    pub fn should_renew_soon(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        should_renew_soon(expires_at, self.lead_time, now)
    }

    /// Expired or inside the lead window.
    pub fn needs_renewal(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.is_expired(expires_at, now) || self.should_renew_soon(expires_at, now)
    }

    /// How long to wait before renewing: time left minus lead time, never negative.
    pub fn renewal_delay(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (time_until_expiry(expires_at, now) - to_chrono(self.lead_time))
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LEAD_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        now + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn test_time_until_expiry_can_be_negative() {
        let now = Utc::now();
        assert_eq!(time_until_expiry(at(now, 10), now), chrono::Duration::minutes(10));
        assert_eq!(time_until_expiry(at(now, -2), now), chrono::Duration::minutes(-2));
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        assert!(is_expired(now, now));
        assert!(is_expired(at(now, -1), now));
        assert!(!is_expired(at(now, 1), now));
    }

    #[test]
    fn test_should_renew_soon_window() {
        let now = Utc::now();
        let lead = DEFAULT_LEAD_TIME;
        assert!(should_renew_soon(at(now, 4), lead, now));
        assert!(should_renew_soon(at(now, 5), lead, now));
        assert!(!should_renew_soon(at(now, 10), lead, now));
        // Already expired is not "soon".
        assert!(!should_renew_soon(at(now, -1), lead, now));
        assert!(!should_renew_soon(now, lead, now));
    }

    #[test]
    fn test_renewal_delay() {
        let now = Utc::now();
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.renewal_delay(at(now, 60), now), Duration::from_secs(55 * 60));
        assert_eq!(policy.renewal_delay(at(now, 4), now), Duration::ZERO);
        assert_eq!(policy.renewal_delay(at(now, -30), now), Duration::ZERO);
    }

    #[test]
    fn test_needs_renewal() {
        let now = Utc::now();
        let policy = ExpiryPolicy::default();
        assert!(policy.needs_renewal(at(now, -1), now));
        assert!(policy.needs_renewal(at(now, 3), now));
        assert!(!policy.needs_renewal(at(now, 10), now));
    }
}
