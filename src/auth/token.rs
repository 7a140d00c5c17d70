//! Token value and the renewal policy applied to cached tokens.

use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    /// When the token was obtained. For tokens read back from the on-disk
    /// slot this is the slot file's modification time.
    pub issued_at: SystemTime,
    pub ttl: Duration,
}

impl Token {
    pub fn new(access_token: String, issued_at: SystemTime, ttl: Duration) -> Self {
        Self {
            access_token,
            issued_at,
            ttl,
        }
    }
}

/// Decides whether a cached token is still usable or must be renewed.
///
/// A token is fresh while `now <= issued_at + ttl * tolerance_percent / 100`.
/// Tolerance 0 always renews; 100 uses the token until its literal expiry.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    tolerance_percent: u8,
}

impl FreshnessPolicy {
    pub fn new(tolerance_percent: u8) -> Self {
        Self {
            tolerance_percent: tolerance_percent.min(100),
        }
    }

    pub fn tolerance_percent(&self) -> u8 {
        self.tolerance_percent
    }

    pub fn is_fresh(&self, token: &Token, now: SystemTime) -> bool {
        if self.tolerance_percent == 0 || token.ttl.is_zero() {
            return false;
        }
        let allowed_secs = token.ttl.as_secs().saturating_mul(self.tolerance_percent as u64) / 100;
        match now.duration_since(token.issued_at) {
            Ok(elapsed) => elapsed.as_secs() <= allowed_secs,
            // issued_at in the future: clock skew on a shared slot, the
            // formula still holds
            Err(_) => true,
        }
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TOLERANCE_PERCENT)
    }
}
