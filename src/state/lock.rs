//! Advisory locking of the workspace state.
//!
//! A lock is a small JSON record naming its holder. Expired locks may be
//! taken over, so a crashed run never blocks the workspace for long.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 900;

/// Information about a state lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// Process id of the holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a lock for `holder` with the default expiry.
    #[must_use]
    pub fn new(holder: &str) -> Self {
        Self::with_expiry(holder, Duration::seconds(LOCK_EXPIRY_SECS))
    }

    /// Creates a lock for `holder` expiring after `ttl`.
    #[must_use]
    pub fn with_expiry(holder: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            pid: std::process::id(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} held by {} (pid {}) since {}",
            self.lock_id,
            self.holder,
            self.pid,
            self.acquired_at.to_rfc3339()
        )
    }
}

/// Generates a holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let host = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().into_owned());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{host}-{}-{}", std::process::id(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_expiry() {
        let lock = LockInfo::new("ci-runner");
        assert_eq!(lock.holder, "ci-runner");
        assert!(!lock.is_expired());
        assert!(lock.remaining_secs() > 0);

        let stale = LockInfo::with_expiry("ci-runner", Duration::seconds(-1));
        assert!(stale.is_expired());
        assert_eq!(stale.remaining_secs(), 0);
    }

    #[test]
    fn test_holder_id_generation() {
        let first = generate_holder_id();
        let second = generate_holder_id();

        assert_ne!(first, second);
        assert!(first.contains(&std::process::id().to_string()));
    }
}
