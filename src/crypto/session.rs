//! # Encryption Session
//!
//! The unlocked master key of one user, passed explicitly to every
//! encrypt, decrypt and unwrap call.
//!
//! ## Invariants
//! - The master key is set only by `unlock` and cleared by `lock`
//! - An idle session reports locked once `idle_timeout` has elapsed
//!   since the last key use or `touch`
//! - A locked session never yields key material

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

use super::errors::{CryptoError, CryptoResult};
use super::keys::MasterKey;

/// Default idle timeout before a session must be unlocked again.
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 900;

/// Per-user encryption session.
#[derive(Debug)]
pub struct SessionContext {
    user_id: String,
    master_key: Option<MasterKey>,
    unlocked_at: Option<DateTime<Utc>>,
    /// Milliseconds since the epoch; meaningful only while unlocked.
    last_activity_ms: AtomicI64,
    idle_timeout: Duration,
}

impl Clone for SessionContext {
    fn clone(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            master_key: self.master_key.clone(),
            unlocked_at: self.unlocked_at,
            last_activity_ms: AtomicI64::new(self.last_activity_ms.load(Ordering::Relaxed)),
            idle_timeout: self.idle_timeout,
        }
    }
}

impl SessionContext {
    /// A locked session for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            master_key: None,
            unlocked_at: None,
            last_activity_ms: AtomicI64::new(0),
            idle_timeout: Duration::seconds(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    /// An already unlocked session.
    pub fn unlocked(user_id: impl Into<String>, master_key: MasterKey) -> Self {
        let mut session = Self::new(user_id);
        session.unlock(master_key);
        session
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Install the master key (after the user authenticated).
    pub fn unlock(&mut self, master_key: MasterKey) {
        let now = Utc::now();
        self.master_key = Some(master_key);
        self.unlocked_at = Some(now);
        self.last_activity_ms.store(now.timestamp_millis(), Ordering::Relaxed);
    }

    /// Clear the master key (logout or explicit timeout).
    pub fn lock(&mut self) {
        self.master_key = None;
        self.unlocked_at = None;
        self.last_activity_ms.store(0, Ordering::Relaxed);
    }

    /// Record activity, extending the idle window. An expired session
    /// stays locked.
    pub fn touch(&self) {
        let now = Utc::now();
        if self.is_unlocked_at(now) {
            self.last_activity_ms
                .fetch_max(now.timestamp_millis(), Ordering::Relaxed);
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.master_key.as_ref()?;
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }

    pub fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        self.unlocked_at
    }

    /// Whether the session holds a usable master key at `now`.
    pub fn is_unlocked_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity() {
            Some(last) => now - last < self.idle_timeout,
            None => false,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.is_unlocked_at(Utc::now())
    }

    /// The active master key, or `SessionLocked`. Counts as activity.
    pub fn master_key(&self) -> CryptoResult<&MasterKey> {
        if !self.is_unlocked() {
            return Err(CryptoError::SessionLocked);
        }
        self.touch();
        self.master_key.as_ref().ok_or(CryptoError::SessionLocked)
    }
}
