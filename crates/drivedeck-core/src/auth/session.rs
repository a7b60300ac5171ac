use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::SessionStorage;
use crate::clock::Clock;

/// Storage key holding the serialized session
const SESSION_KEY: &str = "access_token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Build a session from a token grant that is valid for `expires_in` seconds from `now`
    pub fn from_grant(token: impl Into<String>, expires_in: u64, now: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(
            token,
            now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }
}

/// Sole authority on whether the user is signed in.
///
/// Every operation is local and never fails: storage errors and corrupt
/// values are logged and read as "no session".
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Persist the session, replacing whatever was stored before
    pub fn save(&self, session: &Session) {
        let contents = match serde_json::to_string(session) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.storage.write(SESSION_KEY, &contents) {
            warn!(error = %e, "Failed to save session");
        }
    }

    /// Load the stored session, valid or not
    pub fn load(&self) -> Option<Session> {
        let contents = match self.storage.read(SESSION_KEY) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read session");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed session");
                None
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.delete(SESSION_KEY) {
            warn!(error = %e, "Failed to clear session");
        }
    }

    /// Check if a session exists and has not expired
    pub fn is_valid(&self) -> bool {
        self.current().is_some()
    }

    /// The stored session, if it is still valid
    pub fn current(&self) -> Option<Session> {
        let now = self.clock.now();
        self.load().filter(|s| s.is_valid_at(now))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
