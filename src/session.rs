//! Login sessions.
//!
//! Sessions identify who submits observations. They live in a
//! [`SessionStore`] owned by the caller, expire after a fixed lifetime, and
//! read time through an injected [`Clock`] so expiry can be tested.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::error::{SessionError, ValidationError};
use crate::storage::StorageError;

fn lock_err(context: &'static str) -> SessionError {
    SessionError::Storage(StorageError::BackendError(format!("poisoned lock: {context}")))
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Checks a username/password pair against the user directory.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns true if the credentials are valid.
    async fn verify(&self, username: &str, password: &str) -> Result<bool, StorageError>;
}

/// Opaque session token handed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Creates a new random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logged-in user.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: SessionToken,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns true if the session has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Holds the active sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionToken, Session>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store whose sessions last `ttl`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    /// Create a store on the wall clock.
    #[must_use]
    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(Arc::new(SystemClock), ttl)
    }

    /// Create a store with the configured session lifetime.
    ///
    /// # Errors
    /// - `InvalidConfig`: if the configuration does not validate
    pub fn from_config(
        config: &RegistryConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let ttl = i64::try_from(config.session_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| ValidationError::InvalidConfig {
                reason: format!("session_ttl_secs {} is out of range", config.session_ttl_secs),
            })?;
        Ok(Self::new(clock, ttl))
    }

    /// Open a session for `username`.
    ///
    /// # Errors
    /// - `ExpiryOutOfRange`: if the lifetime overflows the calendar
    /// - `Storage`: if the session table lock is poisoned
    pub fn create(&self, username: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(SessionError::ExpiryOutOfRange)?;
        let session = Session {
            token: SessionToken::new(),
            username: username.to_string(),
            created_at: now,
            expires_at,
        };
        self.sessions
            .write()
            .map_err(|_| lock_err("session.create"))?
            .insert(session.token, session.clone());
        tracing::info!(username, token = %session.token, "session created");
        Ok(session)
    }

    /// The live session for `token`. Expired sessions are evicted.
    ///
    /// # Errors
    /// - `Storage`: if the session table lock is poisoned
    pub fn lookup(&self, token: SessionToken) -> Result<Option<Session>, SessionError> {
        let now = self.clock.now();
        let session = self
            .sessions
            .read()
            .map_err(|_| lock_err("session.lookup"))?
            .get(&token)
            .cloned();

        match session {
            Some(s) if s.is_expired(now) => {
                self.sessions
                    .write()
                    .map_err(|_| lock_err("session.lookup"))?
                    .remove(&token);
                tracing::debug!(%token, "session expired");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Log out `token` on behalf of `requester`.
    ///
    /// Only the session's own user may end it.
    ///
    /// # Errors
    /// - `LogoutFailure`: if the token is unknown or owned by another user
    /// - `Storage`: if the session table lock is poisoned
    pub fn invalidate(&self, token: SessionToken, requester: &str) -> Result<(), SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| lock_err("session.invalidate"))?;
        match sessions.get(&token) {
            Some(s) if s.username == requester => {
                sessions.remove(&token);
                tracing::info!(username = requester, %token, "session ended");
                Ok(())
            }
            _ => Err(SessionError::LogoutFailure),
        }
    }

    /// Verify credentials and open a session.
    ///
    /// # Errors
    /// - `InvalidLogin`: if the verifier rejects the credentials
    /// - `Storage`: if the verifier or the session table fails
    pub async fn login<V>(
        &self,
        verifier: &V,
        username: &str,
        password: &str,
    ) -> Result<Session, SessionError>
    where
        V: CredentialVerifier + ?Sized,
    {
        if !verifier.verify(username, password).await? {
            tracing::warn!(username, "invalid login");
            return Err(SessionError::InvalidLogin);
        }
        self.create(username)
    }

    /// Number of stored sessions, expired ones included until looked up.
    ///
    /// # Errors
    /// - `Storage`: if the session table lock is poisoned
    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().map_err(|_| lock_err("session.len"))?.len())
    }

    /// Returns true if no session is stored.
    ///
    /// # Errors
    /// - `Storage`: if the session table lock is poisoned
    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len()? == 0)
    }
}
