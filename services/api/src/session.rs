//! Session lifecycle: token generation, validation with sliding renewal, revocation
//!
//! Clients hold an opaque random token. Only `hex(sha256(token))` is stored,
//! so a leaked sessions table cannot be replayed as cookies.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{Session, ValidatedSession},
    repositories::SessionStore,
};

/// Number of random bytes in a session token
const TOKEN_BYTES: usize = 20;

/// Lifetime of a fresh or renewed session
pub fn session_lifetime() -> Duration {
    Duration::days(30)
}

/// Sessions closer than this to expiry are extended on use
pub fn renewal_window() -> Duration {
    Duration::days(15)
}

/// Generate a new opaque session token (40 lowercase hex chars)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the stored session id from a client token
pub fn session_id_from_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Session manager over a [`SessionStore`]
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Create a session for `user_id` identified by `token`
    pub async fn create_session(&self, token: &str, user_id: Uuid) -> Result<Session> {
        self.create_session_at(token, user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        info!("Creating session for user: {}", user_id);

        let session = Session {
            id: session_id_from_token(token),
            user_id,
            expires_at: now + session_lifetime(),
        };
        self.store.insert(&session).await?;

        Ok(session)
    }

    /// Resolve a token to a live session and its user.
    ///
    /// Expired sessions are deleted and reported as absent. Sessions inside the
    /// renewal window get a fresh 30 day lifetime.
    pub async fn validate_session_token(&self, token: &str) -> Option<ValidatedSession> {
        self.validate_session_token_at(token, Utc::now()).await
    }

    pub async fn validate_session_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Option<ValidatedSession> {
        let session_id = session_id_from_token(token);

        let (mut session, user) = match self.store.find_with_user(&session_id).await {
            Ok(Some(found)) => found,
            Ok(None) => return None,
            Err(e) => {
                warn!("Session lookup failed, treating as signed out: {}", e);
                return None;
            }
        };

        if now >= session.expires_at {
            debug!("Session for user {} expired at {}", user.id, session.expires_at);
            if let Err(e) = self.store.delete(&session_id).await {
                warn!("Failed to delete expired session: {}", e);
            }
            return None;
        }

        let mut renewed = false;
        if now >= session.expires_at - renewal_window() {
            let expires_at = now + session_lifetime();
            match self.store.update_expiry(&session_id, expires_at).await {
                Ok(()) => {
                    debug!("Renewed session for user {} until {}", user.id, expires_at);
                    session.expires_at = expires_at;
                    renewed = true;
                }
                Err(e) => warn!("Failed to renew session for user {}: {}", user.id, e),
            }
        }

        Some(ValidatedSession {
            session,
            user,
            renewed,
        })
    }

    /// Delete a single session by id
    pub async fn invalidate_session(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id).await
    }

    /// Delete every session of a user (sign out everywhere)
    pub async fn invalidate_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        info!("Invalidating all sessions for user: {}", user_id);
        self.store.delete_by_user(user_id).await
    }

    /// Remove sessions that expired before now
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!("Purged {} expired sessions", removed);
        }
        Ok(removed)
    }
}
