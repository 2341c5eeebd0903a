//! Session model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::User;

/// Session entity. `id` is derived from the client token, never the token itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A live session together with its owner
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub session: Session,
    pub user: User,
    /// Set when this validation extended the session lifetime
    pub renewed: bool,
}

/// Response body for session lookups
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Only set on the anonymous 401 body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl SessionResponse {
    /// The `{error: "Unauthorized", session: null, user: null}` body
    pub fn unauthorized() -> Self {
        Self {
            error: Some("Unauthorized"),
            session: None,
            user: None,
        }
    }
}

impl From<ValidatedSession> for SessionResponse {
    fn from(validated: ValidatedSession) -> Self {
        Self {
            error: None,
            session: Some(validated.session),
            user: Some(validated.user),
        }
    }
}

/// Request for validating a token supplied in the body
#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}
