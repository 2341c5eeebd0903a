//! User model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role given to users without an explicit `user_roles` entry
pub const DEFAULT_ROLE: &str = "U";

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Subject identifier issued by the identity provider
    pub external_identity_id: String,
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
    pub role: String,
}

/// New user creation payload, built from an identity provider profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub external_identity_id: String,
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
}
