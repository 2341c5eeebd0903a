//! Storage seams for sessions, users and presets
//!
//! Each trait has a PostgreSQL implementation and an in-memory one
//! ([`memory::MemoryStore`]) used for local runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    NameCount, NewUser, Pagination, Preset, PresetFilter, PresetInput, PresetPage, PresetView,
    Session, User,
};

pub mod memory;
pub mod preset;
pub mod session;
pub mod user;

pub use preset::PgPresetRepository;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;

/// Persistence for session rows
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session
    async fn insert(&self, session: &Session) -> Result<()>;

    /// Find a session joined with its owning user
    async fn find_with_user(&self, session_id: &str) -> Result<Option<(Session, User)>>;

    /// Move the expiry of a session
    async fn update_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Delete a single session
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Delete every session of a user, returning how many were removed
    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64>;

    /// Delete sessions whose expiry is at or before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Persistence for users
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by identity provider subject
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>>;

    /// Create a new user
    async fn create(&self, new_user: &NewUser) -> Result<User>;
}

/// Persistence for the preset catalog
#[async_trait]
pub trait PresetStore: Send + Sync {
    async fn create(&self, owner: Uuid, input: &PresetInput) -> Result<Preset>;

    /// Public presets matching the filter, one page at a time
    async fn list_public(&self, filter: &PresetFilter) -> Result<PresetPage>;

    /// A single preset with author; `is_liked` reflects `viewer`
    async fn find_by_id(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Option<PresetView>>;

    /// Presets owned by `owner`, newest first
    async fn list_by_owner(&self, owner: Uuid, include_private: bool) -> Result<Vec<Preset>>;

    /// Replace the fields of a preset owned by `owner`; `None` if no such preset
    async fn update(&self, id: Uuid, owner: Uuid, input: &PresetInput) -> Result<Option<Preset>>;

    /// Delete a preset owned by `owner`; false if nothing was deleted
    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<bool>;

    /// Atomically add one to the usage counter
    async fn increment_usage(&self, id: Uuid) -> Result<()>;

    /// Public preset counts per category
    async fn categories(&self) -> Result<Vec<NameCount>>;

    /// Most used tags among public presets
    async fn popular_tags(&self, limit: u32) -> Result<Vec<NameCount>>;

    /// Flip the like of `user_id` on a preset and resync its counter.
    ///
    /// Returns the resulting liked state, or `None` when the preset does not exist.
    async fn toggle_like(&self, preset_id: Uuid, user_id: Uuid) -> Result<Option<bool>>;

    /// Presets liked by a user, most recently liked first
    async fn liked_by(&self, user_id: Uuid, pagination: Pagination) -> Result<Vec<PresetView>>;
}
