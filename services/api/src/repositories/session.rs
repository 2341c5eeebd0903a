//! Session repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::SessionStore;
use crate::models::{Session, User};

/// Session repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionRepository {
    async fn insert(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_with_user(&self, session_id: &str) -> Result<Option<(Session, User)>> {
        let row = sqlx::query(
            r#"
            SELECT s.id AS session_id, s.user_id, s.expires_at,
                   u.external_id, u.email, u.name, u.picture_url,
                   COALESCE(r.role, 'U') AS role
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            LEFT JOIN user_roles r ON r.email = u.email
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let session = Session {
                    id: row.try_get("session_id")?,
                    user_id: row.try_get("user_id")?,
                    expires_at: row.try_get("expires_at")?,
                };
                let user = User {
                    id: session.user_id,
                    external_identity_id: row.try_get("external_id")?,
                    email: row.try_get("email")?,
                    name: row.try_get("name")?,
                    picture_url: row.try_get("picture_url")?,
                    role: row.try_get("role")?,
                };
                Ok(Some((session, user)))
            }
            None => Ok(None),
        }
    }

    async fn update_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sessions SET expires_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        info!("Deleting all sessions for user: {}", user_id);

        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
