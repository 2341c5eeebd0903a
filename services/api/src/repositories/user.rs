//! User repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::UserStore;
use crate::models::{NewUser, User};

/// User repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        external_identity_id: row.try_get("external_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        picture_url: row.try_get("picture_url")?,
        role: row.try_get("role")?,
    })
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.external_id, u.email, u.name, u.picture_url,
                   COALESCE(r.role, 'U') AS role
            FROM users u
            LEFT JOIN user_roles r ON r.email = u.email
            WHERE u.external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn create(&self, new_user: &NewUser) -> Result<User> {
        info!("Creating new user: {}", new_user.email);

        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO users (external_id, email, name, picture_url)
                VALUES ($1, $2, $3, $4)
                RETURNING id, external_id, email, name, picture_url
            )
            SELECT i.id, i.external_id, i.email, i.name, i.picture_url,
                   COALESCE(r.role, 'U') AS role
            FROM inserted i
            LEFT JOIN user_roles r ON r.email = i.email
            "#,
        )
        .bind(&new_user.external_identity_id)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.picture_url)
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }
}
