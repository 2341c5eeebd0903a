//! Preset repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow, types::Json};
use tracing::info;
use uuid::Uuid;

use super::PresetStore;
use crate::{
    models::{
        FilePattern, NameCount, Pagination, Preset, PresetAuthor, PresetFilter, PresetInput,
        PresetPage, PresetView,
    },
    validation::escape_like,
};

const PRESET_COLUMNS: &str = "id, user_id, name, description, category, command_template, \
     input_file_patterns, output_file_patterns, tags, tool, is_public, usage_count, \
     likes_count, created_at, updated_at";

const PRESET_VIEW_COLUMNS: &str = "p.id, p.user_id, p.name, p.description, p.category, \
     p.command_template, p.input_file_patterns, p.output_file_patterns, p.tags, p.tool, \
     p.is_public, p.usage_count, p.likes_count, p.created_at, p.updated_at, \
     u.name AS author_name, u.picture_url AS author_picture_url";

/// Preset repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgPresetRepository {
    pool: PgPool,
}

impl PgPresetRepository {
    /// Create a new preset repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn preset_from_row(row: &PgRow) -> Result<Preset> {
    let input_file_patterns: Json<Vec<FilePattern>> = row.try_get("input_file_patterns")?;
    let output_file_patterns: Json<Vec<FilePattern>> = row.try_get("output_file_patterns")?;

    Ok(Preset {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        command_template: row.try_get("command_template")?,
        input_file_patterns: input_file_patterns.0,
        output_file_patterns: output_file_patterns.0,
        tags: row.try_get("tags")?,
        tool: row.try_get("tool")?,
        is_public: row.try_get("is_public")?,
        usage_count: row.try_get("usage_count")?,
        likes_count: row.try_get("likes_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn view_from_row(row: &PgRow, is_liked: Option<bool>) -> Result<PresetView> {
    Ok(PresetView {
        preset: preset_from_row(row)?,
        author: PresetAuthor {
            name: row.try_get("author_name")?,
            picture_url: row.try_get("author_picture_url")?,
        },
        is_liked,
    })
}

/// Append the `WHERE` clause shared by the listing and its count
fn push_public_filters(builder: &mut QueryBuilder<'static, Postgres>, filter: &PresetFilter) {
    builder.push(" WHERE p.is_public = TRUE");

    if let Some(category) = &filter.category {
        builder.push(" AND p.category = ").push_bind(category.clone());
    }
    if let Some(tool) = &filter.tool {
        builder.push(" AND p.tool = ").push_bind(tool.clone());
    }
    if !filter.tags.is_empty() {
        builder.push(" AND p.tags @> ").push_bind(filter.tags.clone());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Build the page query for public presets
fn list_query(filter: &PresetFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM presets p JOIN users u ON u.id = p.user_id",
        PRESET_VIEW_COLUMNS
    ));
    push_public_filters(&mut builder, filter);

    let direction = filter.sort_order.as_sql();
    builder.push(format!(
        " ORDER BY p.{} {}, p.id {}",
        filter.sort_by.column(),
        direction,
        direction
    ));
    builder
        .push(" LIMIT ")
        .push_bind(filter.pagination.limit as i64)
        .push(" OFFSET ")
        .push_bind(filter.pagination.offset());

    builder
}

/// Build the total-count query matching [`list_query`]
fn count_query(filter: &PresetFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder =
        QueryBuilder::new("SELECT COUNT(*) FROM presets p JOIN users u ON u.id = p.user_id");
    push_public_filters(&mut builder, filter);
    builder
}

#[async_trait]
impl PresetStore for PgPresetRepository {
    async fn create(&self, owner: Uuid, input: &PresetInput) -> Result<Preset> {
        info!("Creating preset '{}' for user: {}", input.name, owner);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO presets (user_id, name, description, category, command_template,
                                 input_file_patterns, output_file_patterns, tags, tool, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PRESET_COLUMNS
        ))
        .bind(owner)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.command_template)
        .bind(Json(&input.input_file_patterns))
        .bind(Json(&input.output_file_patterns))
        .bind(&input.tags)
        .bind(&input.tool)
        .bind(input.is_public)
        .fetch_one(&self.pool)
        .await?;

        preset_from_row(&row)
    }

    async fn list_public(&self, filter: &PresetFilter) -> Result<PresetPage> {
        let rows = list_query(filter).build().fetch_all(&self.pool).await?;

        let total: i64 = count_query(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let presets = rows
            .iter()
            .map(|row| view_from_row(row, None))
            .collect::<Result<Vec<_>>>()?;

        Ok(PresetPage { presets, total })
    }

    async fn find_by_id(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Option<PresetView>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {},
                   EXISTS (
                       SELECT 1 FROM preset_likes l
                       WHERE l.preset_id = p.id AND l.user_id = $2
                   ) AS is_liked
            FROM presets p
            JOIN users u ON u.id = p.user_id
            WHERE p.id = $1
            "#,
            PRESET_VIEW_COLUMNS
        ))
        .bind(id)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let is_liked: bool = row.try_get("is_liked")?;
                Ok(Some(view_from_row(&row, Some(is_liked))?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_owner(&self, owner: Uuid, include_private: bool) -> Result<Vec<Preset>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM presets
            WHERE user_id = $1 AND (is_public OR $2)
            ORDER BY created_at DESC, id DESC
            "#,
            PRESET_COLUMNS
        ))
        .bind(owner)
        .bind(include_private)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(preset_from_row).collect()
    }

    async fn update(&self, id: Uuid, owner: Uuid, input: &PresetInput) -> Result<Option<Preset>> {
        info!("Updating preset {} for user: {}", id, owner);

        let row = sqlx::query(&format!(
            r#"
            UPDATE presets
            SET name = $3, description = $4, category = $5, command_template = $6,
                input_file_patterns = $7, output_file_patterns = $8, tags = $9,
                tool = $10, is_public = $11, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            PRESET_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.command_template)
        .bind(Json(&input.input_file_patterns))
        .bind(Json(&input.output_file_patterns))
        .bind(&input.tags)
        .bind(&input.tool)
        .bind(input.is_public)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(preset_from_row).transpose()
    }

    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<bool> {
        info!("Deleting preset {} for user: {}", id, owner);

        let result = sqlx::query("DELETE FROM presets WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_usage(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE presets SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn categories(&self) -> Result<Vec<NameCount>> {
        let rows = sqlx::query(
            r#"
            SELECT category AS name, COUNT(*) AS count
            FROM presets
            WHERE is_public AND category <> ''
            GROUP BY category
            ORDER BY count DESC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<NameCount> {
                Ok(NameCount {
                    name: row.try_get("name")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn popular_tags(&self, limit: u32) -> Result<Vec<NameCount>> {
        let rows = sqlx::query(
            r#"
            SELECT tag AS name, COUNT(*) AS count
            FROM presets, unnest(tags) AS tag
            WHERE is_public
            GROUP BY tag
            ORDER BY count DESC, name ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<NameCount> {
                Ok(NameCount {
                    name: row.try_get("name")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn toggle_like(&self, preset_id: Uuid, user_id: Uuid) -> Result<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent toggles on the same preset
        let exists: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM presets WHERE id = $1 AND (is_public OR user_id = $2) FOR UPDATE",
        )
        .bind(preset_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM preset_likes WHERE preset_id = $1 AND user_id = $2")
            .bind(preset_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query(
                r#"
                INSERT INTO preset_likes (preset_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (preset_id, user_id) DO NOTHING
                "#,
            )
            .bind(preset_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE presets
            SET likes_count = (SELECT COUNT(*) FROM preset_likes WHERE preset_id = $1)
            WHERE id = $1
            "#,
        )
        .bind(preset_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(!removed))
    }

    async fn liked_by(&self, user_id: Uuid, pagination: Pagination) -> Result<Vec<PresetView>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM preset_likes l
            JOIN presets p ON p.id = l.preset_id
            JOIN users u ON u.id = p.user_id
            WHERE l.user_id = $1 AND (p.is_public OR p.user_id = $1)
            ORDER BY l.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "#,
            PRESET_VIEW_COLUMNS
        ))
        .bind(user_id)
        .bind(pagination.limit as i64)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| view_from_row(row, Some(true))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{SortField, SortOrder},
        repositories::test_db::{self, TestResult},
    };

    fn input(name: &str, category: &str, tags: &[&str]) -> PresetInput {
        PresetInput {
            name: name.to_string(),
            description: format!("{} description", name),
            category: category.to_string(),
            command_template: "convert {input_file} {output_file}".to_string(),
            input_file_patterns: vec![],
            output_file_patterns: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tool: "imagemagick".to_string(),
            is_public: true,
        }
    }

    #[test]
    fn test_list_query_without_filters() {
        let builder = list_query(&PresetFilter::default());
        let sql = builder.sql();

        assert!(sql.contains("WHERE p.is_public = TRUE"));
        assert!(!sql.contains("p.category ="));
        assert!(sql.contains("ORDER BY p.created_at DESC, p.id DESC"));
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_list_query_binds_every_filter() {
        let filter = PresetFilter {
            category: Some("image".to_string()),
            tool: Some("imagemagick".to_string()),
            tags: vec!["resize".to_string()],
            search: Some("thumb".to_string()),
            sort_by: SortField::LikesCount,
            sort_order: SortOrder::Asc,
            pagination: Pagination::new(Some(2), Some(10)),
        };
        let builder = list_query(&filter);
        let sql = builder.sql();

        assert!(sql.contains("AND p.category = $1"));
        assert!(sql.contains("AND p.tool = $2"));
        assert!(sql.contains("AND p.tags @> $3"));
        assert!(sql.contains("AND (p.name ILIKE $4 OR p.description ILIKE $5)"));
        assert!(sql.contains("ORDER BY p.likes_count ASC, p.id ASC"));
        assert!(sql.ends_with("LIMIT $6 OFFSET $7"));
    }

    #[test]
    fn test_count_query_shares_filters() {
        let filter = PresetFilter {
            category: Some("video".to_string()),
            ..Default::default()
        };
        let builder = count_query(&filter);
        let sql = builder.sql();

        assert!(sql.starts_with("SELECT COUNT(*)"));
        assert!(sql.contains("AND p.category = $1"));
        assert!(!sql.contains("LIMIT"));
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_like_toggle_twice_restores_count() -> TestResult {
        let pool = test_db::pool().await?;
        let repo = PgPresetRepository::new(pool.clone());
        let owner = test_db::user(&pool, "owner").await?;
        let fan = test_db::user(&pool, "fan").await?;
        let preset = repo.create(owner.id, &input("Thumb", "image", &[])).await?;
        assert_eq!(preset.likes_count, 0);

        assert_eq!(repo.toggle_like(preset.id, fan.id).await?, Some(true));
        let view = repo
            .find_by_id(preset.id, Some(fan.id))
            .await?
            .ok_or("preset missing")?;
        assert_eq!(view.preset.likes_count, 1);
        assert_eq!(view.is_liked, Some(true));
        assert_eq!(repo.liked_by(fan.id, Pagination::default()).await?.len(), 1);

        assert_eq!(repo.toggle_like(preset.id, fan.id).await?, Some(false));
        let view = repo
            .find_by_id(preset.id, Some(fan.id))
            .await?
            .ok_or("preset missing")?;
        assert_eq!(view.preset.likes_count, 0);
        assert_eq!(view.is_liked, Some(false));

        assert_eq!(repo.toggle_like(Uuid::new_v4(), fan.id).await?, None);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_private_preset_cannot_be_liked_by_others() -> TestResult {
        let pool = test_db::pool().await?;
        let repo = PgPresetRepository::new(pool.clone());
        let owner = test_db::user(&pool, "owner").await?;
        let stranger = test_db::user(&pool, "stranger").await?;
        let mut private = input("Notes", "pdf", &[]);
        private.is_public = false;
        let preset = repo.create(owner.id, &private).await?;

        assert_eq!(repo.toggle_like(preset.id, stranger.id).await?, None);
        assert_eq!(repo.toggle_like(preset.id, owner.id).await?, Some(true));
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_listing_intersects_category_tags_and_search() -> TestResult {
        let pool = test_db::pool().await?;
        let repo = PgPresetRepository::new(pool.clone());
        let owner = test_db::user(&pool, "owner").await?;
        let category = test_db::unique("image");
        let tag = test_db::unique("resize");

        repo.create(owner.id, &input("Thumb 50%", &category, &[tag.as_str(), "png"]))
            .await?;
        repo.create(owner.id, &input("Gray", &category, &["color"]))
            .await?;
        repo.create(owner.id, &input("Clip", "video", &[tag.as_str()])).await?;

        let filter = PresetFilter {
            category: Some(category.clone()),
            tags: vec![tag.clone()],
            ..Default::default()
        };
        let page = repo.list_public(&filter).await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.presets[0].preset.name, "Thumb 50%");
        assert_eq!(page.presets[0].author.name, owner.name);

        let filter = PresetFilter {
            category: Some(category.clone()),
            tags: vec![tag.clone(), "color".to_string()],
            ..Default::default()
        };
        assert_eq!(repo.list_public(&filter).await?.total, 0);

        let filter = PresetFilter {
            category: Some(category.clone()),
            search: Some("50%".to_string()),
            ..Default::default()
        };
        let page = repo.list_public(&filter).await?;
        assert_eq!(page.total, 1);

        let filter = PresetFilter {
            category: Some(category.clone()),
            search: Some("%".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list_public(&filter).await?.total, 1);

        let categories = repo.categories().await?;
        let counted = categories
            .iter()
            .find(|c| c.name == category)
            .ok_or("category missing")?;
        assert_eq!(counted.count, 2);

        let tags = repo.popular_tags(u32::MAX).await?;
        let counted = tags.iter().find(|t| t.name == tag).ok_or("tag missing")?;
        assert_eq!(counted.count, 2);
        Ok(())
    }
}
