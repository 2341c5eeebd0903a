//! Preset models for the catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Named slot of a command template, e.g. `input_file` accepting `.jpg`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePattern {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Preset entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: Uuid,
    /// Owner of the preset
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub command_template: String,
    pub input_file_patterns: Vec<FilePattern>,
    pub output_file_patterns: Vec<FilePattern>,
    pub tags: Vec<String>,
    pub tool: String,
    pub is_public: bool,
    pub usage_count: i64,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile of a preset owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetAuthor {
    pub name: String,
    pub picture_url: Option<String>,
}

/// Preset as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct PresetView {
    #[serde(flatten)]
    pub preset: Preset,
    pub author: PresetAuthor,
    /// Whether the viewer likes the preset; only set on detail reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
}

/// Create/update request body as sent by clients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub command_template: Option<String>,
    pub tool: Option<String>,
    pub input_file_patterns: Option<Vec<FilePattern>>,
    pub output_file_patterns: Option<Vec<FilePattern>>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

/// Validated preset fields, used for both create and full update
#[derive(Debug, Clone, PartialEq)]
pub struct PresetInput {
    pub name: String,
    pub description: String,
    pub category: String,
    pub command_template: String,
    pub input_file_patterns: Vec<FilePattern>,
    pub output_file_patterns: Vec<FilePattern>,
    pub tags: Vec<String>,
    pub tool: String,
    pub is_public: bool,
}

/// Query parameters for preset listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub tool: Option<String>,
    /// JSON array (`["png","resize"]`) or comma separated list
    pub tags: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Query parameters for simple paginated lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Query parameters for the popular tags endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsQuery {
    pub limit: Option<u32>,
}

/// Offset pagination, page is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Sortable preset columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    UsageCount,
    LikesCount,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "name" => Some(Self::Name),
            "usage_count" => Some(Self::UsageCount),
            "likes_count" => Some(Self::LikesCount),
            _ => None,
        }
    }

    /// Column name in the `presets` table
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Name => "name",
            Self::UsageCount => "usage_count",
            Self::LikesCount => "likes_count",
        }
    }

    fn compare(&self, a: &Preset, b: &Preset) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Name => a.name.cmp(&b.name),
            Self::UsageCount => a.usage_count.cmp(&b.usage_count),
            Self::LikesCount => a.likes_count.cmp(&b.likes_count),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Normalized listing criteria for public presets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetFilter {
    pub category: Option<String>,
    pub tool: Option<String>,
    /// A preset matches when it carries every one of these tags
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl PresetFilter {
    /// Predicate form of the listing criteria, ignoring pagination
    pub fn matches(&self, preset: &Preset) -> bool {
        if !preset.is_public {
            return false;
        }
        if self
            .category
            .as_ref()
            .is_some_and(|category| &preset.category != category)
        {
            return false;
        }
        if self.tool.as_ref().is_some_and(|tool| &preset.tool != tool) {
            return false;
        }
        if !self.tags.iter().all(|tag| preset.tags.contains(tag)) {
            return false;
        }
        match &self.search {
            Some(search) => {
                let needle = search.to_lowercase();
                preset.name.to_lowercase().contains(&needle)
                    || preset.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Ordering used for listing; ties are broken by id so pages are stable
    pub fn compare(&self, a: &Preset, b: &Preset) -> Ordering {
        let ordering = self.sort_by.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// One page of listing results
#[derive(Debug, Clone)]
pub struct PresetPage {
    pub presets: Vec<PresetView>,
    pub total: i64,
}

/// Response for preset listing with pagination
#[derive(Debug, Serialize)]
pub struct PresetListResponse {
    pub presets: Vec<PresetView>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Aggregate entry for categories and tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: i64,
}
