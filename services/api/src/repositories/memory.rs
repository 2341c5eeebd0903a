//! In-memory implementation of every store
//!
//! Keeps users, sessions, presets and likes behind one lock so joins
//! behave like the PostgreSQL repositories. Used for local runs with
//! `REFILE_STORAGE=memory` and by the test suite.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PresetStore, SessionStore, UserStore};
use crate::models::{
    DEFAULT_ROLE, NameCount, NewUser, Pagination, Preset, PresetAuthor, PresetFilter,
    PresetInput, PresetPage, PresetView, Session, User,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    presets: HashMap<Uuid, Preset>,
    /// (preset, user) -> liked at
    likes: HashMap<(Uuid, Uuid), DateTime<Utc>>,
}

impl MemoryState {
    fn view(&self, preset: &Preset, is_liked: Option<bool>) -> Option<PresetView> {
        let owner = self.users.get(&preset.user_id)?;
        Some(PresetView {
            preset: preset.clone(),
            author: PresetAuthor {
                name: owner.name.clone(),
                picture_url: owner.picture_url.clone(),
            },
            is_liked,
        })
    }

    fn visible_to(preset: &Preset, user_id: Uuid) -> bool {
        preset.is_public || preset.user_id == user_id
    }
}

/// Shared in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn count_by_name<'a, I>(names: I) -> Vec<NameCount>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }

    let mut entries: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount {
            name: name.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        let mut state = self.state.write().await;
        match state.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => anyhow::bail!("session {} already exists", session.id),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
            }
        }
        Ok(())
    }

    async fn find_with_user(&self, session_id: &str) -> Result<Option<(Session, User)>> {
        let state = self.state.read().await;
        let found = state.sessions.get(session_id).and_then(|session| {
            state
                .users
                .get(&session.user_id)
                .map(|user| (session.clone(), user.clone()))
        });
        Ok(found)
    }

    async fn update_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.state.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.external_identity_id == external_id)
            .cloned())
    }

    async fn create(&self, new_user: &NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|user| user.external_identity_id == new_user.external_identity_id)
        {
            anyhow::bail!(
                "user with external id {} already exists",
                new_user.external_identity_id
            );
        }

        let user = User {
            id: Uuid::new_v4(),
            external_identity_id: new_user.external_identity_id.clone(),
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            picture_url: new_user.picture_url.clone(),
            role: DEFAULT_ROLE.to_string(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl PresetStore for MemoryStore {
    async fn create(&self, owner: Uuid, input: &PresetInput) -> Result<Preset> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&owner) {
            anyhow::bail!("unknown preset owner {}", owner);
        }

        let now = Utc::now();
        let preset = Preset {
            id: Uuid::new_v4(),
            user_id: owner,
            name: input.name.clone(),
            description: input.description.clone(),
            category: input.category.clone(),
            command_template: input.command_template.clone(),
            input_file_patterns: input.input_file_patterns.clone(),
            output_file_patterns: input.output_file_patterns.clone(),
            tags: input.tags.clone(),
            tool: input.tool.clone(),
            is_public: input.is_public,
            usage_count: 0,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.presets.insert(preset.id, preset.clone());
        Ok(preset)
    }

    async fn list_public(&self, filter: &PresetFilter) -> Result<PresetPage> {
        let state = self.state.read().await;

        let mut matching: Vec<&Preset> = state
            .presets
            .values()
            .filter(|preset| filter.matches(preset) && state.users.contains_key(&preset.user_id))
            .collect();
        matching.sort_by(|a, b| filter.compare(a, b));

        let total = matching.len() as i64;
        let presets = matching
            .into_iter()
            .skip(filter.pagination.offset() as usize)
            .take(filter.pagination.limit as usize)
            .filter_map(|preset| state.view(preset, None))
            .collect();

        Ok(PresetPage { presets, total })
    }

    async fn find_by_id(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Option<PresetView>> {
        let state = self.state.read().await;
        Ok(state.presets.get(&id).and_then(|preset| {
            let is_liked = viewer.is_some_and(|user_id| state.likes.contains_key(&(id, user_id)));
            state.view(preset, Some(is_liked))
        }))
    }

    async fn list_by_owner(&self, owner: Uuid, include_private: bool) -> Result<Vec<Preset>> {
        let state = self.state.read().await;
        let mut presets: Vec<Preset> = state
            .presets
            .values()
            .filter(|preset| preset.user_id == owner && (include_private || preset.is_public))
            .cloned()
            .collect();
        presets.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(presets)
    }

    async fn update(&self, id: Uuid, owner: Uuid, input: &PresetInput) -> Result<Option<Preset>> {
        let mut state = self.state.write().await;
        let Some(preset) = state
            .presets
            .get_mut(&id)
            .filter(|preset| preset.user_id == owner)
        else {
            return Ok(None);
        };

        preset.name = input.name.clone();
        preset.description = input.description.clone();
        preset.category = input.category.clone();
        preset.command_template = input.command_template.clone();
        preset.input_file_patterns = input.input_file_patterns.clone();
        preset.output_file_patterns = input.output_file_patterns.clone();
        preset.tags = input.tags.clone();
        preset.tool = input.tool.clone();
        preset.is_public = input.is_public;
        preset.updated_at = Utc::now();

        Ok(Some(preset.clone()))
    }

    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let owned = state
            .presets
            .get(&id)
            .is_some_and(|preset| preset.user_id == owner);
        if owned {
            state.presets.remove(&id);
            state.likes.retain(|(preset_id, _), _| *preset_id != id);
        }
        Ok(owned)
    }

    async fn increment_usage(&self, id: Uuid) -> Result<()> {
        if let Some(preset) = self.state.write().await.presets.get_mut(&id) {
            preset.usage_count += 1;
        }
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<NameCount>> {
        let state = self.state.read().await;
        Ok(count_by_name(
            state
                .presets
                .values()
                .filter(|preset| preset.is_public && !preset.category.is_empty())
                .map(|preset| &preset.category),
        ))
    }

    async fn popular_tags(&self, limit: u32) -> Result<Vec<NameCount>> {
        let state = self.state.read().await;
        let mut tags = count_by_name(
            state
                .presets
                .values()
                .filter(|preset| preset.is_public)
                .flat_map(|preset| preset.tags.iter()),
        );
        tags.truncate(limit as usize);
        Ok(tags)
    }

    async fn toggle_like(&self, preset_id: Uuid, user_id: Uuid) -> Result<Option<bool>> {
        let mut state = self.state.write().await;
        let visible = state
            .presets
            .get(&preset_id)
            .is_some_and(|preset| MemoryState::visible_to(preset, user_id));
        if !visible {
            return Ok(None);
        }

        let liked = match state.likes.entry((preset_id, user_id)) {
            Entry::Occupied(like) => {
                like.remove();
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                true
            }
        };

        let likes_count = state
            .likes
            .keys()
            .filter(|(liked_preset, _)| *liked_preset == preset_id)
            .count() as i64;
        if let Some(preset) = state.presets.get_mut(&preset_id) {
            preset.likes_count = likes_count;
        }

        Ok(Some(liked))
    }

    async fn liked_by(&self, user_id: Uuid, pagination: Pagination) -> Result<Vec<PresetView>> {
        let state = self.state.read().await;

        let mut liked: Vec<(&Preset, DateTime<Utc>)> = state
            .likes
            .iter()
            .filter(|((_, liker), _)| *liker == user_id)
            .filter_map(|((preset_id, _), liked_at)| {
                state
                    .presets
                    .get(preset_id)
                    .filter(|preset| MemoryState::visible_to(preset, user_id))
                    .map(|preset| (preset, *liked_at))
            })
            .collect();
        liked.sort_by(|(a, a_at), (b, b_at)| b_at.cmp(a_at).then_with(|| b.id.cmp(&a.id)));

        Ok(liked
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .filter_map(|(preset, _)| state.view(preset, Some(true)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortField;

    async fn seed_user(store: &MemoryStore, external_id: &str) -> User {
        UserStore::create(
            store,
            &NewUser {
                external_identity_id: external_id.to_string(),
                email: format!("{}@example.com", external_id),
                name: external_id.to_string(),
                picture_url: None,
            },
        )
        .await
        .unwrap()
    }

    fn input(name: &str, category: &str, tags: &[&str]) -> PresetInput {
        PresetInput {
            name: name.to_string(),
            description: format!("{} preset", name),
            category: category.to_string(),
            command_template: "convert {input_file} {output_file}".to_string(),
            input_file_patterns: vec![],
            output_file_patterns: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tool: "imagemagick".to_string(),
            is_public: true,
        }
    }

    #[tokio::test]
    async fn test_toggle_like_twice_restores_counter() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        let fan = seed_user(&store, "fan").await;
        let preset = PresetStore::create(&store, owner.id, &input("Gray", "image", &[]))
            .await
            .unwrap();

        assert_eq!(store.toggle_like(preset.id, fan.id).await.unwrap(), Some(true));
        let liked = store.find_by_id(preset.id, Some(fan.id)).await.unwrap().unwrap();
        assert_eq!(liked.preset.likes_count, 1);
        assert_eq!(liked.is_liked, Some(true));

        assert_eq!(store.toggle_like(preset.id, fan.id).await.unwrap(), Some(false));
        let unliked = store.find_by_id(preset.id, Some(fan.id)).await.unwrap().unwrap();
        assert_eq!(unliked.preset.likes_count, 0);
        assert_eq!(unliked.is_liked, Some(false));
    }

    #[tokio::test]
    async fn test_toggle_like_on_missing_or_private_preset() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        let other = seed_user(&store, "other").await;
        let mut private = input("Mine", "image", &[]);
        private.is_public = false;
        let preset = PresetStore::create(&store, owner.id, &private).await.unwrap();

        assert_eq!(store.toggle_like(Uuid::new_v4(), other.id).await.unwrap(), None);
        assert_eq!(store.toggle_like(preset.id, other.id).await.unwrap(), None);
        assert_eq!(store.toggle_like(preset.id, owner.id).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_list_public_filters_by_category_and_tags() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        for (name, category, tags) in [
            ("Thumb", "image", vec!["resize"]),
            ("Gray", "image", vec!["color"]),
            ("Clip", "video", vec!["resize"]),
        ] {
            PresetStore::create(&store, owner.id, &input(name, category, &tags))
                .await
                .unwrap();
        }

        let images = store
            .list_public(&PresetFilter {
                category: Some("image".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(images.total, 2);
        assert!(images.presets.iter().all(|v| v.preset.category == "image"));

        let resized_images = store
            .list_public(&PresetFilter {
                category: Some("image".to_string()),
                tags: vec!["resize".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resized_images.total, 1);
        assert_eq!(resized_images.presets[0].preset.name, "Thumb");
        assert_eq!(resized_images.presets[0].author.name, "owner");
    }

    #[tokio::test]
    async fn test_list_public_paginates_and_sorts() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        for name in ["c", "a", "e", "b", "d"] {
            PresetStore::create(&store, owner.id, &input(name, "other", &[]))
                .await
                .unwrap();
        }

        let page = store
            .list_public(&PresetFilter {
                sort_by: SortField::Name,
                sort_order: crate::models::SortOrder::Asc,
                pagination: Pagination::new(Some(2), Some(2)),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        let names: Vec<_> = page.presets.iter().map(|v| v.preset.name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_require_owner() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        let other = seed_user(&store, "other").await;
        let preset = PresetStore::create(&store, owner.id, &input("Gray", "image", &[]))
            .await
            .unwrap();

        let renamed = input("Grayscale", "image", &["color"]);
        assert!(store.update(preset.id, other.id, &renamed).await.unwrap().is_none());
        assert!(!PresetStore::delete(&store, preset.id, other.id).await.unwrap());

        let updated = store.update(preset.id, owner.id, &renamed).await.unwrap().unwrap();
        assert_eq!(updated.name, "Grayscale");
        assert_eq!(updated.tags, vec!["color"]);
        assert!(updated.updated_at >= preset.updated_at);

        assert!(PresetStore::delete(&store, preset.id, owner.id).await.unwrap());
        assert!(store.find_by_id(preset.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories_and_tags_count_public_presets_only() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        PresetStore::create(&store, owner.id, &input("a", "image", &["png", "resize"]))
            .await
            .unwrap();
        PresetStore::create(&store, owner.id, &input("b", "image", &["png"]))
            .await
            .unwrap();
        PresetStore::create(&store, owner.id, &input("c", "pdf", &["merge"]))
            .await
            .unwrap();
        let mut hidden = input("d", "video", &["secret"]);
        hidden.is_public = false;
        PresetStore::create(&store, owner.id, &hidden).await.unwrap();

        let categories = store.categories().await.unwrap();
        assert_eq!(
            categories,
            vec![
                NameCount { name: "image".to_string(), count: 2 },
                NameCount { name: "pdf".to_string(), count: 1 },
            ]
        );

        let tags = store.popular_tags(2).await.unwrap();
        assert_eq!(
            tags,
            vec![
                NameCount { name: "png".to_string(), count: 2 },
                NameCount { name: "merge".to_string(), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_increment_usage_and_liked_by() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        let fan = seed_user(&store, "fan").await;
        let preset = PresetStore::create(&store, owner.id, &input("Gray", "image", &[]))
            .await
            .unwrap();

        store.increment_usage(preset.id).await.unwrap();
        store.increment_usage(preset.id).await.unwrap();
        store.toggle_like(preset.id, fan.id).await.unwrap();

        let liked = store.liked_by(fan.id, Pagination::default()).await.unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].preset.usage_count, 2);
        assert!(store.liked_by(owner.id, Pagination::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_owner_hides_private_on_request() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        let mut private = input("Private", "image", &[]);
        private.is_public = false;
        PresetStore::create(&store, owner.id, &private).await.unwrap();
        PresetStore::create(&store, owner.id, &input("Public", "image", &[]))
            .await
            .unwrap();

        assert_eq!(store.list_by_owner(owner.id, true).await.unwrap().len(), 2);
        let public = store.list_by_owner(owner.id, false).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name, "Public");
    }
}
