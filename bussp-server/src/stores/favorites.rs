//! Favorite lines.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::storage::KeyValueStore;

use super::{StoreError, load, save};

/// Storage key of the favorites document.
pub const FAVORITES_KEY: &str = "bussp-favorites";

/// A line the rider saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteLine {
    pub id: Uuid,
    pub line_code: i64,
    pub line_name: String,
    pub nickname: Option<String>,
    pub added_at: DateTime<Utc>,
    /// Whether the rider wants arrival notifications for this line.
    pub notifications: bool,
}

/// Partial update of a favorite. `None` fields are left unchanged; an empty
/// nickname clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoriteUpdate {
    pub line_name: Option<String>,
    pub nickname: Option<String>,
    pub notifications: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    favorites: Vec<FavoriteLine>,
}

/// Favorite lines, at most one per line code.
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    favorites: RwLock<Vec<FavoriteLine>>,
}

impl FavoritesStore {
    /// Load favorites from `store`. Undecodable state loads as empty.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let persisted: Persisted = load(store.as_ref(), FAVORITES_KEY).await?;
        debug!(count = persisted.favorites.len(), "loaded favorites");

        Ok(Self {
            store,
            favorites: RwLock::new(persisted.favorites),
        })
    }

    pub async fn list(&self) -> Vec<FavoriteLine> {
        self.favorites.read().await.clone()
    }

    /// Save a line. If it is already a favorite, the existing entry is
    /// returned unchanged.
    pub async fn add(
        &self,
        line_code: i64,
        line_name: impl Into<String>,
        nickname: Option<String>,
    ) -> Result<FavoriteLine, StoreError> {
        let mut guard = self.favorites.write().await;
        if let Some(existing) = guard.iter().find(|f| f.line_code == line_code) {
            return Ok(existing.clone());
        }

        let favorite = FavoriteLine {
            id: Uuid::new_v4(),
            line_code,
            line_name: line_name.into(),
            nickname: nickname.filter(|n| !n.trim().is_empty()),
            added_at: Utc::now(),
            notifications: true,
        };

        let mut next = guard.clone();
        next.push(favorite.clone());
        self.persist(&next).await?;
        *guard = next;

        Ok(favorite)
    }

    /// Remove a favorite. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.favorites.write().await;
        let next: Vec<_> = guard.iter().filter(|f| f.id != id).cloned().collect();
        if next.len() == guard.len() {
            return Ok(false);
        }

        self.persist(&next).await?;
        *guard = next;
        Ok(true)
    }

    pub async fn update(
        &self,
        id: Uuid,
        update: FavoriteUpdate,
    ) -> Result<FavoriteLine, StoreError> {
        self.modify(id, |favorite| {
            if let Some(name) = update.line_name {
                favorite.line_name = name;
            }
            if let Some(nickname) = update.nickname {
                favorite.nickname = Some(nickname).filter(|n| !n.trim().is_empty());
            }
            if let Some(notifications) = update.notifications {
                favorite.notifications = notifications;
            }
        })
        .await
    }

    pub async fn toggle_notifications(&self, id: Uuid) -> Result<FavoriteLine, StoreError> {
        self.modify(id, |favorite| favorite.notifications = !favorite.notifications)
            .await
    }

    pub async fn is_favorite(&self, line_code: i64) -> bool {
        self.favorites
            .read()
            .await
            .iter()
            .any(|f| f.line_code == line_code)
    }

    pub async fn by_line_code(&self, line_code: i64) -> Option<FavoriteLine> {
        self.favorites
            .read()
            .await
            .iter()
            .find(|f| f.line_code == line_code)
            .cloned()
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.favorites.write().await;
        self.persist(&[]).await?;
        guard.clear();
        Ok(())
    }

    async fn modify<F>(&self, id: Uuid, f: F) -> Result<FavoriteLine, StoreError>
    where
        F: FnOnce(&mut FavoriteLine),
    {
        let mut guard = self.favorites.write().await;
        let mut next = guard.clone();
        let favorite = next
            .iter_mut()
            .find(|fav| fav.id == id)
            .ok_or(StoreError::NotFound(id))?;
        f(favorite);
        let updated = favorite.clone();

        self.persist(&next).await?;
        *guard = next;
        Ok(updated)
    }

    async fn persist(&self, favorites: &[FavoriteLine]) -> Result<(), StoreError> {
        #[derive(Serialize)]
        struct View<'a> {
            favorites: &'a [FavoriteLine],
        }
        save(self.store.as_ref(), FAVORITES_KEY, &View { favorites }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    async fn open() -> (FavoritesStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let favorites = FavoritesStore::open(store.clone()).await.unwrap();
        (favorites, store)
    }

    #[tokio::test]
    async fn add_is_idempotent_per_line() {
        let (favorites, _) = open().await;

        let first = favorites.add(1273, "8000 - TERMINAL LAPA", None).await.unwrap();
        let again = favorites.add(1273, "other name", Some("work".into())).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(favorites.list().await.len(), 1);
        assert!(first.notifications);
    }

    #[tokio::test]
    async fn lookups_by_line_code() {
        let (favorites, _) = open().await;
        favorites.add(1273, "A", None).await.unwrap();

        assert!(favorites.is_favorite(1273).await);
        assert!(!favorites.is_favorite(1).await);
        assert_eq!(favorites.by_line_code(1273).await.unwrap().line_name, "A");
    }

    #[tokio::test]
    async fn toggle_and_update() {
        let (favorites, _) = open().await;
        let fav = favorites.add(1273, "A", Some("home".into())).await.unwrap();

        let toggled = favorites.toggle_notifications(fav.id).await.unwrap();
        assert!(!toggled.notifications);

        let updated = favorites
            .update(
                fav.id,
                FavoriteUpdate {
                    nickname: Some(String::new()),
                    line_name: Some("B".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.line_name, "B");
        assert!(updated.nickname.is_none());
        assert!(!updated.notifications);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (favorites, _) = open().await;
        let id = Uuid::new_v4();

        assert!(matches!(
            favorites.toggle_notifications(id).await,
            Err(StoreError::NotFound(missing)) if missing == id
        ));
        assert!(!favorites.remove(id).await.unwrap());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let (favorites, store) = open().await;
        let keep = favorites.add(1, "keep", None).await.unwrap();
        let gone = favorites.add(2, "gone", None).await.unwrap();
        assert!(favorites.remove(gone.id).await.unwrap());

        let reopened = FavoritesStore::open(store).await.unwrap();
        assert_eq!(reopened.list().await, vec![keep]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (favorites, store) = open().await;
        favorites.add(1, "a", None).await.unwrap();
        favorites.clear().await.unwrap();

        assert!(favorites.list().await.is_empty());
        let reopened = FavoritesStore::open(store).await.unwrap();
        assert!(reopened.list().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_state_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(FAVORITES_KEY, "garbage".into()).await.unwrap();

        let favorites = FavoritesStore::open(store).await.unwrap();
        assert!(favorites.list().await.is_empty());
    }
}
