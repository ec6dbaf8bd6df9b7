//! Search history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::olhovivo::{ProcessedBusLine, ProcessedBusStop};
use crate::storage::KeyValueStore;

use super::{StoreError, load, save};

/// Storage key of the history document.
pub const HISTORY_KEY: &str = "bussp-search-history";

/// Oldest items beyond this are dropped.
pub const MAX_HISTORY_ITEMS: usize = 100;

/// Default number of items for `recent` and `frequent`.
const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Line,
    Stop,
    Address,
}

/// The record the rider picked from a search, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "lowercase")]
pub enum SearchResult {
    Line(ProcessedBusLine),
    Stop(ProcessedBusStop),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryItem {
    pub id: Uuid,
    pub query: String,
    pub kind: SearchKind,
    pub result: Option<SearchResult>,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    history: Vec<SearchHistoryItem>,
}

/// Search history, newest first, without case-insensitive duplicates of the
/// same kind.
pub struct SearchHistoryStore {
    store: Arc<dyn KeyValueStore>,
    history: RwLock<Vec<SearchHistoryItem>>,
}

impl SearchHistoryStore {
    /// Load history from `store`. Undecodable state loads as empty.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let persisted: Persisted = load(store.as_ref(), HISTORY_KEY).await?;
        Ok(Self {
            store,
            history: RwLock::new(persisted.history),
        })
    }

    pub async fn list(&self) -> Vec<SearchHistoryItem> {
        self.history.read().await.clone()
    }

    /// Record a search at the top of the history. A previous search with the
    /// same query (ignoring case) and kind is replaced.
    pub async fn add(
        &self,
        query: &str,
        kind: SearchKind,
        result: Option<SearchResult>,
    ) -> Result<SearchHistoryItem, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoreError::EmptyQuery);
        }

        let item = SearchHistoryItem {
            id: Uuid::new_v4(),
            query: query.to_string(),
            kind,
            result,
            searched_at: Utc::now(),
        };

        let mut guard = self.history.write().await;
        let lowered = query.to_lowercase();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.push(item.clone());
        next.extend(
            guard
                .iter()
                .filter(|old| !(old.kind == kind && old.query.to_lowercase() == lowered))
                .cloned(),
        );
        next.truncate(MAX_HISTORY_ITEMS);

        self.persist(&next).await?;
        *guard = next;
        Ok(item)
    }

    /// Remove an item. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.history.write().await;
        let next: Vec<_> = guard.iter().filter(|item| item.id != id).cloned().collect();
        if next.len() == guard.len() {
            return Ok(false);
        }

        self.persist(&next).await?;
        *guard = next;
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.history.write().await;
        self.persist(&[]).await?;
        guard.clear();
        Ok(())
    }

    /// Newest searches first.
    pub async fn recent(&self, limit: Option<usize>) -> Vec<SearchHistoryItem> {
        let mut items = self.list().await;
        items.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
        items.truncate(limit.unwrap_or(DEFAULT_LIMIT));
        items
    }

    /// Most repeated `(query, kind)` pairs first, keeping the newest item of
    /// each pair. Ties keep history order.
    pub async fn frequent(&self, limit: Option<usize>) -> Vec<SearchHistoryItem> {
        let history = self.history.read().await;

        let mut groups: Vec<(usize, &SearchHistoryItem)> = Vec::new();
        for item in history.iter() {
            match groups
                .iter_mut()
                .find(|(_, first)| first.query == item.query && first.kind == item.kind)
            {
                Some((count, _)) => *count += 1,
                None => groups.push((1, item)),
            }
        }

        groups.sort_by(|a, b| b.0.cmp(&a.0));
        groups
            .into_iter()
            .take(limit.unwrap_or(DEFAULT_LIMIT))
            .map(|(_, item)| item.clone())
            .collect()
    }

    async fn persist(&self, history: &[SearchHistoryItem]) -> Result<(), StoreError> {
        #[derive(Serialize)]
        struct View<'a> {
            history: &'a [SearchHistoryItem],
        }
        save(self.store.as_ref(), HISTORY_KEY, &View { history }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::olhovivo::BusLine;
    use crate::olhovivo::convert::process_line;
    use crate::storage::MemoryStore;

    async fn open() -> (SearchHistoryStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let history = SearchHistoryStore::open(store.clone()).await.unwrap();
        (history, store)
    }

    #[tokio::test]
    async fn newest_first_and_trimmed() {
        let (history, _) = open().await;
        history.add("  8000 ", SearchKind::Line, None).await.unwrap();
        history.add("Lapa", SearchKind::Line, None).await.unwrap();

        let queries: Vec<_> = history.list().await.into_iter().map(|i| i.query).collect();
        assert_eq!(queries, vec!["Lapa", "8000"]);
    }

    #[tokio::test]
    async fn duplicate_moves_to_top() {
        let (history, _) = open().await;
        history.add("lapa", SearchKind::Line, None).await.unwrap();
        history.add("8000", SearchKind::Line, None).await.unwrap();
        history.add("LAPA", SearchKind::Line, None).await.unwrap();

        let items = history.list().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].query, "LAPA");
    }

    #[tokio::test]
    async fn same_query_different_kind_is_kept() {
        let (history, _) = open().await;
        history.add("lapa", SearchKind::Line, None).await.unwrap();
        history.add("lapa", SearchKind::Stop, None).await.unwrap();
        assert_eq!(history.list().await.len(), 2);
    }

    #[tokio::test]
    async fn history_is_capped() {
        let (history, _) = open().await;
        for i in 0..(MAX_HISTORY_ITEMS + 5) {
            history.add(&format!("q{i}"), SearchKind::Address, None).await.unwrap();
        }

        let items = history.list().await;
        assert_eq!(items.len(), MAX_HISTORY_ITEMS);
        assert_eq!(items[0].query, format!("q{}", MAX_HISTORY_ITEMS + 4));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let (history, _) = open().await;
        assert!(matches!(
            history.add("   ", SearchKind::Line, None).await,
            Err(StoreError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn recent_respects_limit() {
        let (history, _) = open().await;
        for q in ["a1", "b2", "c3", "d4", "e5", "f6"] {
            history.add(q, SearchKind::Line, None).await.unwrap();
        }

        assert_eq!(history.recent(None).await.len(), 5);
        let two = history.recent(Some(2)).await;
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].query, "f6");
    }

    #[tokio::test]
    async fn frequent_groups_by_query_and_kind() {
        let (history, _) = open().await;
        history.add("a1", SearchKind::Line, None).await.unwrap();
        history.add("b2", SearchKind::Line, None).await.unwrap();

        let frequent = history.frequent(Some(10)).await;
        assert_eq!(frequent.len(), 2);
        assert_eq!(frequent[0].query, "b2");
    }

    #[tokio::test]
    async fn result_round_trips_through_storage() {
        let (history, store) = open().await;
        let line = process_line(BusLine {
            cl: 1273,
            lc: false,
            lt: "8000".into(),
            sl: 1,
            tp: "PCA.RAMOS DE AZEVEDO".into(),
            ts: "TERMINAL LAPA".into(),
        });
        history
            .add("8000", SearchKind::Line, Some(SearchResult::Line(line.clone())))
            .await
            .unwrap();

        let reopened = SearchHistoryStore::open(store).await.unwrap();
        let items = reopened.list().await;
        assert_eq!(items[0].result, Some(SearchResult::Line(line)));
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let (history, _) = open().await;
        let item = history.add("a1", SearchKind::Line, None).await.unwrap();
        history.add("b2", SearchKind::Line, None).await.unwrap();

        assert!(history.remove(item.id).await.unwrap());
        assert_eq!(history.list().await.len(), 1);

        history.clear().await.unwrap();
        assert!(history.list().await.is_empty());
    }
}
