//! In-memory session store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::traits::store::SessionStore;
use crate::types::session::Session;

/// Sessions held in a process-local map. The default store; a persistent
/// implementation can be dropped in behind the same trait.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> Arc<Mutex<Session>> {
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, handle.clone());
        handle
    }

    async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    async fn ids(&self) -> Vec<Uuid> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::settings::SearchSettings;

    fn session() -> Session {
        Session::new(SearchSettings {
            search_terms: vec!["rust".to_string()],
            sources: vec!["remotive".to_string()],
            blacklist_companies: vec![],
            blacklist_title_words: vec![],
            blacklist_description_words: vec![],
            country_whitelist: vec![],
            languages: vec![],
            llm: Default::default(),
        })
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = MemorySessionStore::new();
        let s = session();
        let id = s.id;

        store.insert(s).await;
        assert!(store.get(id).await.is_some());
        assert_eq!(store.ids().await, vec![id]);
    }

    #[tokio::test]
    async fn insert_replaces_by_id() {
        let store = MemorySessionStore::new();
        let s = session();
        let id = s.id;

        store.insert(s.clone()).await;
        store.insert(s).await;
        assert_eq!(store.len(), 1);
        assert!(store.remove(id).await);
        assert!(!store.remove(id).await);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = MemorySessionStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }
}
