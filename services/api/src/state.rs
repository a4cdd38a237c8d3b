//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the tutor service,
//! the topic catalog and the in-memory registry of learner sessions.

use describe_core::{session::SessionHandle, topic::TopicCatalog, tutor::TutorService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::info;
use uuid::Uuid;

struct Entry {
    handle: Arc<SessionHandle>,
    last_active: Instant,
}

/// Live sessions by id. Nothing here outlives the process; sessions left
/// idle are evicted by `evict_idle`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub async fn create(&self) -> (Uuid, Arc<SessionHandle>) {
        let id = Uuid::new_v4();
        let handle = Arc::new(SessionHandle::new());
        self.sessions.write().await.insert(
            id,
            Entry {
                handle: handle.clone(),
                last_active: Instant::now(),
            },
        );
        (id, handle)
    }

    /// Looks up a session and marks it active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_active = Instant::now();
        Some(entry.handle.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session untouched for at least `max_idle` that no request
    /// is currently using. Returns how many were removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_active.elapsed() < max_idle || Arc::strong_count(&entry.handle) > 1
        });
        before - sessions.len()
    }

    /// Runs `evict_idle` every `every` until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    let live_sessions = registry.count().await;
                    info!(
                        evicted,
                        live_sessions,
                        "Evicted idle sessions"
                    );
                }
            }
        })
    }
}

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub tutor: Arc<dyn TutorService>,
    pub topics: Arc<TopicCatalog>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(tutor: Arc<dyn TutorService>, topics: TopicCatalog) -> Self {
        Self {
            tutor,
            topics: Arc::new(topics),
            sessions: Arc::new(SessionRegistry::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_create_get_remove() {
        let registry = SessionRegistry::default();
        let (id, handle) = registry.create().await;

        let fetched = registry.get(id).await.expect("session should exist");
        assert!(Arc::ptr_eq(&handle, &fetched));
        assert_eq!(registry.count().await, 1);

        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.get(id).await.is_none());
    }

    #[tokio::test]
    async fn test_registry_sessions_are_independent() {
        let registry = SessionRegistry::default();
        let (a, _) = registry.create().await;
        let (b, _) = registry.create().await;
        assert_ne!(a, b);
        assert_eq!(registry.count().await, 2);
    }

    #[tokio::test]
    async fn test_evict_idle_removes_only_stale_sessions() {
        let registry = SessionRegistry::default();
        let (stale, _) = registry.create().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let (fresh, _) = registry.create().await;

        assert_eq!(registry.evict_idle(Duration::from_millis(200)).await, 1);
        assert!(registry.get(stale).await.is_none());
        assert!(registry.get(fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_evict_idle_spares_sessions_in_use() {
        let registry = SessionRegistry::default();
        let (id, held) = registry.create().await;

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 0);
        drop(held);
        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert!(registry.get(id).await.is_none());
    }

    #[tokio::test]
    async fn test_get_refreshes_activity() {
        let registry = SessionRegistry::default();
        let (id, _) = registry.create().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(registry.get(id).await);

        assert_eq!(registry.evict_idle(Duration::from_millis(200)).await, 0);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let registry = Arc::new(SessionRegistry::default());
        registry.create().await;

        let sweeper = registry.spawn_sweeper(Duration::ZERO, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(registry.count().await, 0);
        sweeper.abort();
    }
}
