use std::sync::Arc;

use mentor_types::{Essay, EssayId, EssayStatus};
use tokio::sync::watch;

/// Snapshot of the essay view cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EssayCache {
    /// Most recently fetched page(s), newest inserts first
    pub essays: Vec<Essay>,
    pub current: Option<Essay>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Ordered cache of the current user's essays.
///
/// Mutations are last-writer-wins per id; nothing is merged.
#[derive(Clone)]
pub struct EssayStore {
    state: Arc<watch::Sender<EssayCache>>,
}

impl std::fmt::Debug for EssayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EssayStore")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for EssayStore {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(EssayCache::default());
        Self {
            state: Arc::new(tx),
        }
    }
}

impl EssayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> watch::Receiver<EssayCache> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> EssayCache {
        self.state.borrow().clone()
    }

    pub fn essays(&self) -> Vec<Essay> {
        self.state.borrow().essays.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().essays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: EssayId) -> Option<Essay> {
        self.state
            .borrow()
            .essays
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn current(&self) -> Option<Essay> {
        self.state.borrow().current.clone()
    }

    pub fn by_status(&self, status: EssayStatus) -> Vec<Essay> {
        self.state
            .borrow()
            .essays
            .iter()
            .filter(|e| e.status == status)
            .cloned()
            .collect()
    }

    pub fn drafts(&self) -> Vec<Essay> {
        self.by_status(EssayStatus::Draft)
    }

    pub fn analyzed(&self) -> Vec<Essay> {
        self.by_status(EssayStatus::Analyzed)
    }

    pub fn set_essays(&self, essays: Vec<Essay>) {
        self.state.send_modify(|cache| cache.essays = essays);
    }

    /// Optimistic insert at the front.
    pub fn add(&self, essay: Essay) {
        self.state.send_modify(|cache| cache.essays.insert(0, essay));
    }

    /// Replace the entry with the same id (and `current` if it matches).
    /// Returns false when the essay is not cached.
    pub fn update(&self, essay: Essay) -> bool {
        let mut found = false;
        self.state.send_if_modified(|cache| {
            let mut changed = false;
            if let Some(current) = cache.current.as_mut().filter(|c| c.id == essay.id) {
                *current = essay.clone();
                changed = true;
            }
            if let Some(slot) = cache.essays.iter_mut().find(|e| e.id == essay.id) {
                *slot = essay;
                found = true;
                changed = true;
            }
            changed
        });
        found
    }

    /// Update in place, or prepend when absent.
    pub fn upsert(&self, essay: Essay) {
        self.state.send_modify(|cache| {
            if let Some(current) = cache.current.as_mut().filter(|c| c.id == essay.id) {
                *current = essay.clone();
            }
            match cache.essays.iter_mut().find(|e| e.id == essay.id) {
                Some(slot) => *slot = essay,
                None => cache.essays.insert(0, essay),
            }
        });
    }

    pub fn remove(&self, id: EssayId) -> bool {
        let mut removed = false;
        self.state.send_if_modified(|cache| {
            let before = cache.essays.len();
            cache.essays.retain(|e| e.id != id);
            removed = cache.essays.len() != before;
            let cleared_current = cache.current.as_ref().is_some_and(|c| c.id == id);
            if cleared_current {
                cache.current = None;
            }
            removed || cleared_current
        });
        removed
    }

    pub fn set_current(&self, essay: Option<Essay>) {
        self.state.send_modify(|cache| cache.current = essay);
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|cache| {
            let changed = cache.loading != loading;
            cache.loading = loading;
            changed
        });
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_modify(|cache| cache.error = error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn essay(id: EssayId, status: EssayStatus) -> Essay {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": format!("Essay {id}"),
            "theme": "Tema",
            "content": "um dois três",
            "status": status,
            "createdAt": "2024-03-01T10:00:00",
            "updatedAt": "2024-03-01T10:00:00"
        }))
        .unwrap()
    }

    #[test]
    fn test_add_prepends() {
        let store = EssayStore::new();
        store.set_essays(vec![essay(1, EssayStatus::Draft), essay(2, EssayStatus::Analyzed)]);
        store.add(essay(3, EssayStatus::Draft));

        let ids: Vec<_> = store.essays().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(store.drafts().len(), 2);
        assert_eq!(store.analyzed().len(), 1);
    }

    #[test]
    fn test_update_replaces_entry_and_current() {
        let store = EssayStore::new();
        store.set_essays(vec![essay(1, EssayStatus::Submitted)]);
        store.set_current(Some(essay(1, EssayStatus::Submitted)));

        assert!(store.update(essay(1, EssayStatus::Analyzed)));
        assert_eq!(store.get(1).unwrap().status, EssayStatus::Analyzed);
        assert_eq!(store.current().unwrap().status, EssayStatus::Analyzed);

        assert!(!store.update(essay(9, EssayStatus::Analyzed)));
        assert!(store.get(9).is_none());
    }

    #[test]
    fn test_upsert_inserts_missing() {
        let store = EssayStore::new();
        store.upsert(essay(4, EssayStatus::Submitted));
        store.upsert(essay(4, EssayStatus::Analyzed));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(4).unwrap().status, EssayStatus::Analyzed);
    }

    #[test]
    fn test_remove_clears_current() {
        let store = EssayStore::new();
        store.set_essays(vec![essay(1, EssayStatus::Draft), essay(2, EssayStatus::Draft)]);
        store.set_current(Some(essay(2, EssayStatus::Draft)));

        assert!(store.remove(2));
        assert!(store.current().is_none());
        assert!(!store.remove(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let store = EssayStore::new();
        let mut rx = store.subscribe();
        store.set_loading(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);

        store.set_loading(true);
        assert!(!rx.has_changed().unwrap());
        store.set_error(Some("boom".into()));
        assert_eq!(store.snapshot().error.as_deref(), Some("boom"));
    }
}
