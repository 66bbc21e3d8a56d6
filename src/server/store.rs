//! In-memory response store.
//!
//! Keyed by response id, listed in insertion order. Nothing survives a restart.
//! With a capacity, the oldest entries are evicted first.

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct ResponseStore<T> {
    inner: RwLock<Entries<T>>,
    capacity: Option<usize>,
}

#[derive(Debug)]
struct Entries<T> {
    by_id: HashMap<String, T>,
    order: VecDeque<String>,
}

impl<T> Default for ResponseStore<T> {
    fn default() -> Self {
        ResponseStore { inner: RwLock::new(Entries { by_id: HashMap::new(), order: VecDeque::new() }), capacity: None }
    }
}

impl<T: Clone> ResponseStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `capacity` entries; `None` or `0` is unbounded.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        ResponseStore { capacity: capacity.filter(|cap| *cap > 0), ..Self::default() }
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub async fn put(&self, id: String, value: T) {
        let mut entries = self.inner.write().await;
        if entries.by_id.insert(id.clone(), value).is_some() {
            return;
        }
        entries.order.push_back(id);

        let Some(capacity) = self.capacity else { return };
        while entries.order.len() > capacity {
            let Some(oldest) = entries.order.pop_front() else { break };
            entries.by_id.remove(&oldest);
            tracing::trace!(id = %oldest, "evicted stored response");
        }
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    /// Up to `limit` entries, oldest first.
    pub async fn list(&self, limit: usize) -> Vec<T> {
        let entries = self.inner.read().await;
        entries.order.iter().filter_map(|id| entries.by_id.get(id)).take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn put_then_get_and_list_in_order() {
        let store = ResponseStore::new();
        store.put("b".to_string(), 2).await;
        store.put("a".to_string(), 1).await;
        store.put("b".to_string(), 20).await;

        assert_eq!(store.get("b").await, Some(20));
        assert_eq!(store.get("missing").await, None);
        assert_eq!(store.list(10).await, [20, 1]);
        assert_eq!(store.list(1).await, [20]);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_first() {
        let store = ResponseStore::with_capacity(Some(2));
        store.put("a".to_string(), 1).await;
        store.put("b".to_string(), 2).await;
        store.put("a".to_string(), 10).await;
        assert_eq!(store.list(10).await, [10, 2]);

        store.put("c".to_string(), 3).await;
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.list(10).await, [2, 3]);
        assert_eq!(store.len().await, 2);

        let unbounded = ResponseStore::with_capacity(Some(0));
        for n in 0..5 {
            unbounded.put(n.to_string(), n).await;
        }
        assert_eq!(unbounded.len().await, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_do_not_lose_entries() {
        let store = Arc::new(ResponseStore::new());
        let writers: Vec<_> = (0..64)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let id = format!("resp_{n}");
                    store.put(id.clone(), n).await;
                    assert_eq!(store.get(&id).await, Some(n));
                })
            })
            .collect();

        for writer in writers {
            writer.await.unwrap();
        }
        assert_eq!(store.len().await, 64);
    }
}
