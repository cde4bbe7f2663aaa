use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory map keyed by peer id (or depot key) used by the volatile backend.
pub struct KeyedMemoryStore<V>
where
    V: Clone + Send,
{
    entries: Mutex<HashMap<String, V>>,
}

impl<V> Default for KeyedMemoryStore<V>
where
    V: Clone + Send,
{
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> KeyedMemoryStore<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Returns the entry only when `keep` accepts it; rejected entries are dropped.
    pub async fn get_if(&self, key: &str, keep: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(value) if keep(value) => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: &str, value: V) {
        self.entries.lock().await.insert(key.to_string(), value);
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
