//! In-process store backend.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
    sets: HashMap<String, HashSet<String>>,
}

impl MemoryState {
    /// Drop a key from every keyspace; returns whether it existed.
    fn remove_key(&mut self, key: &str) -> bool {
        let value = self.values.remove(key).is_some();
        let list = self.lists.remove(key).is_some();
        let set = self.sets.remove(key).is_some();
        value || list || set
    }
}

/// Store kept in process memory. Lost on restart; single process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.state.read().await.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.state
            .write()
            .await
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_list(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .lists
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_list(&self, key: &str, values: &[String]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if values.is_empty() {
            state.lists.remove(key);
        } else {
            state.lists.insert(key.to_string(), values.to_vec());
        }
        Ok(())
    }

    async fn list_append(&self, key: &str, value: &str) -> StoreResult<()> {
        self.state
            .write()
            .await
            .lists
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn list_remove(&self, key: &str, value: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let Some(list) = state.lists.get_mut(key) else {
            return Ok(0);
        };

        let before = list.len();
        list.retain(|item| item != value);
        let removed = (before - list.len()) as u64;

        if list.is_empty() {
            state.lists.remove(key);
        }
        Ok(removed)
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(members) = state.sets.get_mut(set) else {
            return Ok(false);
        };

        let removed = members.remove(member);
        if members.is_empty() {
            state.sets.remove(set);
        }
        Ok(removed)
    }

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .sets
            .get(set)
            .is_some_and(|members| members.contains(member)))
    }

    async fn delete_keys(&self, keys: &[String]) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        Ok(keys.iter().filter(|key| state.remove_key(key)).count() as u64)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let mut keys: Vec<String> = state
            .values
            .keys()
            .chain(state.lists.keys())
            .chain(state.sets.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "TCS").await.unwrap());
        assert!(!store.set_add("s", "TCS").await.unwrap());
        assert!(store.set_contains("s", "TCS").await.unwrap());

        assert!(store.set_remove("s", "TCS").await.unwrap());
        assert!(!store.set_remove("s", "TCS").await.unwrap());
        assert!(!store.set_contains("s", "TCS").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_operations() {
        let store = MemoryStore::new();
        store.list_append("l", "a").await.unwrap();
        store.list_append("l", "b").await.unwrap();
        store.list_append("l", "a").await.unwrap();
        assert_eq!(store.get_list("l").await.unwrap(), vec!["a", "b", "a"]);

        assert_eq!(store.list_remove("l", "a").await.unwrap(), 2);
        assert_eq!(store.get_list("l").await.unwrap(), vec!["b"]);

        store.set_list("l", &["x".to_string(), "y".to_string()]).await.unwrap();
        assert_eq!(store.get_list("l").await.unwrap(), vec!["x", "y"]);

        assert!(store.get_list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys_only() {
        let store = MemoryStore::new();
        store.set("a", "1").await.unwrap();
        store.list_append("b", "1").await.unwrap();

        let deleted = store
            .delete_keys(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let store = MemoryStore::new();
        store.set("stocks:data:TCS", "{}").await.unwrap();
        store.set("stocks:data:INFY", "{}").await.unwrap();
        store.list_append("stocks:radar", "{}").await.unwrap();

        let keys = store.keys_with_prefix("stocks:data:").await.unwrap();
        assert_eq!(keys, vec!["stocks:data:INFY", "stocks:data:TCS"]);
    }
}
