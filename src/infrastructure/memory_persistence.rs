// In-memory persistence gateway, used when mirroring to disk is disabled
use crate::application::error::PersistenceError;
use crate::application::persistence_gateway::PersistenceGateway;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryPersistence {
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> T {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut entries)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryPersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, state: &str) -> Result<(), PersistenceError> {
        self.with_entries(|entries| entries.insert(key.to_string(), state.to_string()));
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), PersistenceError> {
        self.with_entries(|entries| entries.remove(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = InMemoryPersistence::default();
        assert_eq!(store.load("window-history").await.unwrap(), None);

        store.save("window-history", "{}").await.unwrap();
        assert_eq!(store.load("window-history").await.unwrap().as_deref(), Some("{}"));

        store.clear("window-history").await.unwrap();
        store.clear("window-history").await.unwrap();
        assert_eq!(store.load("window-history").await.unwrap(), None);
    }
}
