// File-backed persistence gateway: one JSON file per key
use crate::application::error::PersistenceError;
use crate::application::persistence_gateway::PersistenceGateway;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl PersistenceGateway for FilePersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, state: &str) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // rename keeps readers from ever seeing a half-written blob
        let target = self.path_for(key);
        let staging = self.dir.join(format!(".{}.json.tmp", key));
        tokio::fs::write(&staging, state).await?;
        tokio::fs::rename(&staging, &target).await?;

        tracing::debug!(key, bytes = state.len(), "Persisted state");
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
