// Persistence gateway trait for mirroring stores across sessions
use crate::application::error::PersistenceError;
use async_trait::async_trait;

/// Key holding the tracked context the persisted stores belong to
pub const SESSION_CONTEXT_KEY: &str = "session-context";

/// The three persisted store kinds and their fixed keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Window,
    Fault,
    Event,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [StoreKind::Window, StoreKind::Fault, StoreKind::Event];

    pub fn key(self) -> &'static str {
        match self {
            StoreKind::Window => "window-history",
            StoreKind::Fault => "fault-history",
            StoreKind::Event => "event-history",
        }
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Load a serialized blob; `None` when nothing was stored under `key`
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Overwrite the blob stored under `key`
    async fn save(&self, key: &str, state: &str) -> Result<(), PersistenceError>;

    /// Remove `key`; removing an absent key succeeds
    async fn clear(&self, key: &str) -> Result<(), PersistenceError>;
}
