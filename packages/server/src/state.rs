use std::sync::Arc;

use crate::services::host_sync::SyncRegistry;
use crate::store::{MemoryStore, RoomStore};
use crate::utils::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RoomStore>,
    pub config: Arc<ServerConfig>,
    pub syncs: Arc<SyncRegistry>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), ServerConfig::default())
    }

    pub fn with_store(store: Arc<dyn RoomStore>, config: ServerConfig) -> Self {
        AppState {
            store,
            config: Arc::new(config),
            syncs: Arc::new(SyncRegistry::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
