use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::memory::MemoryStore;
use crate::schema;
use crate::store::DataStore;
use crate::supabase::SupabaseClient;

/// Shared handler state: configuration plus the store every cell talks to.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DataStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Builds the store selected by `config.storage_backend`.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn DataStore> = match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory data store");
                Arc::new(MemoryStore::with_indexes(schema::unique_indexes()))
            }
            StorageBackend::Supabase => {
                info!("Using Supabase data API at {}", config.supabase_url);
                Arc::new(SupabaseClient::new(&config))
            }
        };

        Self::new(config, store)
    }
}
