use crate::config::AppConfig;
use crate::storage::{BlobStore, LocalBlobStore};
use crate::store::{MemoryStore, PgStore, Store};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store = match &config.database_url {
            Some(url) => {
                let pg = PgStore::connect(url).await?;
                pg.migrate().await?;
                info!("using postgres store");
                Arc::new(pg) as Arc<dyn Store>
            }
            None => {
                warn!("DATABASE_URL not set; data lives in memory and is lost on exit");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        let blobs =
            Arc::new(LocalBlobStore::new(config.files_dir.clone()).await?) as Arc<dyn BlobStore>;

        Ok(Self {
            store,
            config,
            blobs,
        })
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            config,
            blobs,
        }
    }

    /// In-memory store plus a blob dir rooted at `files_dir`.
    #[cfg(test)]
    pub async fn fake(files_dir: &std::path::Path) -> Self {
        Self::fake_with(AppConfig::for_tests(files_dir.to_path_buf())).await
    }

    /// Like [`AppState::fake`], blob dir taken from `config.files_dir`.
    #[cfg(test)]
    pub async fn fake_with(config: AppConfig) -> Self {
        let blobs = Arc::new(
            LocalBlobStore::new(config.files_dir.clone())
                .await
                .expect("blob dir should be creatable"),
        ) as Arc<dyn BlobStore>;
        Self::from_parts(Arc::new(MemoryStore::new()), Arc::new(config), blobs)
    }
}
