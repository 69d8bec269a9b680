use async_trait::async_trait;
use std::sync::Arc;
use tidal_core::{CoreError, Preferences};
use tokio::sync::Mutex;
use tracing::{debug, error};

pub mod json_file;
pub mod memory;


pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Where the preferences document lives between runs.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn load(&self) -> Result<Preferences, CoreError>;

    /// Replaces the stored document. Readers never observe a partial write.
    async fn save_atomic(&self, preferences: &Preferences) -> Result<(), CoreError>;
}

/// The process-wide preferences document and the store backing it.
///
/// All writers go through [`SharedPreferences::update`], which serializes
/// them and only commits a change once it has been saved.
#[derive(Clone)]
pub struct SharedPreferences {
    current: Arc<Mutex<Preferences>>,
    store: Arc<dyn PreferencesStore>,
}

impl SharedPreferences {
    pub async fn load(store: Arc<dyn PreferencesStore>) -> Result<Self, CoreError> {
        let preferences = store.load().await?;
        Ok(Self {
            current: Arc::new(Mutex::new(preferences)),
            store,
        })
    }

    pub fn new(preferences: Preferences, store: Arc<dyn PreferencesStore>) -> Self {
        Self {
            current: Arc::new(Mutex::new(preferences)),
            store,
        }
    }

    pub async fn snapshot(&self) -> Preferences {
        self.current.lock().await.clone()
    }

    /// Applies `f` to a copy of the document and persists it.
    ///
    /// If `f` fails or the save fails, the in-memory document is left as it was.
    pub async fn update<F, R>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Preferences) -> Result<R, CoreError>,
    {
        let mut current = self.current.lock().await;
        let mut candidate = current.clone();
        let result = f(&mut candidate)?;

        if candidate == *current {
            debug!("Preferences unchanged, skipping save");
            return Ok(result);
        }

        if let Err(e) = self.store.save_atomic(&candidate).await {
            error!("Unable to save preferences, keeping previous document: {}", e);
            return Err(e);
        }
        *current = candidate;
        Ok(result)
    }
}
