use crate::PreferencesStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tidal_core::{CoreError, Preferences};
use tokio::sync::Mutex;

/// In-process store for embedders and tests. Counts saves and can be told to fail them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Preferences>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            document: Mutex::new(preferences),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub async fn stored(&self) -> Preferences {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl PreferencesStore for MemoryStore {
    async fn load(&self) -> Result<Preferences, CoreError> {
        Ok(self.document.lock().await.clone())
    }

    async fn save_atomic(&self, preferences: &Preferences) -> Result<(), CoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store is read-only",
            )));
        }
        *self.document.lock().await = preferences.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
