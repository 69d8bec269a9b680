use crate::PreferencesStore;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tidal_core::{CoreError, Preferences};
use tracing::{info, warn};

/// Pretty-printed JSON document on disk.
///
/// Saves write a temporary file in the same directory, sync it, then rename
/// it over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut file = NamedTempFile::new_in(&dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| CoreError::Io(e.error))?;
    Ok(())
}

async fn run_blocking<T, F>(f: F) -> Result<T, CoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal {
            message: format!("preferences I/O task failed: {}", e),
        })?
}

#[async_trait]
impl PreferencesStore for JsonFileStore {
    async fn load(&self) -> Result<Preferences, CoreError> {
        let path = self.path.clone();
        let contents = run_blocking(move || match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Io(e)),
        })
        .await?;

        match contents {
            Some(contents) => {
                let preferences: Preferences = serde_json::from_str(&contents)?;
                info!("Loaded preferences from {}", self.path.display());
                Ok(preferences)
            }
            None => {
                warn!(
                    "Preferences not found at {}, writing defaults",
                    self.path.display()
                );
                let preferences = Preferences::default();
                self.save_atomic(&preferences).await?;
                Ok(preferences)
            }
        }
    }

    async fn save_atomic(&self, preferences: &Preferences) -> Result<(), CoreError> {
        let contents = serde_json::to_vec_pretty(preferences)?;
        let path = self.path.clone();
        run_blocking(move || write_atomic(&path, &contents)).await?;
        info!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}
