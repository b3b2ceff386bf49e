use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::fs;
use tokio::sync::RwLock;

use crate::{
    error::{DownloadError, Result},
    types::EmittedFile,
};

/// Host action persisting an emitted file
#[async_trait]
pub trait SaveAction: Send + Sync {
    /// Persist the file, returning where it ended up
    async fn save(&self, file: &EmittedFile) -> Result<String>;

    fn identifier(&self) -> String;
}

/// Writes emitted files into a directory
pub struct DirectorySink {
    root_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Keep only the final component so a name cannot escape the directory
    fn target_path(&self, file_name: &str) -> PathBuf {
        let name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());
        self.root_dir.join(name)
    }
}

#[async_trait]
impl SaveAction for DirectorySink {
    async fn save(&self, file: &EmittedFile) -> Result<String> {
        let path = self.target_path(&file.file_name);

        fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| DownloadError::EmissionFailed {
                message: format!("cannot create {}: {}", self.root_dir.display(), e),
            })?;
        fs::write(&path, &file.content)
            .await
            .map_err(|e| DownloadError::EmissionFailed {
                message: format!("cannot write {}: {}", path.display(), e),
            })?;

        info!("Download saved: {}", path.display());
        Ok(path.display().to_string())
    }

    fn identifier(&self) -> String {
        format!("dir://{}", self.root_dir.display())
    }
}

/// Keeps emitted files in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    saved: Arc<RwLock<Vec<EmittedFile>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn saved(&self) -> Vec<EmittedFile> {
        self.saved.read().await.clone()
    }
}

#[async_trait]
impl SaveAction for MemorySink {
    async fn save(&self, file: &EmittedFile) -> Result<String> {
        let mut saved = self.saved.write().await;
        saved.push(file.clone());
        Ok(format!("memory:{}", file.file_name))
    }

    fn identifier(&self) -> String {
        "memory".to_string()
    }
}
