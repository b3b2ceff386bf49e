use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::RwLock;

use crate::{
    archive::{ArchiveBuilder, ArchiveCodec},
    cache::{CacheStatus, ProjectDataCache},
    emit::SaveAction,
    error::{DownloadError, ErrorKind, Result},
    index::{PathEntry, PathIndex},
    page::PageStateReader,
    source::ProjectSource,
    token::TokenLocator,
    types::{DownloadRequest, DownloadResult, EmittedFile, RequestKind},
};

/// Drives one download request from token lookup to the host save action
///
/// Every failure is turned into a [`DownloadResult`]; nothing here panics the
/// host. `Busy` means another request is still loading project data.
pub struct DownloadCoordinator {
    locator: TokenLocator,
    cache: ProjectDataCache,
    archiver: ArchiveBuilder,
    sink: Arc<dyn SaveAction>,
    token: RwLock<Option<String>>,
}

impl DownloadCoordinator {
    pub fn new(
        page: Arc<dyn PageStateReader>,
        source: Arc<dyn ProjectSource>,
        codec: Arc<dyn ArchiveCodec>,
        sink: Arc<dyn SaveAction>,
    ) -> Self {
        Self::from_parts(
            TokenLocator::new(page),
            ProjectDataCache::new(source),
            ArchiveBuilder::new(codec),
            sink,
        )
    }

    pub fn from_parts(
        locator: TokenLocator,
        cache: ProjectDataCache,
        archiver: ArchiveBuilder,
        sink: Arc<dyn SaveAction>,
    ) -> Self {
        Self {
            locator,
            cache,
            archiver,
            sink,
            token: RwLock::new(None),
        }
    }

    pub async fn handle(&self, request: &DownloadRequest) -> DownloadResult {
        match self.try_handle(request).await {
            Ok(location) => {
                info!("Download completed: {}", location);
                DownloadResult::ok()
            }
            Err(e) => {
                if e.kind() == ErrorKind::Busy {
                    info!("Download deferred: {}", e);
                } else {
                    error!("Download failed: {}", e);
                }
                DownloadResult::failure(&e)
            }
        }
    }

    /// Like [`handle`](Self::handle) but keeps the typed error
    pub async fn try_handle(&self, request: &DownloadRequest) -> Result<String> {
        let token = self.resolve_token(request).await?;
        let project_id = self.resolve_project_id(request)?;

        let index = match self.cache.ensure_loaded(&project_id, &token).await {
            Ok(CacheStatus::Ready(index)) => index,
            Ok(CacheStatus::InProgress) => return Err(DownloadError::Busy),
            Err(e) => {
                if e.kind() == ErrorKind::AuthFailed {
                    // force the next request to look the token up again
                    *self.token.write().await = None;
                }
                return Err(e);
            }
        };

        let path = normalize_path(request.path.as_deref());
        let file = match request.kind {
            RequestKind::SingleFile => self.single_file(&index, path).await?,
            RequestKind::Folder => self.archive(&index, path).await?,
            RequestKind::WholeProject => self.archive(&index, "").await?,
        };

        self.sink.save(&file).await
    }

    async fn resolve_token(&self, request: &DownloadRequest) -> Result<String> {
        if let Some(token) = request.token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        let token = self.locator.locate().ok_or(DownloadError::NoToken)?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    fn resolve_project_id(&self, request: &DownloadRequest) -> Result<String> {
        request
            .project_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.locator.page().project_id())
            .ok_or_else(|| {
                warn!("Project ID not found");
                DownloadError::NoProjectId
            })
    }

    async fn single_file(&self, index: &PathIndex, path: &str) -> Result<EmittedFile> {
        if index.is_folder(path) {
            debug!("{} is a folder, archiving instead", path);
            return self.archive(index, path).await;
        }

        let record = match index.lookup(path) {
            Some(PathEntry::Record(record)) => record,
            _ => {
                error!("Item data not found: {}", path);
                return Err(DownloadError::NotDownloadable {
                    path: path.to_string(),
                });
            }
        };

        let content = record.decode()?.ok_or_else(|| DownloadError::NotDownloadable {
            path: path.to_string(),
        })?;

        info!("Preparing file: {} (binary: {})", record.file_name(), record.is_binary);
        Ok(EmittedFile {
            file_name: record.file_name().to_string(),
            content,
            is_archive: false,
        })
    }

    async fn archive(&self, index: &PathIndex, root: &str) -> Result<EmittedFile> {
        let archive = self.archiver.build_archive(index, root).await?;
        Ok(EmittedFile {
            file_name: archive.file_name,
            content: archive.content,
            is_archive: true,
        })
    }

    pub fn locator(&self) -> &TokenLocator {
        &self.locator
    }

    pub fn cache(&self) -> &ProjectDataCache {
        &self.cache
    }

    /// Forget the remembered token so the page is searched again
    pub async fn forget_token(&self) {
        *self.token.write().await = None;
    }
}

fn normalize_path(path: Option<&str>) -> &str {
    path.unwrap_or("").trim_matches('/')
}
