use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::{
    error::{DownloadError, Result},
    index::PathIndex,
    source::ProjectSource,
    types::ProjectSnapshot,
};

/// Observable lifecycle of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Ready,
}

/// Outcome of [`ProjectDataCache::ensure_loaded`]
#[derive(Debug, Clone)]
pub enum CacheStatus {
    Ready(Arc<PathIndex>),
    /// Another caller's fetch is in flight; retry later
    InProgress,
}

enum CacheState {
    Empty,
    Loading,
    Ready(Arc<PathIndex>),
}

/// Owns the single live project snapshot and its path index
///
/// At most one fetch is in flight: the Empty -> Loading transition is checked
/// and set under one write guard that is released before the network call.
/// Failures return the cache to Empty so the next caller can retry.
#[derive(Clone)]
pub struct ProjectDataCache {
    source: Arc<dyn ProjectSource>,
    state: Arc<RwLock<CacheState>>,
}

impl ProjectDataCache {
    pub fn new(source: Arc<dyn ProjectSource>) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(CacheState::Empty)),
        }
    }

    pub async fn ensure_loaded(&self, project_id: &str, token: &str) -> Result<CacheStatus> {
        {
            let mut state = self.state.write().await;
            match &*state {
                CacheState::Ready(index) if index.snapshot().project_id == project_id => {
                    debug!("Data already available");
                    return Ok(CacheStatus::Ready(index.clone()));
                }
                CacheState::Loading => {
                    warn!("Fetch already in progress");
                    return Ok(CacheStatus::InProgress);
                }
                CacheState::Ready(index) => {
                    info!(
                        "Replacing snapshot of {} with project {}",
                        index.snapshot().project_id,
                        project_id
                    );
                }
                CacheState::Empty => {}
            }
            *state = CacheState::Loading;
        }

        info!("Data not loaded, fetching from {}", self.source.identifier());

        // The fetch owns its own task and installs its outcome even when the
        // caller stops waiting, so the state never stays Loading.
        let source = self.source.clone();
        let state = self.state.clone();
        let project_id = project_id.to_string();
        let token = token.to_string();
        let task = tokio::spawn(async move {
            let outcome = fetch_index(source.as_ref(), &project_id, &token).await;

            let mut state = state.write().await;
            match outcome {
                Ok(index) => {
                    *state = CacheState::Ready(index.clone());
                    info!(
                        "Project {} ready ({} files)",
                        project_id,
                        index.snapshot().files.len()
                    );
                    Ok(index)
                }
                Err(e) => {
                    *state = CacheState::Empty;
                    warn!("Fetch failed: {}", e);
                    Err(e)
                }
            }
        });

        match task.await {
            Ok(result) => result.map(CacheStatus::Ready),
            Err(e) => {
                *self.state.write().await = CacheState::Empty;
                Err(DownloadError::malformed(format!("fetch task failed: {}", e)))
            }
        }
    }

    pub async fn state(&self) -> LoadState {
        match &*self.state.read().await {
            CacheState::Empty => LoadState::Empty,
            CacheState::Loading => LoadState::Loading,
            CacheState::Ready(_) => LoadState::Ready,
        }
    }

    /// The installed index, if any
    pub async fn current(&self) -> Option<Arc<PathIndex>> {
        match &*self.state.read().await {
            CacheState::Ready(index) => Some(index.clone()),
            _ => None,
        }
    }

    /// Drop a ready snapshot so the next call fetches again
    ///
    /// Has no effect while a fetch is in flight.
    pub async fn discard(&self) {
        let mut state = self.state.write().await;
        if matches!(&*state, CacheState::Ready(_)) {
            *state = CacheState::Empty;
        }
    }
}

async fn fetch_index(
    source: &dyn ProjectSource,
    project_id: &str,
    token: &str,
) -> Result<Arc<PathIndex>> {
    let response = source.fetch_project(project_id, token).await?;
    let snapshot = ProjectSnapshot::from_response(project_id, response)?;
    Ok(Arc::new(PathIndex::build(Arc::new(snapshot))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{FileRecord, SourceCodeResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct MockSource {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        delay: Option<Duration>,
        fail_with: Option<u16>,
        files: Vec<FileRecord>,
    }

    impl MockSource {
        fn new(files: Vec<FileRecord>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: None,
                delay: None,
                fail_with: None,
                files,
            }
        }
    }

    #[async_trait]
    impl ProjectSource for MockSource {
        async fn fetch_project(&self, _project_id: &str, _token: &str) -> Result<SourceCodeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(status) = self.fail_with {
                return Err(DownloadError::AuthFailed { status });
            }
            Ok(SourceCodeResponse {
                name: Some("demo".to_string()),
                files: Some(self.files.clone()),
            })
        }

        fn identifier(&self) -> String {
            "mock".to_string()
        }
    }

    fn demo_files() -> Vec<FileRecord> {
        vec![FileRecord::text("a.txt", "hi"), FileRecord::text("dir/b.txt", "yo")]
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(MockSource {
            gate: Some(gate.clone()),
            ..MockSource::new(demo_files())
        });
        let cache = ProjectDataCache::new(source.clone());

        let (first, second, _) = tokio::join!(
            cache.ensure_loaded("p1", "t"),
            cache.ensure_loaded("p1", "t"),
            async { gate.notify_one() },
        );

        assert!(matches!(first.unwrap(), CacheStatus::Ready(_)));
        assert!(matches!(second.unwrap(), CacheStatus::InProgress));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state().await, LoadState::Ready);
    }

    #[tokio::test]
    async fn test_ready_is_reused() {
        let source = Arc::new(MockSource::new(demo_files()));
        let cache = ProjectDataCache::new(source.clone());

        let CacheStatus::Ready(first) = cache.ensure_loaded("p1", "t").await.unwrap() else {
            panic!("expected ready");
        };
        let CacheStatus::Ready(second) = cache.ensure_loaded("p1", "t").await.unwrap() else {
            panic!("expected ready");
        };

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_returns_to_empty() {
        let source = Arc::new(MockSource {
            fail_with: Some(401),
            ..MockSource::new(demo_files())
        });
        let cache = ProjectDataCache::new(source.clone());

        let err = cache.ensure_loaded("p1", "t").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthFailed);
        assert_eq!(cache.state().await, LoadState::Empty);

        // a later caller is allowed to try again
        let _ = cache.ensure_loaded("p1", "t").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_listing_is_data_error() {
        let cache = ProjectDataCache::new(Arc::new(MockSource::new(vec![])));

        let err = cache.ensure_loaded("p1", "t").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyOrMalformedData);
        assert_eq!(cache.state().await, LoadState::Empty);
        assert!(cache.current().await.is_none());
    }

    #[tokio::test]
    async fn test_other_project_replaces_snapshot() {
        let source = Arc::new(MockSource::new(demo_files()));
        let cache = ProjectDataCache::new(source.clone());

        cache.ensure_loaded("p1", "t").await.unwrap();
        cache.ensure_loaded("p2", "t").await.unwrap();

        let current = cache.current().await.unwrap();
        assert_eq!(current.snapshot().project_id, "p2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_discard() {
        let source = Arc::new(MockSource::new(demo_files()));
        let cache = ProjectDataCache::new(source.clone());

        cache.ensure_loaded("p1", "t").await.unwrap();
        cache.discard().await;
        assert_eq!(cache.state().await, LoadState::Empty);

        cache.ensure_loaded("p1", "t").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_still_completes() {
        let source = Arc::new(MockSource {
            delay: Some(Duration::from_millis(200)),
            ..MockSource::new(demo_files())
        });
        let cache = ProjectDataCache::new(source.clone());

        let waited =
            tokio::time::timeout(Duration::from_millis(10), cache.ensure_loaded("p1", "t")).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cache.state().await, LoadState::Ready);

        let status = cache.ensure_loaded("p1", "t").await.unwrap();
        assert!(matches!(status, CacheStatus::Ready(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_failing_fetch_returns_to_empty() {
        let source = Arc::new(MockSource {
            delay: Some(Duration::from_millis(200)),
            fail_with: Some(500),
            ..MockSource::new(demo_files())
        });
        let cache = ProjectDataCache::new(source.clone());

        let waited =
            tokio::time::timeout(Duration::from_millis(10), cache.ensure_loaded("p1", "t")).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cache.state().await, LoadState::Empty);

        // the next caller starts a fresh fetch instead of seeing InProgress
        let err = cache.ensure_loaded("p1", "t").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthFailed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
