use async_trait::async_trait;

use crate::{error::Result, types::SourceCodeResponse};

/// Remote source of a project's file listing
///
/// Implementors classify failures: 401/403 as `AuthFailed`, any other
/// non-2xx status as `Api`, transport exceptions as `Transport`.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Fetch the full file listing of a project
    async fn fetch_project(&self, project_id: &str, token: &str) -> Result<SourceCodeResponse>;

    /// Get a human-readable identifier for this source (for logging/debugging)
    fn identifier(&self) -> String;
}
