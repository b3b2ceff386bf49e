use async_trait::async_trait;
use log::{error, info};
use reqwest::{Client, StatusCode};

use crate::{
    config::DownloaderConfig,
    error::{DownloadError, Result},
    source::ProjectSource,
    types::SourceCodeResponse,
};

/// Project API backed source
///
/// Issues `GET {base}/projects/{id}/source-code` with a bearer token and a
/// cookie store for session credentials.
#[derive(Clone)]
pub struct RemoteSource {
    client: Client,
    base_url: String,
}

impl RemoteSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_user_agent(base_url, concat!("project-downloader/", env!("CARGO_PKG_VERSION")))
    }

    pub fn with_user_agent(base_url: impl Into<String>, user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self::with_user_agent(config.api_base_url.clone(), &config.user_agent)
    }

    fn source_code_url(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{}/source-code",
            self.base_url.trim_end_matches('/'),
            project_id
        )
    }

    fn is_auth_error(status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
    }
}

#[async_trait]
impl ProjectSource for RemoteSource {
    async fn fetch_project(&self, project_id: &str, token: &str) -> Result<SourceCodeResponse> {
        let url = self.source_code_url(project_id);
        info!("Fetching project data for {}", project_id);

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                let data = serde_json::from_slice::<SourceCodeResponse>(&body).map_err(|e| {
                    DownloadError::malformed(format!("unexpected response shape: {}", e))
                })?;
                info!("Source code data fetched successfully");
                Ok(data)
            }
            status if Self::is_auth_error(status) => {
                error!("Authentication error ({})", status.as_u16());
                Err(DownloadError::AuthFailed {
                    status: status.as_u16(),
                })
            }
            status => {
                error!("HTTP error {}", status.as_u16());
                Err(DownloadError::Api {
                    status: status.as_u16(),
                })
            }
        }
    }

    fn identifier(&self) -> String {
        format!("remote://{}", self.base_url)
    }
}
