use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    coordinator::DownloadCoordinator,
    error::{DownloadError, ErrorKind, Result},
    types::{DownloadRequest, DownloadResult},
};

/// Messages exchanged between the popup, background and page contexts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BridgeRequest {
    CheckToken,
    /// Reload the page so a fresh token is rendered; never answered
    RefreshToken,
    #[serde(rename_all = "camelCase")]
    DownloadProject {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default, alias = "idToken")]
        token: Option<String>,
    },
    GetAuthInfo,
}

impl BridgeRequest {
    pub fn action(&self) -> &'static str {
        match self {
            BridgeRequest::CheckToken => "checkToken",
            BridgeRequest::RefreshToken => "refreshToken",
            BridgeRequest::DownloadProject { .. } => "downloadProject",
            BridgeRequest::GetAuthInfo => "getAuthInfo",
        }
    }
}

/// Outcome of a `downloadProject` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    #[serde(flatten)]
    pub result: DownloadResult,
    /// The archive codec was missing; provision it and retry once
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_codec: bool,
}

impl DownloadResponse {
    fn from_result(result: Result<String>) -> Self {
        match result {
            Ok(_) => Self {
                result: DownloadResult::ok(),
                needs_codec: false,
            },
            Err(e) => Self::failure(&e),
        }
    }

    fn failure(error: &DownloadError) -> Self {
        Self {
            result: DownloadResult::failure(error),
            needs_codec: error.kind() == ErrorKind::CodecUnavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BridgeResponse {
    Token {
        token: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AuthInfo {
        id_token: Option<String>,
        project_id: Option<String>,
    },
    Download(DownloadResponse),
}

/// Page-side effects the bridge can ask for
pub trait PageHost: Send + Sync {
    fn reload(&self);
}

/// Request/response channel into another context
#[async_trait]
pub trait BridgeEndpoint: Send + Sync {
    /// Deliver a request; `Ok(None)` for fire-and-forget requests
    async fn send(&self, request: BridgeRequest) -> Result<Option<BridgeResponse>>;
}

/// Installs the archive codec in the page context
#[async_trait]
pub trait CodecProvisioner: Send + Sync {
    async fn provision(&self) -> Result<()>;
}

/// Answers bridge requests inside the page context
pub struct ContentBridge {
    coordinator: Arc<DownloadCoordinator>,
    host: Arc<dyn PageHost>,
}

impl ContentBridge {
    pub fn new(coordinator: Arc<DownloadCoordinator>, host: Arc<dyn PageHost>) -> Self {
        Self { coordinator, host }
    }

    pub async fn handle(&self, request: BridgeRequest) -> Option<BridgeResponse> {
        debug!("Content bridge received {}", request.action());

        match request {
            BridgeRequest::CheckToken => Some(BridgeResponse::Token {
                token: self.coordinator.locator().locate(),
            }),
            BridgeRequest::RefreshToken => {
                info!("Token refresh requested");
                self.coordinator.forget_token().await;
                self.host.reload();
                None
            }
            BridgeRequest::GetAuthInfo => {
                let locator = self.coordinator.locator();
                Some(BridgeResponse::AuthInfo {
                    id_token: locator.locate(),
                    project_id: locator.page().project_id(),
                })
            }
            BridgeRequest::DownloadProject { project_id, token } => {
                let mut download = DownloadRequest::whole_project();
                download.project_id = project_id;
                download.token = token;

                let result = self.coordinator.try_handle(&download).await;
                Some(BridgeResponse::Download(DownloadResponse::from_result(result)))
            }
        }
    }
}

#[async_trait]
impl BridgeEndpoint for ContentBridge {
    async fn send(&self, request: BridgeRequest) -> Result<Option<BridgeResponse>> {
        Ok(self.handle(request).await)
    }
}

/// Background-context relay for popup download requests
///
/// Forwards to the page and, when the page reports a missing codec,
/// provisions it and retries exactly once.
pub struct BackgroundRelay {
    page: Arc<dyn BridgeEndpoint>,
    provisioner: Arc<dyn CodecProvisioner>,
}

impl BackgroundRelay {
    pub fn new(page: Arc<dyn BridgeEndpoint>, provisioner: Arc<dyn CodecProvisioner>) -> Self {
        Self { page, provisioner }
    }

    pub async fn download_project(
        &self,
        project_id: Option<String>,
        token: Option<String>,
    ) -> DownloadResponse {
        match self.try_download_project(project_id, token).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Project download error: {}", e);
                DownloadResponse::failure(&e)
            }
        }
    }

    async fn try_download_project(
        &self,
        project_id: Option<String>,
        token: Option<String>,
    ) -> Result<DownloadResponse> {
        let project_id = project_id
            .filter(|id| !id.is_empty())
            .ok_or(DownloadError::NoProjectId)?;
        let token = token.filter(|t| !t.is_empty()).ok_or(DownloadError::NoToken)?;

        info!("Starting download for project: {}", project_id);
        let request = BridgeRequest::DownloadProject {
            project_id: Some(project_id),
            token: Some(token),
        };

        let response = self.forward(request.clone()).await?;
        if !response.needs_codec {
            return Ok(response);
        }

        info!("Archive codec missing in page, provisioning and retrying");
        self.provisioner.provision().await?;
        self.forward(request).await
    }

    async fn forward(&self, request: BridgeRequest) -> Result<DownloadResponse> {
        match self.page.send(request).await? {
            Some(BridgeResponse::Download(response)) => Ok(response),
            Some(_) => Err(DownloadError::Bridge {
                message: "unexpected response to downloadProject".to_string(),
            }),
            None => Err(DownloadError::Bridge {
                message: "no response to downloadProject".to_string(),
            }),
        }
    }
}
