use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DownloadError, ErrorKind, Result};

/// Accepts payloads with or without `=` padding, like `atob`
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// One remote source file as listed by the project API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Slash-separated path, unique within a project
    #[serde(rename = "name")]
    pub path: String,
    /// UTF-8 text, or base64 when `binary` is set. `None` for directory placeholders
    #[serde(rename = "contents", default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "binary", default)]
    pub is_binary: bool,
}

impl FileRecord {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
            is_binary: false,
        }
    }

    pub fn binary(path: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(base64.into()),
            is_binary: true,
        }
    }

    pub fn placeholder(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
            is_binary: false,
        }
    }

    /// Whether this record can be emitted as a file on its own
    pub fn is_downloadable(&self) -> bool {
        self.content.is_some()
    }

    /// Decode the payload into raw bytes
    ///
    /// Returns `Ok(None)` for placeholders. Binary payloads are base64-decoded,
    /// ignoring embedded whitespace the way browsers' `atob` does.
    pub fn decode(&self) -> Result<Option<Bytes>> {
        let Some(content) = &self.content else {
            return Ok(None);
        };

        if !self.is_binary {
            return Ok(Some(Bytes::from(content.clone().into_bytes())));
        }

        let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let raw = LENIENT_BASE64.decode(compact.as_bytes()).map_err(|e| {
            DownloadError::malformed(format!("invalid base64 payload for {}: {}", self.path, e))
        })?;
        Ok(Some(Bytes::from(raw)))
    }

    /// Final path segment, used when emitting the record on its own
    pub fn file_name(&self) -> &str {
        match self.path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => "file",
        }
    }
}

/// Wire shape of `GET /projects/{id}/source-code`
#[derive(Debug, Clone, Deserialize)]
pub struct SourceCodeResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<FileRecord>>,
}

/// One immutable fetched copy of a project's file listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub project_id: String,
    pub project_name: String,
    pub files: Vec<FileRecord>,
}

impl ProjectSnapshot {
    /// Validate a fetch response and turn it into a snapshot
    ///
    /// An absent or empty `files` list is rejected. A missing name falls back
    /// to the project id.
    pub fn from_response(project_id: &str, response: SourceCodeResponse) -> Result<Self> {
        let files = match response.files {
            Some(files) if !files.is_empty() => files,
            _ => return Err(DownloadError::malformed("no files found in project data")),
        };

        let project_name = response
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| project_id.to_string());

        Ok(Self {
            project_id: project_id.to_string(),
            project_name,
            files,
        })
    }
}

/// What a download request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    SingleFile,
    Folder,
    WholeProject,
}

/// A user-triggered download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub kind: RequestKind,
    #[serde(default)]
    pub path: Option<String>,
    /// Overrides the project id taken from the page location
    #[serde(default)]
    pub project_id: Option<String>,
    /// Overrides the token located on the page
    #[serde(default)]
    pub token: Option<String>,
}

impl DownloadRequest {
    pub fn single_file(path: impl Into<String>) -> Self {
        Self::new(RequestKind::SingleFile, Some(path.into()))
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(RequestKind::Folder, Some(path.into()))
    }

    pub fn whole_project() -> Self {
        Self::new(RequestKind::WholeProject, None)
    }

    fn new(kind: RequestKind, path: Option<String>) -> Self {
        Self {
            kind,
            path,
            project_id: None,
            token: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Structured outcome of a download request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DownloadResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(error: &DownloadError) -> Self {
        Self {
            success: false,
            error_kind: Some(error.kind()),
            message: Some(error.to_string()),
        }
    }
}

/// Bytes handed to the host save action
#[derive(Debug, Clone)]
pub struct EmittedFile {
    pub file_name: String,
    pub content: Bytes,
    /// Whether the bytes are a compressed archive rather than a single file
    pub is_archive: bool,
}
