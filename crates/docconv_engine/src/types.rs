use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

/// What a single GET produced. Redirects are handed back unfollowed so the
/// caller can vet each hop before it is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    Page(FetchOutput),
    Redirect { location: String },
}

impl FetchResponse {
    pub fn into_page(self) -> Option<FetchOutput> {
        match self {
            FetchResponse::Page(output) => Some(output),
            FetchResponse::Redirect { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchFailure,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FetchFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::HttpStatus(code) => write!(f, "http status {code}"),
            FetchFailure::Timeout => write!(f, "timeout"),
            FetchFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FetchFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchFailure::Network => write!(f, "network error"),
        }
    }
}

/// Why a single URL failed. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// URL unparsable, unsupported scheme, or host unresolvable.
    Validation,
    /// Host resolves (at least partly) to non-public address space.
    SsrfBlocked,
    Fetch(FetchFailure),
    /// Body could not be decoded or rendered into any content.
    Parse,
    /// The selector matched nothing (or could not be parsed).
    SelectorMiss,
    Serialization,
    Write,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Validation => write!(f, "validation error"),
            FailureKind::SsrfBlocked => write!(f, "ssrf blocked"),
            FailureKind::Fetch(inner) => write!(f, "fetch error ({inner})"),
            FailureKind::Parse => write!(f, "parse error"),
            FailureKind::SelectorMiss => write!(f, "selector miss"),
            FailureKind::Serialization => write!(f, "serialization error"),
            FailureKind::Write => write!(f, "write error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PipelineError {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        Self::new(FailureKind::Fetch(err.kind), err.message)
    }
}

/// Errors that prevent a run from starting at all.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("job id cannot be empty for a job-based conversion")]
    EmptyJobId,
    #[error("job id {0:?} must be a single path component")]
    InvalidJobId(String),
    #[error("output directory must be specified for a directory-based conversion")]
    EmptyOutputDir,
    #[error("failed to create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: PersistError,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("conversion run ended without producing a summary")]
    SummaryLost,
}

/// Outcome of converting one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_success: bool,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl ConversionResult {
    pub(crate) fn success(url: impl Into<String>, file_name: String, content: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            file_name: Some(file_name),
            content: Some(content),
            error: None,
            is_success: true,
            failure: None,
        }
    }

    pub(crate) fn failure(url: impl Into<String>, err: PipelineError) -> Self {
        Self {
            url: url.into(),
            file_name: None,
            content: None,
            error: Some(err.message),
            is_success: false,
            failure: Some(err.kind),
        }
    }

    pub fn failure_kind(&self) -> Option<&FailureKind> {
        self.failure.as_ref()
    }
}

/// Aggregate outcome of one run, produced after every URL has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_urls: usize,
    pub successful: usize,
    pub failed: usize,
    pub failed_urls: Vec<String>,
    pub processing_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Summary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
