//! Client seam for the third-party document-analysis service.
//!
//! The service returns a JSON object with an optional `result` field map
//! and an optional `data.markdown` rendering of the whole document. Both
//! the direct API and the delegated large-document service share that
//! shape.

pub mod landing;

pub use landing::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::enums::DocumentKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    #[error("Request timeout: processing took longer than {secs}s. Try a smaller file or try again later.")]
    Timeout { secs: u64 },

    #[error("Document analysis rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("File is too large for processing. Maximum file size is 10MB.")]
    PayloadTooLarge,

    #[error("Document analysis error: Invalid request - {0}")]
    InvalidRequest(String),

    #[error("Authentication failed with the document analysis API. Please check your API key.")]
    AuthFailed,

    #[error("Document analysis server error (status {status}). Please try again later.")]
    Server { status: u16 },

    #[error("Document analysis error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Network error: unable to reach the document analysis service ({0})")]
    Network(String),

    #[error("Malformed document analysis response: {0}")]
    MalformedResponse(String),

    #[error("Document analysis is not configured: {0}")]
    Config(String),
}

impl OcrError {
    /// Stable short tag for the failure class.
    pub fn class(&self) -> &'static str {
        match self {
            OcrError::Timeout { .. } => "timeout",
            OcrError::RateLimited => "rate_limited",
            OcrError::PayloadTooLarge => "payload_too_large",
            OcrError::InvalidRequest(_) => "invalid_request",
            OcrError::AuthFailed => "auth_failed",
            OcrError::Server { .. } => "server_error",
            OcrError::Http { .. } => "http_error",
            OcrError::Network(_) => "network",
            OcrError::MalformedResponse(_) => "malformed_response",
            OcrError::Config(_) => "config",
        }
    }
}

/// Map a non-2xx status to the error taxonomy.
pub fn classify_status(status: u16, body: String) -> OcrError {
    match status {
        429 => OcrError::RateLimited,
        413 => OcrError::PayloadTooLarge,
        400 => OcrError::InvalidRequest(body),
        401 | 403 => OcrError::AuthFailed,
        s if s >= 500 => OcrError::Server { status: s },
        s => OcrError::Http { status: s, body },
    }
}

/// Raw service response.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResponse {
    pub raw: Value,
}

impl OcrResponse {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The fielded `result` map, when the service produced one.
    pub fn result(&self) -> Option<&Value> {
        self.raw.get("result").filter(|v| !v.is_null())
    }

    /// Full-document markdown, when present and non-blank.
    pub fn markdown(&self) -> Option<&str> {
        self.raw
            .get("data")
            .and_then(|d| d.get("markdown"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
    }
}

/// An uploaded document as handed to the processor.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Content type is guessed from the file extension.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.contains("pdf")
    }
}

/// A document-analysis backend (remote API, delegated service or mock).
pub trait OcrClient: Send + Sync {
    fn analyze(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
        document_id: Option<&Uuid>,
    ) -> Result<OcrResponse, OcrError>;
}

/// Mock client for testing: returns a configured outcome and counts calls.
pub struct MockOcrClient {
    outcome: Result<OcrResponse, OcrError>,
    calls: AtomicUsize,
}

impl MockOcrClient {
    pub fn new(raw: Value) -> Self {
        Self {
            outcome: Ok(OcrResponse::new(raw)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Response carrying only a markdown rendering.
    pub fn with_markdown(markdown: &str) -> Self {
        Self::new(serde_json::json!({ "data": { "markdown": markdown } }))
    }

    pub fn failing(error: OcrError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrClient for MockOcrClient {
    fn analyze(
        &self,
        _file: &UploadedFile,
        _kind: DocumentKind,
        _document_id: Option<&Uuid>,
    ) -> Result<OcrResponse, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
