use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use uuid::Uuid;

use super::{classify_status, OcrClient, OcrError, OcrResponse, UploadedFile};
use crate::config::OcrConfig;
use crate::models::enums::DocumentKind;

/// Which endpoint a document is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Document-analysis API, authenticated with the API key.
    Direct,
    /// Self-hosted processing service for large documents.
    Delegated,
}

/// HTTP client for the Landing AI document-analysis API and the optional
/// delegated processing service.
pub struct LandingAiClient {
    config: OcrConfig,
    direct: Client,
    delegated: Client,
}

impl LandingAiClient {
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let direct = build_client(config.direct_timeout)?;
        let delegated = build_client(config.delegated_timeout)?;
        Ok(Self {
            config,
            direct,
            delegated,
        })
    }

    /// Client configured from the process environment.
    pub fn from_env() -> Result<Self, OcrError> {
        Self::new(OcrConfig::from_env())
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Large PDFs go to the delegated service when one is configured;
    /// `force_delegated` sends everything there.
    pub fn route(&self, file: &UploadedFile) -> Result<Route, OcrError> {
        if self.config.force_delegated {
            return match self.config.delegated_url {
                Some(_) => Ok(Route::Delegated),
                None => Err(OcrError::Config(
                    "delegated processing is forced but SDK_MICROSERVICE_URL is not set".into(),
                )),
            };
        }
        let oversized = file.is_pdf() && file.size() > self.config.delegate_threshold_bytes;
        if oversized && self.config.delegated_url.is_some() {
            Ok(Route::Delegated)
        } else {
            Ok(Route::Direct)
        }
    }

    fn analyze_direct(&self, file: &UploadedFile) -> Result<OcrResponse, OcrError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| OcrError::Config("LANDING_AI_API_KEY is not set".into()))?;

        let field = if file.is_pdf() { "pdf" } else { "image" };
        let form = Form::new().part(field, file_part(file)?);

        tracing::info!(
            route = "direct",
            field,
            size = file.size(),
            "Sending document for analysis"
        );

        let response = self
            .direct
            .post(&self.config.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {api_key}"))
            .multipart(form)
            .send()
            .map_err(|e| map_send_error(e, self.config.direct_timeout))?;

        read_response(response)
    }

    fn analyze_delegated(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
        document_id: Option<&Uuid>,
    ) -> Result<OcrResponse, OcrError> {
        let base = self
            .config
            .delegated_url
            .as_deref()
            .ok_or_else(|| OcrError::Config("SDK_MICROSERVICE_URL is not set".into()))?;
        let url = format!("{}/process-document", base.trim_end_matches('/'));

        let mut form = Form::new()
            .part("file", file_part(file)?)
            .text("document_type", kind.as_str().to_string());
        if let Some(id) = document_id {
            form = form.text("document_id", id.to_string());
        }

        tracing::info!(
            route = "delegated",
            size = file.size(),
            "Sending document to delegated processing service"
        );

        let response = self
            .delegated
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| map_send_error(e, self.config.delegated_timeout))?;

        read_response(response)
    }
}

impl OcrClient for LandingAiClient {
    fn analyze(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
        document_id: Option<&Uuid>,
    ) -> Result<OcrResponse, OcrError> {
        let started = std::time::Instant::now();
        let result = match self.route(file)? {
            Route::Direct => self.analyze_direct(file),
            Route::Delegated => self.analyze_delegated(file, kind, document_id),
        };
        match &result {
            Ok(_) => tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Document analysis completed"
            ),
            Err(e) => tracing::warn!(
                class = e.class(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Document analysis failed"
            ),
        }
        result
    }
}

fn build_client(timeout: Duration) -> Result<Client, OcrError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OcrError::Config(format!("failed to create HTTP client: {e}")))
}

fn file_part(file: &UploadedFile) -> Result<Part, OcrError> {
    Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|e| OcrError::Config(format!("invalid content type: {e}")))
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> OcrError {
    if e.is_timeout() {
        OcrError::Timeout {
            secs: timeout.as_secs(),
        }
    } else if e.is_connect() {
        OcrError::Network(format!("connection failed: {e}"))
    } else {
        OcrError::Network(e.to_string())
    }
}

fn read_response(response: Response) -> Result<OcrResponse, OcrError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        tracing::warn!(
            status = status.as_u16(),
            body_len = body.len(),
            "Document analysis returned an error status"
        );
        return Err(classify_status(status.as_u16(), body));
    }

    let raw: Value = response
        .json()
        .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;
    if !raw.is_object() {
        return Err(OcrError::MalformedResponse(
            "expected a JSON object".into(),
        ));
    }
    Ok(OcrResponse::new(raw))
}
