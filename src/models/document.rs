use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DocumentKind, DocumentStatus};

/// One uploaded document and the result of processing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub file_name: String,
    pub document_type: DocumentKind,
    pub status: DocumentStatus,
    pub organization_id: Option<String>,
    pub client_organization_id: Option<String>,
    /// `{structured_data, raw_response}` once processed.
    pub extracted_data: Option<serde_json::Value>,
    pub processing_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Fresh `pending` record for an upload.
    pub fn new(file_name: impl Into<String>, document_type: DocumentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            document_type,
            status: DocumentStatus::Pending,
            organization_id: None,
            client_organization_id: None,
            extracted_data: None,
            processing_error: None,
            processed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

/// Partial update. `None` leaves a column untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub status: Option<DocumentStatus>,
    pub extracted_data: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_error: Option<Option<String>>,
}

impl DocumentUpdate {
    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(DocumentStatus::Failed),
            processing_error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.extracted_data.is_none()
            && self.processed_at.is_none()
            && self.processing_error.is_none()
    }
}
