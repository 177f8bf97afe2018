use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Sex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Sex>,
    pub date_of_birth: Option<NaiveDate>,
    pub id_number: Option<String>,
    pub organization_id: Option<String>,
    pub client_organization_id: Option<String>,
    pub contact_info: Option<serde_json::Value>,
    /// Free-form history; `documents` lists the source document ids.
    pub medical_history: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a patient that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Sex>,
    pub date_of_birth: Option<NaiveDate>,
    pub id_number: Option<String>,
    pub organization_id: Option<String>,
    pub client_organization_id: Option<String>,
    pub medical_history: serde_json::Value,
}

/// Merge-update for an existing patient. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientUpdate {
    pub gender: Option<Sex>,
    pub date_of_birth: Option<NaiveDate>,
    pub id_number: Option<String>,
    pub client_organization_id: Option<String>,
    pub medical_history: Option<serde_json::Value>,
}
