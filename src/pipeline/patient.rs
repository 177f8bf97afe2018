//! Patient identity derivation and merge.
//!
//! Identity comes from the extracted record: the full name is split into
//! first/last, and the national ID fills in a missing birth date or sex.
//! A failed checksum still contributes its decoded fields, since a single
//! misread check digit leaves the date and sex digits intact. An existing patient matching (first, last, organization)
//! is merge-updated, otherwise a new one is inserted. Either way the
//! source document is appended to `medical_history.documents`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::db::{DatabaseError, PatientStore};
use crate::models::enums::{DocumentKind, Sex};
use crate::models::{
    DocumentRecord, ExtractedCertificate, NewPatient, PatientUpdate, QuestionnaireRecord, UNKNOWN,
};
use crate::pipeline::extraction::is_blank;
use crate::pipeline::id_number::decode_national_id;
use crate::pipeline::structuring::parse_date;

pub const DEFAULT_FIRST_NAME: &str = "Unknown";
pub const DEFAULT_LAST_NAME: &str = "Patient";

/// Identity fields drawn from one processed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientIdentity {
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Sex>,
    pub date_of_birth: Option<NaiveDate>,
    pub id_number: Option<String>,
}

/// What the merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "patient_id", rename_all = "snake_case")]
pub enum PatientMerge {
    Inserted(Uuid),
    Updated(Uuid),
}

impl PatientMerge {
    pub fn patient_id(&self) -> Uuid {
        match self {
            PatientMerge::Inserted(id) | PatientMerge::Updated(id) => *id,
        }
    }
}

/// First token is the first name, the remainder the last name.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut tokens = full_name.split_whitespace();
    let first = tokens
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FIRST_NAME.to_string());
    let rest = tokens.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() {
        DEFAULT_LAST_NAME.to_string()
    } else {
        rest
    };
    (first, last)
}

fn identity(name: &str, sex: &str, date_of_birth: &str, national_id: &str) -> PatientIdentity {
    let (first_name, last_name) = split_name(name);
    let mut gender = Sex::from_text(sex);
    let mut dob = if is_blank(date_of_birth) {
        None
    } else {
        parse_date(date_of_birth)
    };

    let id_number = Some(national_id.trim())
        .filter(|id| !is_blank(id) && *id != UNKNOWN)
        .map(str::to_string);
    if let Some(id) = &id_number {
        let decoded = decode_national_id(id);
        if !decoded.is_valid && (decoded.birthdate.is_some() || decoded.sex.is_some()) {
            tracing::debug!("National ID fails checksum, using decoded fields");
        }
        dob = dob.or(decoded.birthdate);
        gender = gender.or(decoded.sex);
    }

    PatientIdentity {
        first_name,
        last_name,
        gender,
        date_of_birth: dob,
        id_number,
    }
}

pub fn identity_from_certificate(record: &ExtractedCertificate) -> PatientIdentity {
    let p = &record.patient;
    identity(&p.name, &p.sex, &p.date_of_birth, &p.national_id)
}

pub fn identity_from_questionnaire(record: &QuestionnaireRecord) -> PatientIdentity {
    let p = &record.patient;
    identity(&p.name, &p.gender, &p.date_of_birth, "")
}

/// Find-or-create the patient for `document` and record the document in
/// their history. `history` is merged into the stored `medical_history`
/// at top level when given.
pub fn merge_patient(
    store: &dyn PatientStore,
    document: &DocumentRecord,
    identity: &PatientIdentity,
    history: Option<&Value>,
    processed_at: DateTime<Utc>,
) -> Result<PatientMerge, DatabaseError> {
    let entry = document_entry(&document.id, document.document_type, processed_at);
    let existing = store.find(
        &identity.first_name,
        &identity.last_name,
        document.organization_id.as_deref(),
    )?;

    if let Some(patient) = existing.into_iter().next() {
        let mut merged = as_object(&patient.medical_history);
        if let Some(Value::Object(fields)) = history {
            merged.extend(fields.clone());
        }
        append_document(&mut merged, entry);

        store.update(
            &patient.id,
            &PatientUpdate {
                gender: identity.gender,
                date_of_birth: identity.date_of_birth,
                id_number: identity.id_number.clone(),
                client_organization_id: document.client_organization_id.clone(),
                medical_history: Some(Value::Object(merged)),
            },
        )?;
        tracing::info!(
            document_id = %document.id,
            patient_id = %patient.id,
            "Patient record updated"
        );
        return Ok(PatientMerge::Updated(patient.id));
    }

    let mut medical_history = history.map(as_object).unwrap_or_default();
    append_document(&mut medical_history, entry);
    let inserted = store.insert(&NewPatient {
        first_name: identity.first_name.clone(),
        last_name: identity.last_name.clone(),
        gender: identity.gender,
        date_of_birth: identity.date_of_birth,
        id_number: identity.id_number.clone(),
        organization_id: document.organization_id.clone(),
        client_organization_id: document.client_organization_id.clone(),
        medical_history: Value::Object(medical_history),
    })?;
    tracing::info!(
        document_id = %document.id,
        patient_id = %inserted.id,
        "Patient record created"
    );
    Ok(PatientMerge::Inserted(inserted.id))
}

fn document_entry(id: &Uuid, kind: DocumentKind, processed_at: DateTime<Utc>) -> Value {
    json!({
        "document_id": id.to_string(),
        "document_type": kind.as_str(),
        "processed_at": processed_at.to_rfc3339(),
    })
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

fn append_document(history: &mut Map<String, Value>, entry: Value) {
    match history.get_mut("documents") {
        Some(Value::Array(docs)) => docs.push(entry),
        _ => {
            history.insert("documents".into(), Value::Array(vec![entry]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    fn certificate(name: &str, id: &str) -> ExtractedCertificate {
        let mut r = ExtractedCertificate::empty(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        r.patient.name = name.into();
        r.patient.national_id = id.into();
        r
    }

    fn document() -> DocumentRecord {
        DocumentRecord::new("cert.pdf", DocumentKind::CertificateOfFitness).with_organization("org-1")
    }

    #[test]
    fn name_split_rules() {
        let split = |s: &str| {
            let (first, last) = split_name(s);
            format!("{first}|{last}")
        };
        assert_eq!(split("Thabo Johannes Nkosi"), "Thabo|Johannes Nkosi");
        assert_eq!(split("Cher"), "Cher|Patient");
        assert_eq!(split("   "), "Unknown|Patient");
    }

    #[test]
    fn valid_id_fills_missing_dob_and_sex() {
        let id = identity_from_certificate(&certificate("Thabo Nkosi", "8001015009087"));
        assert_eq!(id.date_of_birth, NaiveDate::from_ymd_opt(1980, 1, 1));
        assert_eq!(id.gender, Some(Sex::Male));
        assert_eq!(id.id_number.as_deref(), Some("8001015009087"));
    }

    #[test]
    fn extracted_values_win_over_decoded() {
        let mut r = certificate("Thabo Nkosi", "8001015009087");
        r.patient.date_of_birth = "1981-02-03".into();
        r.patient.sex = "Female".into();
        let id = identity_from_certificate(&r);
        assert_eq!(id.date_of_birth, NaiveDate::from_ymd_opt(1981, 2, 3));
        assert_eq!(id.gender, Some(Sex::Female));
    }

    #[test]
    fn checksum_failure_still_fills_dob_and_sex() {
        let id = identity_from_certificate(&certificate("Thabo Nkosi", "8001015009088"));
        assert_eq!(id.date_of_birth, NaiveDate::from_ymd_opt(1980, 1, 1));
        assert_eq!(id.gender, Some(Sex::Male));
        assert_eq!(id.id_number.as_deref(), Some("8001015009088"));
    }

    #[test]
    fn short_id_fills_nothing() {
        let id = identity_from_certificate(&certificate("Thabo Nkosi", "800101500908"));
        assert_eq!(id.date_of_birth, None);
        assert_eq!(id.gender, None);
    }

    #[test]
    fn unknown_placeholder_is_not_an_id() {
        let id = identity_from_certificate(&certificate("Unknown", "Unknown"));
        assert_eq!(id.first_name, "Unknown");
        assert_eq!(id.last_name, "Patient");
        assert_eq!(id.id_number, None);
    }

    #[test]
    fn inserts_then_updates_same_patient() {
        let store = SqliteStore::in_memory().unwrap();
        let identity = identity_from_certificate(&certificate("Thabo Nkosi", "8001015009087"));

        let first_doc = document();
        let first = merge_patient(&store, &first_doc, &identity, None, Utc::now()).unwrap();
        assert!(matches!(first, PatientMerge::Inserted(_)));

        let second_doc = document();
        let second = merge_patient(&store, &second_doc, &identity, None, Utc::now()).unwrap();
        assert_eq!(second, PatientMerge::Updated(first.patient_id()));

        let found = store.find("Thabo", "Nkosi", Some("org-1")).unwrap();
        assert_eq!(found.len(), 1);
        let docs = found[0].medical_history["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["document_id"], second_doc.id.to_string());
        assert_eq!(docs[0]["document_type"], "certificate-of-fitness");
        assert_eq!(found[0].gender, Some(Sex::Male));
    }

    #[test]
    fn organization_scopes_the_match() {
        let store = SqliteStore::in_memory().unwrap();
        let identity = identity_from_certificate(&certificate("Thabo Nkosi", ""));
        merge_patient(&store, &document(), &identity, None, Utc::now()).unwrap();

        let other_org = DocumentRecord::new("cert.pdf", DocumentKind::CertificateOfFitness)
            .with_organization("org-2");
        let outcome = merge_patient(&store, &other_org, &identity, None, Utc::now()).unwrap();
        assert!(matches!(outcome, PatientMerge::Inserted(_)));
    }

    #[test]
    fn questionnaire_history_is_merged() {
        let store = SqliteStore::in_memory().unwrap();
        let mut record = QuestionnaireRecord::fallback("2026-03-14".into());
        record.patient.name = "Lerato Mokoena".into();
        record.patient.gender = "F".into();
        record.medical_history.has_diabetes = true;
        let identity = identity_from_questionnaire(&record);
        assert_eq!(identity.gender, Some(Sex::Female));

        let doc = DocumentRecord::new("q.pdf", DocumentKind::MedicalQuestionnaire);
        let history = serde_json::to_value(&record.medical_history).unwrap();
        merge_patient(&store, &doc, &identity, Some(&history), Utc::now()).unwrap();

        let found = store.find("Lerato", "Mokoena", None).unwrap();
        assert_eq!(found[0].medical_history["has_diabetes"], true);
        assert_eq!(found[0].medical_history["allergies"][0], "None specified");
        assert_eq!(found[0].medical_history["documents"][0]["document_type"], "medical-questionnaire");
    }
}
