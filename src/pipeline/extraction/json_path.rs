//! Tolerant lookups over the OCR service's structured `result` JSON.
//!
//! Field names vary between document templates, so every target field
//! lists candidate paths in [`FIELD_MAPPINGS`]; the first candidate with
//! a non-blank value wins.

use serde_json::Value;

use super::sanitize::{clean_text, is_blank};

/// Fields read from the structured JSON tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateField {
    Name,
    DateOfBirth,
    NationalId,
    Company,
    Occupation,
    Sex,
    ExaminationDate,
    Physician,
    ValidUntil,
    FitnessStatus,
    ExaminationType,
    FollowUp,
    ReviewDate,
    Comments,
}

pub struct FieldMapping {
    pub field: CertificateField,
    /// Dotted path of the populated field in the extracted record.
    pub target: &'static str,
    pub candidates: &'static [&'static str],
}

pub const FIELD_MAPPINGS: &[FieldMapping] = &[
    FieldMapping {
        field: CertificateField::Name,
        target: "patient.name",
        candidates: &["patient.name", "employee.name"],
    },
    FieldMapping {
        field: CertificateField::DateOfBirth,
        target: "patient.date_of_birth",
        candidates: &["patient.date_of_birth", "patient.dob"],
    },
    FieldMapping {
        field: CertificateField::NationalId,
        target: "patient.national_id",
        candidates: &["patient.id", "patient.id_number", "employee.id"],
    },
    FieldMapping {
        field: CertificateField::Company,
        target: "patient.company",
        candidates: &["company", "employer", "patient.company"],
    },
    FieldMapping {
        field: CertificateField::Occupation,
        target: "patient.occupation",
        candidates: &["patient.occupation", "patient.job_title", "occupation", "job_title"],
    },
    FieldMapping {
        field: CertificateField::Sex,
        target: "patient.sex",
        candidates: &["patient.gender", "patient.sex"],
    },
    FieldMapping {
        field: CertificateField::ExaminationDate,
        target: "examination.date",
        candidates: &["examination.date", "date", "date_of_examination"],
    },
    FieldMapping {
        field: CertificateField::Physician,
        target: "examination.physician",
        candidates: &["examination.physician", "physician"],
    },
    FieldMapping {
        field: CertificateField::ValidUntil,
        target: "certification.valid_until",
        candidates: &["examination.next_date", "valid_until", "expiry_date"],
    },
    FieldMapping {
        field: CertificateField::FitnessStatus,
        target: "certification.fitness",
        candidates: &["examination.fitness_status", "fitness_status"],
    },
    FieldMapping {
        field: CertificateField::ExaminationType,
        target: "examination.type",
        candidates: &["examination.type", "examination_type"],
    },
    FieldMapping {
        field: CertificateField::FollowUp,
        target: "certification.follow_up",
        candidates: &["certification.follow_up", "follow_up"],
    },
    FieldMapping {
        field: CertificateField::ReviewDate,
        target: "certification.review_date",
        candidates: &["certification.review_date", "review_date"],
    },
    FieldMapping {
        field: CertificateField::Comments,
        target: "certification.comments",
        candidates: &["certification.comments", "comments"],
    },
];

/// Walk a dotted path. Numeric segments index into arrays.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Scalar leaves as text; objects, arrays and null have none.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First candidate path holding a non-blank value, normalized.
pub fn first_text(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|path| extract_path(value, path))
        .filter_map(value_text)
        .map(|raw| clean_text(&raw))
        .find(|text| !is_blank(text))
}

pub fn mapping(field: CertificateField) -> &'static FieldMapping {
    FIELD_MAPPINGS
        .iter()
        .find(|m| m.field == field)
        .unwrap_or(&FIELD_MAPPINGS[0])
}

/// Resolve one field through its candidate paths.
pub fn resolve(value: &Value, field: CertificateField) -> Option<String> {
    first_text(value, mapping(field).candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_nested_objects_and_arrays() {
        let v = json!({"patient": {"name": "Jane"}, "tests": [{"name": "Hearing"}]});
        assert_eq!(extract_path(&v, "patient.name"), Some(&json!("Jane")));
        assert_eq!(extract_path(&v, "tests.0.name"), Some(&json!("Hearing")));
        assert!(extract_path(&v, "patient.age").is_none());
        assert!(extract_path(&v, "patient.name.first").is_none());
        assert!(extract_path(&json!(null), "a").is_none());
    }

    #[test]
    fn first_non_blank_candidate_wins() {
        let v = json!({"patient": {"name": "  "}, "employee": {"name": "Sipho Dlamini"}});
        assert_eq!(resolve(&v, CertificateField::Name).as_deref(), Some("Sipho Dlamini"));
    }

    #[test]
    fn blank_sentinels_are_skipped() {
        let v = json!({"company": "N/A", "employer": "Acme Mining"});
        assert_eq!(resolve(&v, CertificateField::Company).as_deref(), Some("Acme Mining"));
    }

    #[test]
    fn values_are_normalized() {
        let v = json!({"patient": {"id": "8001015009087 <!-- text, from page 0 (l=0.1,t=0.2,r=0.3,b=0.4), with ID ab-12 -->"}});
        assert_eq!(resolve(&v, CertificateField::NationalId).as_deref(), Some("8001015009087"));
    }

    #[test]
    fn numbers_are_text() {
        let v = json!({"patient": {"id_number": 8001015009087u64}});
        assert_eq!(resolve(&v, CertificateField::NationalId).as_deref(), Some("8001015009087"));
    }

    #[test]
    fn every_field_has_a_mapping() {
        use CertificateField::*;
        for field in [
            Name, DateOfBirth, NationalId, Company, Occupation, Sex, ExaminationDate, Physician,
            ValidUntil, FitnessStatus, ExaminationType, FollowUp, ReviewDate, Comments,
        ] {
            assert_eq!(mapping(field).field, field);
            assert!(!mapping(field).candidates.is_empty());
        }
    }
}
