use std::collections::BTreeMap;

use serde::Serialize;

/// Flat view of a certificate for consumers that predate the nested shape.
/// Always derived from an [`super::ExtractedCertificate`], never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedCertificate {
    pub patient_name: String,
    pub id_number: String,
    pub company_name: String,
    pub occupation: String,
    pub date_of_birth: String,
    pub sex: String,
    pub examination_date: String,
    pub expiry_date: String,
    pub physician: String,
    pub examination_type: String,
    pub fit_for_duty: bool,
    pub fitness_declaration: String,
    pub restrictions_list: Vec<String>,
    pub follow_up_actions: String,
    pub review_date: String,
    pub comments: String,
    pub medical_tests: BTreeMap<String, NormalizedTest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedTest {
    pub name: String,
    pub done: bool,
    pub result: String,
}
