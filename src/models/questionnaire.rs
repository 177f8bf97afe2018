use serde::Serialize;

use super::certificate::UNKNOWN;

/// Placeholder when the questionnaire lists no allergies.
pub const NO_ALLERGIES: &str = "None specified";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestionnairePatient {
    pub name: String,
    pub date_of_birth: String,
    pub employee_id: String,
    pub gender: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedicalHistory {
    pub has_hypertension: bool,
    pub has_diabetes: bool,
    pub has_heart_disease: bool,
    pub has_allergies: bool,
    pub allergies: Vec<String>,
    pub current_medications: Vec<String>,
}

/// Structured record for a medical questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionnaireRecord {
    pub patient: QuestionnairePatient,
    pub medical_history: MedicalHistory,
    pub questionnaire_date: String,
    pub raw_content: Option<String>,
}

impl QuestionnaireRecord {
    pub fn fallback(questionnaire_date: String) -> Self {
        Self {
            patient: QuestionnairePatient {
                name: UNKNOWN.to_string(),
                ..QuestionnairePatient::default()
            },
            medical_history: MedicalHistory {
                allergies: vec![NO_ALLERGIES.to_string()],
                ..MedicalHistory::default()
            },
            questionnaire_date,
            raw_content: None,
        }
    }
}
