//! Medical questionnaire extraction from form fields and text blocks.

use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::Regex;
use serde_json::Value;

use super::json_path::{extract_path, value_text};
use super::sanitize::{clean_text, is_blank};
use super::ExtractionError;
use crate::models::{MedicalHistory, QuestionnairePatient, QuestionnaireRecord, NO_ALLERGIES, UNKNOWN};
use crate::pipeline::ocr::OcrResponse;

static HYPERTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhypertension\b").unwrap());

static DIABETES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bdiabet(?:es|ic)\b").unwrap());

static HEART_DISEASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bheart\s+disease\b").unwrap());

static ALLERGY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\ballerg(?:y|ies|ic)\b").unwrap());

static AFFIRMATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:yes|positive|confirmed)\b").unwrap());

static ALLERGY_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)allerg(?:y|ies)\s+to:?\s+([^.;\n]+)").unwrap());

static MEDICATION_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)medications?:?\s+([^.;\n]+)").unwrap());

/// Extract with today's date as the questionnaire-date default.
pub fn extract_questionnaire(response: &OcrResponse) -> QuestionnaireRecord {
    extract_questionnaire_on(response, Local::now().date_naive())
}

/// Never fails: errors are logged and yield the minimal fallback record.
pub fn extract_questionnaire_on(response: &OcrResponse, today: NaiveDate) -> QuestionnaireRecord {
    let today = today.format("%Y-%m-%d").to_string();
    match try_extract(response, &today) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(error = %e, "Questionnaire extraction failed, using fallback record");
            QuestionnaireRecord::fallback(today)
        }
    }
}

fn try_extract(response: &OcrResponse, today: &str) -> Result<QuestionnaireRecord, ExtractionError> {
    if !response.raw.is_object() {
        return Err(ExtractionError::InvalidResponse(
            "response is not a JSON object".into(),
        ));
    }
    let predictions = ["result.predictions", "predictions"]
        .iter()
        .find_map(|path| extract_path(&response.raw, path));
    if predictions.is_some_and(|p| !p.is_object()) {
        return Err(ExtractionError::InvalidResponse(
            "`predictions` is not a JSON object".into(),
        ));
    }

    let fields = predictions
        .and_then(|p| p.get("form_fields"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let markdown = response.markdown();
    let blocks = text_blocks(predictions, markdown);

    let patient = QuestionnairePatient {
        name: field_value(fields, "patient_name").unwrap_or_else(|| UNKNOWN.to_string()),
        date_of_birth: field_value(fields, "date_of_birth").unwrap_or_default(),
        employee_id: field_value(fields, "employee_id").unwrap_or_default(),
        gender: field_value(fields, "gender").unwrap_or_default(),
    };

    let mut allergies = listed_items(&blocks, &ALLERGY_LIST);
    if allergies.is_empty() {
        allergies.push(NO_ALLERGIES.to_string());
    }
    let medical_history = MedicalHistory {
        has_hypertension: has_condition(&blocks, &HYPERTENSION),
        has_diabetes: has_condition(&blocks, &DIABETES),
        has_heart_disease: has_condition(&blocks, &HEART_DISEASE),
        has_allergies: has_condition(&blocks, &ALLERGY),
        allergies,
        current_medications: listed_items(&blocks, &MEDICATION_LIST),
    };

    tracing::info!(
        form_fields = fields.len(),
        text_blocks = blocks.len(),
        medications = medical_history.current_medications.len(),
        "Questionnaire extracted"
    );

    Ok(QuestionnaireRecord {
        patient,
        medical_history,
        questionnaire_date: field_value(fields, "exam_date").unwrap_or_else(|| today.to_string()),
        raw_content: markdown.map(str::to_string),
    })
}

/// `text_blocks[].text`, or the markdown's non-blank lines when the
/// service returned no blocks.
fn text_blocks(predictions: Option<&Value>, markdown: Option<&str>) -> Vec<String> {
    let blocks: Vec<String> = predictions
        .and_then(|p| p.get("text_blocks"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|b| b.get("text").and_then(value_text))
                .map(|t| clean_text(&t))
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if !blocks.is_empty() {
        return blocks;
    }
    markdown
        .map(|md| {
            md.lines()
                .map(clean_text)
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `label` / `key` comparison ignoring case and separators, so
/// "Patient Name" matches `patient_name`.
fn field_key(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn field_value(fields: &[Value], name: &str) -> Option<String> {
    let wanted = field_key(name);
    fields
        .iter()
        .find(|f| {
            ["label", "key"].iter().any(|k| {
                f.get(*k)
                    .and_then(Value::as_str)
                    .is_some_and(|s| field_key(s).contains(&wanted))
            })
        })
        .and_then(|f| f.get("value"))
        .and_then(value_text)
        .map(|v| clean_text(&v))
        .filter(|v| !is_blank(v))
}

/// A block names the condition and affirms it.
fn has_condition(blocks: &[String], condition: &Regex) -> bool {
    blocks
        .iter()
        .any(|b| condition.is_match(b) && AFFIRMATIVE.is_match(b))
}

/// Comma-separated items following a list lead-in such as "allergy to".
fn listed_items(blocks: &[String], lead_in: &Regex) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| lead_in.captures(b).and_then(|c| c.get(1)))
        .flat_map(|m| m.as_str().split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty() && !is_blank(item))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn response() -> OcrResponse {
        OcrResponse::new(json!({
            "result": {
                "predictions": {
                    "form_fields": [
                        { "label": "Patient Name", "value": "Lerato Mokoena" },
                        { "key": "date_of_birth", "value": "1990-04-12" },
                        { "label": "Employee ID", "value": "EMP-77" },
                        { "key": "gender", "value": "Female" },
                        { "key": "exam_date", "value": "2026-02-01" }
                    ],
                    "text_blocks": [
                        { "text": "History of hypertension: Yes" },
                        { "text": "Diabetes: No" },
                        { "text": "Heart disease - confirmed by cardiologist" },
                        { "text": "Known allergy to penicillin, peanuts; reacts badly" },
                        { "text": "Current medications: Amlodipine 5mg, Aspirin" }
                    ]
                }
            }
        }))
    }

    #[test]
    fn extracts_patient_fields() {
        let record = extract_questionnaire_on(&response(), today());
        assert_eq!(record.patient.name, "Lerato Mokoena");
        assert_eq!(record.patient.date_of_birth, "1990-04-12");
        assert_eq!(record.patient.employee_id, "EMP-77");
        assert_eq!(record.patient.gender, "Female");
        assert_eq!(record.questionnaire_date, "2026-02-01");
    }

    #[test]
    fn conditions_need_affirmation() {
        let history = extract_questionnaire_on(&response(), today()).medical_history;
        assert!(history.has_hypertension);
        assert!(!history.has_diabetes);
        assert!(history.has_heart_disease);
        assert!(!history.has_allergies);
    }

    #[test]
    fn allergies_and_medications_are_split() {
        let history = extract_questionnaire_on(&response(), today()).medical_history;
        assert_eq!(history.allergies, vec!["penicillin", "peanuts"]);
        assert_eq!(history.current_medications, vec!["Amlodipine 5mg", "Aspirin"]);
    }

    #[test]
    fn markdown_lines_stand_in_for_blocks() {
        let response = OcrResponse::new(json!({
            "data": { "markdown": "Allergies: yes\nAllergies to: latex\nDiabetic: positive" }
        }));
        let record = extract_questionnaire_on(&response, today());
        assert_eq!(record.patient.name, "Unknown");
        assert_eq!(record.questionnaire_date, "2026-03-14");
        assert!(record.medical_history.has_allergies);
        assert!(record.medical_history.has_diabetes);
        assert_eq!(record.medical_history.allergies, vec!["latex"]);
        assert!(record.raw_content.is_some());
    }

    #[test]
    fn empty_response_defaults() {
        let record = extract_questionnaire_on(&OcrResponse::new(json!({})), today());
        assert_eq!(record.patient.name, "Unknown");
        assert_eq!(record.medical_history.allergies, vec![NO_ALLERGIES]);
        assert!(record.medical_history.current_medications.is_empty());
    }

    #[test]
    fn malformed_predictions_fall_back() {
        let response = OcrResponse::new(json!({ "predictions": "garbage" }));
        let record = extract_questionnaire_on(&response, today());
        assert_eq!(record, QuestionnaireRecord::fallback("2026-03-14".to_string()));
    }

    #[test]
    fn field_keys_ignore_separators() {
        assert_eq!(field_key("Patient Name"), "patient_name");
        assert_eq!(field_key("date-of-birth"), "date_of_birth");
    }
}
