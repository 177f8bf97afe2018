//! Flat re-projection of an extracted certificate for legacy consumers.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::models::{
    Certification, ExaminationType, ExtractedCertificate, FitnessOutcome, NormalizedCertificate,
    NormalizedTest, UNKNOWN,
};

/// Label of the first set fitness flag in priority order, else "Unknown".
pub fn fitness_declaration(certification: &Certification) -> String {
    FitnessOutcome::PRIORITY
        .iter()
        .find(|o| certification.flag(**o))
        .map_or(UNKNOWN, |o| o.label())
        .to_string()
}

/// Any of the fit outcomes.
pub fn fit_for_duty(certification: &Certification) -> bool {
    certification.fit || certification.fit_with_restrictions || certification.fit_with_condition
}

/// "Pre-Employment", "Periodical", "Exit", comma-joined when several are set.
pub fn examination_type_label(exam_type: &ExaminationType) -> String {
    [
        (exam_type.pre_employment, "Pre-Employment"),
        (exam_type.periodical, "Periodical"),
        (exam_type.exit, "Exit"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, label)| *label)
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn normalize_certificate(record: &ExtractedCertificate) -> NormalizedCertificate {
    let medical_tests: BTreeMap<String, NormalizedTest> = record
        .examination
        .test_results
        .iter()
        .map(|(test, result)| {
            (
                test.key().to_string(),
                NormalizedTest {
                    name: test.label().to_string(),
                    done: result.done,
                    result: result.result.clone(),
                },
            )
        })
        .collect();

    let certification = &record.certification;
    NormalizedCertificate {
        patient_name: record.patient.name.clone(),
        id_number: record.patient.national_id.clone(),
        company_name: record.patient.company.clone(),
        occupation: record.patient.occupation.clone(),
        date_of_birth: record.patient.date_of_birth.clone(),
        sex: record.patient.sex.clone(),
        examination_date: record.examination.date.clone(),
        expiry_date: certification.valid_until.clone(),
        physician: record.examination.physician.clone(),
        examination_type: examination_type_label(&record.examination.exam_type),
        fit_for_duty: fit_for_duty(certification),
        fitness_declaration: fitness_declaration(certification),
        restrictions_list: record
            .restrictions
            .active()
            .iter()
            .map(|r| r.label().to_string())
            .collect(),
        follow_up_actions: certification.follow_up.clone(),
        review_date: certification.review_date.clone(),
        comments: certification.comments.clone(),
        medical_tests,
    }
}

/// The nested record with the flat fields added at top level.
pub fn merge_structured(record: &ExtractedCertificate) -> Result<Value, serde_json::Error> {
    let mut merged = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Value::Object(flat) = serde_json::to_value(normalize_certificate(record))? {
        merged.extend(flat);
    }
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicalTest, Restriction, TestResult};
    use chrono::NaiveDate;

    fn record() -> ExtractedCertificate {
        let mut r = ExtractedCertificate::empty(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        r.patient.name = "J. Smith".into();
        r.patient.national_id = "8001015009087".into();
        r.certification.valid_until = "2027-03-14".into();
        r
    }

    #[test]
    fn declaration_follows_priority() {
        let mut c = Certification::default();
        assert_eq!(fitness_declaration(&c), "Unknown");
        c.unfit = true;
        assert_eq!(fitness_declaration(&c), "Unfit");
        c.fit_with_condition = true;
        assert_eq!(fitness_declaration(&c), "Fit with Condition");
        c.fit = true;
        assert_eq!(fitness_declaration(&c), "Fit");
    }

    #[test]
    fn fit_for_duty_covers_fit_outcomes() {
        let mut c = Certification::default();
        assert!(!fit_for_duty(&c));
        c.temporarily_unfit = true;
        assert!(!fit_for_duty(&c));
        c.fit_with_restrictions = true;
        assert!(fit_for_duty(&c));
    }

    #[test]
    fn aliases_copy_fields() {
        let mut r = record();
        r.examination.exam_type.periodical = true;
        r.restrictions.set(Restriction::Spectacles, true);
        r.examination.test_results.set(
            MedicalTest::Hearing,
            TestResult { done: true, result: "Normal".into() },
        );

        let n = normalize_certificate(&r);
        assert_eq!(n.patient_name, "J. Smith");
        assert_eq!(n.id_number, "8001015009087");
        assert_eq!(n.expiry_date, "2027-03-14");
        assert_eq!(n.examination_date, "2026-03-14");
        assert_eq!(n.examination_type, "Periodical");
        assert_eq!(n.restrictions_list, vec!["Wear Spectacles"]);
        assert_eq!(n.medical_tests.len(), 9);
        let hearing = &n.medical_tests["hearing"];
        assert_eq!(hearing.name, "Hearing");
        assert!(hearing.done);
        assert_eq!(hearing.result, "Normal");
    }

    #[test]
    fn exam_type_label_joins_flags() {
        let t = ExaminationType { pre_employment: true, periodical: false, exit: true };
        assert_eq!(examination_type_label(&t), "Pre-Employment, Exit");
        assert_eq!(examination_type_label(&ExaminationType::default()), "");
    }

    #[test]
    fn merged_value_has_nested_and_flat_fields() {
        let merged = merge_structured(&record()).unwrap();
        assert_eq!(merged["patient"]["name"], "J. Smith");
        assert_eq!(merged["patient_name"], "J. Smith");
        assert_eq!(merged["fitness_declaration"], "Unknown");
        assert_eq!(merged["fit_for_duty"], false);
        assert_eq!(merged["examination"]["test_results"]["bloods_results"], "N/A");
        assert_eq!(merged["medical_tests"]["x_ray"]["name"], "X-Ray");
    }

    #[test]
    fn normalization_is_deterministic() {
        let r = record();
        assert_eq!(normalize_certificate(&r), normalize_certificate(&r));
    }
}
