//! Date completion for certificates: a certificate is valid for one
//! calendar year, so a missing examination or expiry date can be derived
//! from the other.

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::models::enums::FieldSource;
use crate::models::ExtractedCertificate;
use crate::pipeline::extraction::is_blank;

const VALIDITY: Months = Months::new(12);

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d %B %Y", "%d %b %Y"];

/// Which date was filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateCompletion {
    ExaminationFromExpiry,
    ExpiryFromExamination,
}

/// Parse the date formats seen on certificates. A trailing time part
/// (`2024-06-01T08:00:00Z`) is ignored.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let date_part = text.split(['T', ' ']).next().unwrap_or(text);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// One calendar year later. 29 February maps to 28 February.
pub fn one_year_after(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_add_months(VALIDITY)
}

/// One calendar year earlier. 29 February maps to 28 February.
pub fn one_year_before(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_months(VALIDITY)
}

/// Derive whichever of examination date and expiry date is missing.
/// An examination date that only holds the "today" default counts as
/// missing. Unparseable dates are left alone.
pub fn complete_dates(record: &mut ExtractedCertificate) -> Option<DateCompletion> {
    let exam_missing = record.examination.date.trim().is_empty()
        || record.source_of("examination.date") == FieldSource::Default;
    let expiry_missing = is_blank(&record.certification.valid_until);

    match (exam_missing, expiry_missing) {
        (true, false) => {
            let Some(exam) = parse_date(&record.certification.valid_until).and_then(one_year_before)
            else {
                tracing::debug!("Expiry date unparseable, examination date not derived");
                return None;
            };
            record.examination.date = format_date(exam);
            record.set_source("examination.date", FieldSource::Derived);
            Some(DateCompletion::ExaminationFromExpiry)
        }
        (false, true) => {
            let Some(expiry) = parse_date(&record.examination.date).and_then(one_year_after) else {
                tracing::debug!("Examination date unparseable, expiry date not derived");
                return None;
            };
            record.certification.valid_until = format_date(expiry);
            record.set_source("certification.valid_until", FieldSource::Derived);
            Some(DateCompletion::ExpiryFromExamination)
        }
        _ => None,
    }
}
