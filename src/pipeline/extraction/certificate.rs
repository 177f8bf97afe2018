//! Certificate-of-fitness extraction.
//!
//! Two passes over one OCR response. The JSON pass fills fields from the
//! service's `result` map through the declarative [`FIELD_MAPPINGS`]. The
//! markdown pass re-reads the rendered document with labeled-value
//! regexes and the selection detector; whatever it finds replaces the
//! JSON value. Every populated field records its [`FieldSource`].

use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::Regex;
use serde_json::Value;

use super::checkbox::{classify_mark, crossed_out_word, phrase_source, CrossedOut, LabelPattern, SelectionDetector};
use super::json_path::{first_text, mapping, CertificateField, FIELD_MAPPINGS};
use super::sanitize::{clean_text, is_blank};
use super::table::{self, TableRow};
use super::ExtractionError;
use crate::models::enums::{FieldSource, Sex};
use crate::models::{
    ExaminationType, ExtractedCertificate, FitnessOutcome, MedicalTest, Restriction, Restrictions,
    TestResult, TestResults, NOT_AVAILABLE,
};
use crate::pipeline::ocr::OcrResponse;

/// Labels searched in the markdown for each field, in order.
const MARKDOWN_LABELS: &[(CertificateField, &[&str])] = &[
    (
        CertificateField::Name,
        &["Initials & Surname", "Name & Surname", "Employee Name", "Full Name"],
    ),
    (CertificateField::DateOfBirth, &["Date of Birth", "DOB"]),
    (CertificateField::NationalId, &["ID No", "ID Number", "Identity Number"]),
    (CertificateField::Company, &["Company Name", "Employer"]),
    (CertificateField::Occupation, &["Job Title", "Occupation"]),
    (CertificateField::Sex, &["Gender", "Sex"]),
    (CertificateField::ExaminationDate, &["Date of Examination", "Examination Date"]),
    (CertificateField::Physician, &["Examining Physician", "Physician"]),
    (CertificateField::ValidUntil, &["Expiry Date", "Valid Until"]),
    (CertificateField::ReviewDate, &["Review Date"]),
];

const PRE_EMPLOYMENT_LABELS: &[&str] = &["Pre-Employment"];
const PERIODICAL_LABELS: &[&str] = &["Periodical"];
const EXIT_LABELS: &[&str] = &["Exit"];

static FOLLOW_UP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)referred\s+or\s+follow[-\s]*up\s+actions[ \t:*]*(.*?)(?:\n[ \t]*\n|review\s+date|<|$)")
        .unwrap()
});

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bcomments[ \t:*]*(.*?)(?:\n[ \t]*\n|<|$)").unwrap());

/// Extracts [`ExtractedCertificate`] records with a configurable detector.
pub struct CertificateExtractor {
    detector: SelectionDetector,
}

impl Default for CertificateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateExtractor {
    pub fn new() -> Self {
        Self::with_detector(SelectionDetector::new())
    }

    pub fn with_detector(detector: SelectionDetector) -> Self {
        Self { detector }
    }

    /// Never fails: an extraction error is logged and replaced by the
    /// minimal fallback record.
    pub fn extract(&self, response: &OcrResponse, today: NaiveDate) -> ExtractedCertificate {
        match self.try_extract(response, today) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "Certificate extraction failed, using fallback record");
                ExtractedCertificate::fallback(today)
            }
        }
    }

    fn try_extract(
        &self,
        response: &OcrResponse,
        today: NaiveDate,
    ) -> Result<ExtractedCertificate, ExtractionError> {
        if !response.raw.is_object() {
            return Err(ExtractionError::InvalidResponse(
                "response is not a JSON object".into(),
            ));
        }
        let result = response.result();
        if result.is_some_and(|r| !r.is_object()) {
            return Err(ExtractionError::InvalidResponse(
                "`result` is not a JSON object".into(),
            ));
        }
        let markdown = response.markdown();

        if result.is_none() && markdown.is_none() {
            tracing::warn!("OCR response carries neither fields nor markdown");
            return Ok(ExtractedCertificate::fallback(today));
        }

        let mut record = ExtractedCertificate::empty(today);
        if let Some(result) = result {
            apply_json(&mut record, result);
        }
        if let Some(markdown) = markdown {
            self.apply_markdown(&mut record, markdown)?;
            record.raw_content = Some(markdown.to_string());
        }

        tracing::info!(
            tests_done = record.examination.test_results.done_count(),
            restrictions = record.restrictions.active().len(),
            fitness_flagged = record.certification.any_flag(),
            markdown_len = markdown.map_or(0, str::len),
            "Certificate extracted"
        );
        Ok(record)
    }

    fn apply_markdown(
        &self,
        record: &mut ExtractedCertificate,
        markdown: &str,
    ) -> Result<(), ExtractionError> {
        let html = table::html_rows(markdown);
        let pipes = table::pipe_rows(markdown);

        for (field, labels) in MARKDOWN_LABELS {
            for label in labels.iter() {
                let Some(text) = labeled_value(markdown, &html, &pipes, label)? else {
                    continue;
                };
                if assign(record, *field, text) {
                    record.set_source(mapping(*field).target, FieldSource::Markdown);
                    break;
                }
            }
        }

        let exam_type = ExaminationType {
            pre_employment: self.any_selected(markdown, PRE_EMPLOYMENT_LABELS),
            periodical: self.any_selected(markdown, PERIODICAL_LABELS),
            exit: self.any_selected(markdown, EXIT_LABELS),
        };
        if exam_type.any() {
            record.examination.exam_type = exam_type;
            record.set_source("examination.type", FieldSource::Markdown);
        }

        record.examination.test_results = self.test_results(markdown, &html, &pipes)?;
        record.set_source("examination.test_results", FieldSource::Markdown);

        self.apply_fitness(record, markdown);

        if let Some(text) = multiline_value(&FOLLOW_UP, markdown)
            .or(labeled_value(markdown, &html, &pipes, "Referred or follow up actions")?)
        {
            record.certification.follow_up = text;
            record.set_source("certification.follow_up", FieldSource::Markdown);
        }
        if let Some(text) = multiline_value(&COMMENTS, markdown)
            .or(labeled_value(markdown, &html, &pipes, "Comments")?)
        {
            record.certification.comments = text;
            record.set_source("certification.comments", FieldSource::Markdown);
        }

        record.restrictions = self.restrictions(restrictions_section(markdown));
        record.set_source("restrictions", FieldSource::Markdown);
        Ok(())
    }

    fn any_selected(&self, text: &str, labels: &[&str]) -> bool {
        labels.iter().any(|l| self.detector.is_selected(text, l))
    }

    fn apply_fitness(&self, record: &mut ExtractedCertificate, markdown: &str) {
        let mut found = false;
        let mut flags = [false; 5];
        for (slot, outcome) in flags.iter_mut().zip(FitnessOutcome::PRIORITY) {
            *slot = self.any_selected(markdown, outcome.search_labels());
            found |= *slot;
        }
        if found {
            for (value, outcome) in flags.into_iter().zip(FitnessOutcome::PRIORITY) {
                record.certification.set_flag(outcome, value);
            }
            record.set_source("certification.fitness", FieldSource::Markdown);
        }

        let struck = crossed_out_word(markdown);
        match struck {
            Some(CrossedOut::Fit | CrossedOut::Unnamed) => {
                record.certification.fit = false;
                record.certification.unfit = true;
            }
            Some(CrossedOut::Unfit) => {
                record.certification.unfit = false;
                record.certification.fit = true;
            }
            None => return,
        }
        tracing::debug!(?struck, "Fitness word struck out");
        record.set_source("certification.fitness", FieldSource::Markdown);
    }

    fn test_results(
        &self,
        markdown: &str,
        html: &[TableRow],
        pipes: &[TableRow],
    ) -> Result<TestResults, ExtractionError> {
        let mut results = TestResults::default();
        for test in MedicalTest::ALL {
            let Some(pattern) = LabelPattern::new(test.label()) else {
                continue;
            };
            let found = row_test(html, &pattern)
                .or_else(|| row_test(pipes, &pattern))
                .map_or_else(|| list_test(markdown, test.label()), |hit| Ok(Some(hit)))?;

            let (done, result) = match found {
                Some(hit) => hit,
                None => {
                    let done = self.detector.decide(markdown, &pattern).unwrap_or(false);
                    let result = if done {
                        trailing_value(markdown, test.label())?
                    } else {
                        String::new()
                    };
                    (done, result)
                }
            };
            results.set(test, finish_test(done, &result));
        }
        Ok(results)
    }

    fn restrictions(&self, section: &str) -> Restrictions {
        let mut restrictions = Restrictions::default();
        for restriction in Restriction::ALL {
            restrictions.set(
                restriction,
                self.any_selected(section, restriction.search_labels()),
            );
        }
        restrictions
    }
}

/// Extract with the default detector.
pub fn extract_certificate(response: &OcrResponse) -> ExtractedCertificate {
    extract_certificate_on(response, Local::now().date_naive())
}

/// Extract with an explicit "today" for the missing-date default.
pub fn extract_certificate_on(response: &OcrResponse, today: NaiveDate) -> ExtractedCertificate {
    CertificateExtractor::new().extract(response, today)
}

// ---------------------------------------------------------------------------
// JSON pass
// ---------------------------------------------------------------------------

fn apply_json(record: &mut ExtractedCertificate, result: &Value) {
    for field_mapping in FIELD_MAPPINGS {
        let Some(text) = first_text(result, field_mapping.candidates) else {
            continue;
        };
        if assign(record, field_mapping.field, text) {
            record.set_source(field_mapping.target, FieldSource::Json);
        }
    }
}

/// Store one normalized value. `false` when the text carries no usable
/// value for the field (an unrecognised fitness status, say).
fn assign(record: &mut ExtractedCertificate, field: CertificateField, text: String) -> bool {
    match field {
        CertificateField::Name => record.patient.name = text,
        CertificateField::DateOfBirth => record.patient.date_of_birth = text,
        CertificateField::NationalId => record.patient.national_id = text,
        CertificateField::Company => record.patient.company = text,
        CertificateField::Occupation => record.patient.occupation = text,
        CertificateField::Sex => {
            record.patient.sex = Sex::from_text(&text).map_or(text, |s| s.as_str().to_string())
        }
        CertificateField::ExaminationDate => record.examination.date = text,
        CertificateField::Physician => record.examination.physician = text,
        CertificateField::ValidUntil => record.certification.valid_until = text,
        CertificateField::FitnessStatus => match FitnessOutcome::from_text(&text) {
            Some(outcome) => record.certification.set_flag(outcome, true),
            None => return false,
        },
        CertificateField::ExaminationType => {
            let exam_type = ExaminationType::from_text(&text);
            if !exam_type.any() {
                return false;
            }
            record.examination.exam_type = exam_type;
        }
        CertificateField::FollowUp => record.certification.follow_up = text,
        CertificateField::ReviewDate => record.certification.review_date = text,
        CertificateField::Comments => record.certification.comments = text,
    }
    true
}

// ---------------------------------------------------------------------------
// Labeled values
// ---------------------------------------------------------------------------

/// Normalize a captured value; `None` when nothing useful remains.
fn tidy(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    let trimmed = cleaned.trim_matches(|c: char| c == '*' || c.is_whitespace());
    (!is_blank(trimmed)).then(|| trimmed.to_string())
}

/// Value printed after `label`: `**Label**: value`, `Label: value`, or the
/// table cell following a `Label` cell.
fn labeled_value(
    markdown: &str,
    html: &[TableRow],
    pipes: &[TableRow],
    label: &str,
) -> Result<Option<String>, ExtractionError> {
    let Some(phrase) = phrase_source(label) else {
        return Ok(None);
    };

    let bold = Regex::new(&format!(
        r"(?im)\*\*[ \t]*{phrase}[ \t]*[:.]?[ \t]*\*\*[ \t]*:?[ \t]*(.*?)[ \t]*(?:\*\*|<!--|$)"
    ))?;
    let plain = Regex::new(&format!(
        r"(?im)(?:^|[^\w*]){phrase}[ \t]*[:.\-]{{1,2}}[ \t]*(?:\*\*)?[ \t]*(.*?)[ \t]*(?:\*\*|<!--|<|\||$)"
    ))?;

    for pattern in [&bold, &plain] {
        let found = pattern
            .captures_iter(markdown)
            .filter_map(|c| c.get(1))
            .find_map(|m| tidy(m.as_str()));
        if found.is_some() {
            return Ok(found);
        }
    }

    let label_cell = Regex::new(&format!(r"(?i)^[ \t*]*{phrase}[ \t*]*[:.]?[ \t*]*$"))?;
    Ok(html
        .iter()
        .chain(pipes)
        .find_map(|row| cell_after_label(row, &label_cell)))
}

fn cell_after_label(row: &TableRow, label_cell: &Regex) -> Option<String> {
    let i = row.cells.iter().position(|c| label_cell.is_match(c))?;
    row.cells.get(i + 1).and_then(|c| tidy(c))
}

fn multiline_value(pattern: &Regex, markdown: &str) -> Option<String> {
    pattern
        .captures_iter(markdown)
        .filter_map(|c| c.get(1))
        .find_map(|m| tidy(m.as_str()))
}

// ---------------------------------------------------------------------------
// Medical tests
// ---------------------------------------------------------------------------

/// `(done, result text)` from a table row holding the test label and a
/// mark cell on either side of it.
fn row_test(rows: &[TableRow], pattern: &LabelPattern) -> Option<(bool, String)> {
    for row in rows {
        for (i, cell) in row.cells.iter().enumerate() {
            if !pattern.in_cell(cell) {
                continue;
            }
            let after = row
                .cells
                .get(i + 1)
                .and_then(|c| classify_mark(c))
                .map(|done| (done, i + 1));
            let before = i
                .checked_sub(1)
                .and_then(|j| classify_mark(&row.cells[j]).map(|done| (done, j)));
            let Some((done, mark_at)) = after.or(before) else {
                continue;
            };
            let result = row
                .cells
                .get(mark_at.max(i) + 1)
                .cloned()
                .unwrap_or_default();
            return Some((done, result));
        }
    }
    None
}

/// List items: `- **Bloods**: [x] Normal`, `Hearing: [ ]`, `- [x] Hearing: Normal`.
fn list_test(markdown: &str, label: &str) -> Result<Option<(bool, String)>, ExtractionError> {
    let Some(phrase) = phrase_source(label) else {
        return Ok(None);
    };
    let mark_after = Regex::new(&format!(
        r"(?im)^[ \t]*(?:[-*+][ \t]+)?(?:\*\*)?[ \t]*{phrase}s?\b[ \t]*(?:\*\*)?[ \t]*:?[ \t]*(?:\*\*)?[ \t]*\[([^\[\]\n]{{0,3}})\][ \t]*:?[ \t]*(.*)$"
    ))?;
    let mark_before = Regex::new(&format!(
        r"(?im)^[ \t]*(?:[-*+][ \t]+)?\[([^\[\]\n]{{0,3}})\][ \t]*(?:\*\*)?{phrase}s?\b(?:\*\*)?[ \t]*[:\-]?[ \t]*(.*)$"
    ))?;

    for pattern in [&mark_after, &mark_before] {
        if let Some(caps) = pattern.captures(markdown) {
            let done = caps.get(1).is_some_and(|m| !m.as_str().trim().is_empty());
            let result = caps.get(2).map_or("", |m| m.as_str()).to_string();
            return Ok(Some((done, result)));
        }
    }
    Ok(None)
}

/// Text after `Label:` on the label's line, for tests found only by the
/// looser keyword or glyph matchers.
fn trailing_value(markdown: &str, label: &str) -> Result<String, ExtractionError> {
    let Some(phrase) = phrase_source(label) else {
        return Ok(String::new());
    };
    let pattern = Regex::new(&format!(
        r"(?im){phrase}s?\b[ \t]*(?:\*\*)?[ \t]*:[ \t]*(?:\*\*)?[ \t]*([^\n,|<\[]*)"
    ))?;
    Ok(pattern
        .captures(markdown)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

/// Result text only counts for a test that was done.
fn finish_test(done: bool, raw: &str) -> TestResult {
    let result = if done { tidy(raw) } else { None };
    TestResult {
        done,
        result: result.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Restrictions
// ---------------------------------------------------------------------------

/// From the restrictions heading to the next markdown heading, or the whole
/// document when there is no such heading.
fn restrictions_section(markdown: &str) -> &str {
    let mut offset = 0;
    let mut start = None;
    for line in markdown.split_inclusive('\n') {
        match start {
            None if is_restrictions_heading(line) => start = Some(offset),
            Some(s) if line.trim_start().starts_with('#') => return &markdown[s..offset],
            _ => {}
        }
        offset += line.len();
    }
    start.map_or(markdown, |s| &markdown[s..])
}

fn is_restrictions_heading(line: &str) -> bool {
    let text = line
        .trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim();
    text.to_lowercase().starts_with("restriction") && text.split_whitespace().count() <= 3
}
