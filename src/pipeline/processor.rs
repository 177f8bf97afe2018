//! Document Processing Orchestrator.
//!
//! Single entry point that drives one uploaded document through the
//! pipeline: OCR → extract → complete dates → normalize → sweep → persist
//! (with retry and read-back verification) → best-effort patient merge.
//!
//! Uses trait-based DI for the OCR collaborator and both stores so the
//! orchestrator remains fully testable with mock implementations.

use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ProcessorConfig;
use crate::db::{DatabaseError, DocumentStore, PatientStore};
use crate::models::enums::{DocumentKind, DocumentStatus};
use crate::models::{DocumentRecord, DocumentUpdate};
use crate::pipeline::extraction::{extract_questionnaire_on, CertificateExtractor};
use crate::pipeline::ocr::{OcrClient, OcrResponse, UploadedFile};
use crate::pipeline::patient::{
    identity_from_certificate, identity_from_questionnaire, merge_patient, PatientIdentity,
    PatientMerge,
};
use crate::pipeline::structuring::{complete_dates, merge_structured, sweep_empty_markers, DateCompletion};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during document processing.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Failed to persist document after {attempts} attempts: {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: DatabaseError,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("Could not serialize structured data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Summary of one processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub document_id: Uuid,
    pub document_type: DocumentKind,
    /// `processed` or `failed`.
    pub status: DocumentStatus,
    /// Message written to `processing_error` when the OCR call failed.
    pub error: Option<String>,
    pub date_completion: Option<DateCompletion>,
    /// Stored status confirmed by read-back.
    pub verified: bool,
    /// Populated only if the patient merge succeeded.
    pub patient: Option<PatientMerge>,
}

impl ProcessingOutcome {
    fn new(document: &DocumentRecord, status: DocumentStatus) -> Self {
        Self {
            document_id: document.id,
            document_type: document.document_type,
            status,
            error: None,
            date_completion: None,
            verified: false,
            patient: None,
        }
    }
}

/// Structured result of the extraction stage, ready to persist.
struct Structured {
    data: Value,
    identity: PatientIdentity,
    medical_history: Option<Value>,
    date_completion: Option<DateCompletion>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Orchestrates document processing: OCR → extract → structure → persist.
///
/// Pure pipeline logic with trait-based DI. Does NOT read uploads from
/// disk or talk to the caller; the caller passes the uploaded file and
/// observes the document row's status.
pub struct DocumentProcessor {
    ocr: Box<dyn OcrClient>,
    documents: Arc<dyn DocumentStore>,
    patients: Arc<dyn PatientStore>,
    extractor: CertificateExtractor,
    config: ProcessorConfig,
}

impl DocumentProcessor {
    pub fn new(
        ocr: Box<dyn OcrClient>,
        documents: Arc<dyn DocumentStore>,
        patients: Arc<dyn PatientStore>,
    ) -> Self {
        Self {
            ocr,
            documents,
            patients,
            extractor: CertificateExtractor::new(),
            config: ProcessorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_extractor(mut self, extractor: CertificateExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Process with today's local date as the extraction default.
    pub fn process(
        &self,
        document_id: &Uuid,
        file: &UploadedFile,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        self.process_on(document_id, file, Local::now().date_naive())
    }

    /// Full pipeline for one document.
    ///
    /// 1. Mark `processing`
    /// 2. Call OCR; a failure marks `failed` with the error message
    /// 3. Extract by document kind, complete dates, normalize, sweep
    /// 4. Persist `{structured_data, raw_response}` as `processed`, retrying
    /// 5. Verify the stored status, re-applying it if stale
    /// 6. Merge the patient record (best-effort)
    ///
    /// Any error after step 1 marks the document `failed` before it is
    /// returned, so a run never leaves the row in `processing`.
    pub fn process_on(
        &self,
        document_id: &Uuid,
        file: &UploadedFile,
        today: NaiveDate,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let document = self
            .documents
            .read(document_id)?
            .ok_or(ProcessingError::DocumentNotFound(*document_id))?;

        if !document.status.can_transition_to(DocumentStatus::Processing) {
            return Err(ProcessingError::InvalidTransition {
                from: document.status,
                to: DocumentStatus::Processing,
            });
        }

        self.persist(
            document_id,
            &DocumentUpdate {
                processing_error: Some(None),
                ..DocumentUpdate::status(DocumentStatus::Processing)
            },
        )?;
        tracing::info!(
            document_id = %document_id,
            document_type = document.document_type.as_str(),
            size = file.size(),
            "Processing: document started"
        );

        match self.run(&document, file, today) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(document_id = %document_id, error = %e, "Processing failed");
                if let Err(mark) = self.documents.update(document_id, &DocumentUpdate::failed(e.to_string())) {
                    tracing::error!(
                        document_id = %document_id,
                        error = %mark,
                        "Could not mark document failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Process on a worker thread. The caller observes progress through
    /// the document row; the handle yields the final outcome.
    pub fn spawn_processing(
        self: Arc<Self>,
        document_id: Uuid,
        file: UploadedFile,
    ) -> JoinHandle<Result<ProcessingOutcome, ProcessingError>> {
        std::thread::spawn(move || self.process(&document_id, &file))
    }

    fn run(
        &self,
        document: &DocumentRecord,
        file: &UploadedFile,
        today: NaiveDate,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        // Step 2: OCR
        let response = match self.ocr.analyze(file, document.document_type, Some(&document.id)) {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    document_id = %document.id,
                    class = e.class(),
                    "Processing: OCR call failed"
                );
                self.persist(&document.id, &DocumentUpdate::failed(message.clone()))?;
                let mut outcome = ProcessingOutcome::new(document, DocumentStatus::Failed);
                outcome.error = Some(message);
                return Ok(outcome);
            }
        };

        // Step 3: extract + structure
        let mut structured = self.structure(document.document_type, &response, today)?;
        let swept = sweep_empty_markers(&mut structured.data);
        tracing::info!(
            document_id = %document.id,
            swept,
            date_completion = ?structured.date_completion,
            "Processing: structuring complete"
        );

        // Step 4: persist
        let processed_at = Utc::now();
        self.persist(
            &document.id,
            &DocumentUpdate {
                status: Some(DocumentStatus::Processed),
                extracted_data: Some(json!({
                    "structured_data": structured.data,
                    "raw_response": response.raw,
                })),
                processed_at: Some(processed_at),
                processing_error: Some(None),
            },
        )?;

        // Step 5: verify
        let verified = self.verify_status(&document.id, DocumentStatus::Processed)?;

        // Step 6: patient merge, never fails the run
        let patient = match merge_patient(
            self.patients.as_ref(),
            document,
            &structured.identity,
            structured.medical_history.as_ref(),
            processed_at,
        ) {
            Ok(merge) => Some(merge),
            Err(e) => {
                tracing::warn!(
                    document_id = %document.id,
                    error = %e,
                    "Patient merge failed, continuing"
                );
                None
            }
        };

        tracing::info!(document_id = %document.id, verified, "Processing complete");

        let mut outcome = ProcessingOutcome::new(document, DocumentStatus::Processed);
        outcome.date_completion = structured.date_completion;
        outcome.verified = verified;
        outcome.patient = patient;
        Ok(outcome)
    }

    fn structure(
        &self,
        kind: DocumentKind,
        response: &OcrResponse,
        today: NaiveDate,
    ) -> Result<Structured, ProcessingError> {
        match kind {
            DocumentKind::CertificateOfFitness => {
                let mut record = self.extractor.extract(response, today);
                let date_completion = complete_dates(&mut record);
                Ok(Structured {
                    data: merge_structured(&record)?,
                    identity: identity_from_certificate(&record),
                    medical_history: None,
                    date_completion,
                })
            }
            DocumentKind::MedicalQuestionnaire => {
                let record = extract_questionnaire_on(response, today);
                Ok(Structured {
                    data: serde_json::to_value(&record)?,
                    identity: identity_from_questionnaire(&record),
                    medical_history: Some(serde_json::to_value(&record.medical_history)?),
                    date_completion: None,
                })
            }
        }
    }

    /// Write with a fixed delay between attempts.
    fn persist(&self, id: &Uuid, update: &DocumentUpdate) -> Result<(), ProcessingError> {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.documents.update(id, update) {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(document_id = %id, attempt, "Persisted after retry");
                    }
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        document_id = %id,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Document update failed, retrying"
                    );
                    std::thread::sleep(self.config.retry_delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ProcessingError::Persistence {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    /// Read back the stored status, re-applying `expected` when a stale
    /// value is seen. Returns whether the status was confirmed.
    fn verify_status(&self, id: &Uuid, expected: DocumentStatus) -> Result<bool, ProcessingError> {
        for round in 1..=self.config.verify_rounds {
            let stored = self
                .documents
                .read(id)?
                .ok_or(ProcessingError::DocumentNotFound(*id))?;
            if stored.status == expected {
                return Ok(true);
            }
            tracing::warn!(
                document_id = %id,
                round,
                stored = stored.status.as_str(),
                expected = expected.as_str(),
                "Stale status on read-back, re-applying"
            );
            self.persist(id, &DocumentUpdate::status(expected))?;
            std::thread::sleep(self.config.retry_delay);
        }
        tracing::warn!(document_id = %id, "Status not confirmed after verification rounds");
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::{NewPatient, PatientRecord, PatientUpdate};
    use crate::pipeline::ocr::{MockOcrClient, OcrError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::ops::Range;
    use std::time::Duration;

    const CERTIFICATE_MD: &str = "\
**Initials & Surname**: Thabo Nkosi
**ID No**: 8001015009087
**Company Name**: Deep Level Mining

| Pre-Employment | [x] |
|---|---|

<table>
<tr><td>Hearing</td><td>[x]</td><td>Normal</td></tr>
<tr><td>Drug Screen</td><td>[ ]</td><td>[ ]</td></tr>
</table>

**FIT**: [x]

Valid until: 2027-06-01";

    /// Document store that fails the updates whose zero-based index falls
    /// in `failing`.
    struct FlakyDocumentStore {
        inner: SqliteStore,
        failing: Range<usize>,
        writes: AtomicUsize,
    }

    impl FlakyDocumentStore {
        fn new(inner: SqliteStore, fail_writes: usize) -> Self {
            Self::failing(inner, 0..fail_writes)
        }

        fn failing(inner: SqliteStore, failing: Range<usize>) -> Self {
            Self {
                inner,
                failing,
                writes: AtomicUsize::new(0),
            }
        }
    }

    impl DocumentStore for FlakyDocumentStore {
        fn read(&self, id: &Uuid) -> Result<Option<DocumentRecord>, DatabaseError> {
            self.inner.read(id)
        }

        fn update(&self, id: &Uuid, update: &DocumentUpdate) -> Result<(), DatabaseError> {
            let count = self.writes.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&count) {
                return Err(DatabaseError::ConstraintViolation("simulated write failure".into()));
            }
            DocumentStore::update(&self.inner, id, update)
        }
    }

    /// Document store whose first `stale_reads` reads report `processing`.
    struct LaggingDocumentStore {
        inner: SqliteStore,
        stale_reads: usize,
        reads: AtomicUsize,
    }

    impl DocumentStore for LaggingDocumentStore {
        fn read(&self, id: &Uuid) -> Result<Option<DocumentRecord>, DatabaseError> {
            let count = self.reads.fetch_add(1, Ordering::SeqCst);
            let mut doc = self.inner.read(id)?;
            // the first read is the initial load
            if count > 0 && count <= self.stale_reads {
                if let Some(d) = doc.as_mut() {
                    d.status = DocumentStatus::Processing;
                }
            }
            Ok(doc)
        }

        fn update(&self, id: &Uuid, update: &DocumentUpdate) -> Result<(), DatabaseError> {
            DocumentStore::update(&self.inner, id, update)
        }
    }

    struct FailingPatientStore;

    impl PatientStore for FailingPatientStore {
        fn find(&self, _: &str, _: &str, _: Option<&str>) -> Result<Vec<PatientRecord>, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }

        fn insert(&self, _: &NewPatient) -> Result<PatientRecord, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }

        fn update(&self, _: &Uuid, _: &PatientUpdate) -> Result<(), DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
    }

    fn fast_config() -> ProcessorConfig {
        ProcessorConfig {
            retry_delay: Duration::ZERO,
            ..ProcessorConfig::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn upload() -> UploadedFile {
        UploadedFile::new("cert.pdf", b"%PDF-1.7".to_vec())
    }

    fn seeded_store(kind: DocumentKind) -> (Arc<SqliteStore>, DocumentRecord) {
        let store = SqliteStore::in_memory().unwrap();
        let doc = DocumentRecord::new("cert.pdf", kind).with_organization("org-1");
        store.insert_document(&doc).unwrap();
        (Arc::new(store), doc)
    }

    fn processor(ocr: MockOcrClient, store: Arc<SqliteStore>) -> DocumentProcessor {
        DocumentProcessor::new(Box::new(ocr), store.clone(), store).with_config(fast_config())
    }

    #[test]
    fn certificate_end_to_end() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = processor(MockOcrClient::with_markdown(CERTIFICATE_MD), store.clone());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert!(outcome.verified);
        assert!(matches!(outcome.patient, Some(PatientMerge::Inserted(_))));

        let stored = store.read(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Processed);
        assert!(stored.processed_at.is_some());
        assert!(stored.processing_error.is_none());

        let data = stored.extracted_data.unwrap();
        let s = &data["structured_data"];
        assert_eq!(s["patient"]["name"], "Thabo Nkosi");
        assert_eq!(s["patient_name"], "Thabo Nkosi");
        assert_eq!(s["examination"]["type"]["pre_employment"], true);
        assert_eq!(s["examination"]["test_results"]["hearing_done"], true);
        assert_eq!(s["examination"]["test_results"]["hearing_results"], "Normal");
        assert_eq!(s["examination"]["test_results"]["drug_screen_done"], false);
        assert_eq!(s["certification"]["fit"], true);
        assert_eq!(s["fitness_declaration"], "Fit");
        assert!(data["raw_response"]["data"]["markdown"].is_string());
        assert_eq!(s["raw_content"], CERTIFICATE_MD);

        let patients = store.find("Thabo", "Nkosi", Some("org-1")).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].date_of_birth, NaiveDate::from_ymd_opt(1980, 1, 1));
    }

    #[test]
    fn examination_date_derived_from_expiry() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = processor(MockOcrClient::with_markdown(CERTIFICATE_MD), store.clone());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        // markdown carries no examination date, so today's default is replaced
        assert_eq!(outcome.date_completion, Some(DateCompletion::ExaminationFromExpiry));
        let stored = store.read(&doc.id).unwrap().unwrap().extracted_data.unwrap();
        assert_eq!(stored["structured_data"]["examination"]["date"], "2026-06-01");
    }

    #[test]
    fn ocr_failure_marks_failed_with_message() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = processor(MockOcrClient::failing(OcrError::RateLimited), store.clone());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.status, DocumentStatus::Failed);
        let stored = store.read(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert_eq!(stored.processing_error, Some(OcrError::RateLimited.to_string()));
        assert!(stored.extracted_data.is_none());
        assert!(store.find("Unknown", "Patient", Some("org-1")).unwrap().is_empty());
    }

    #[test]
    fn empty_response_persists_fallback_record() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = processor(MockOcrClient::new(json!({})), store.clone());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);

        let data = store.read(&doc.id).unwrap().unwrap().extracted_data.unwrap();
        let s = &data["structured_data"];
        assert_eq!(s["patient"]["name"], "Unknown");
        assert_eq!(s["patient"]["national_id"], "Unknown");
        assert_eq!(s["examination"]["date"], "2026-03-14");
        assert_eq!(s["certification"]["valid_until"], "");
        assert_eq!(s["restrictions"]["heights"], false);
        assert_eq!(s["examination"]["test_results"]["x_ray_results"], "N/A");
    }

    #[test]
    fn persistence_retry_succeeds_on_third_attempt() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let inner = SqliteStore::in_memory().unwrap();
        inner.insert_document(&doc).unwrap();
        let flaky = Arc::new(FlakyDocumentStore::new(inner, 2));

        let p = DocumentProcessor::new(
            Box::new(MockOcrClient::with_markdown(CERTIFICATE_MD)),
            flaky.clone(),
            store,
        )
        .with_config(fast_config());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert_eq!(
            flaky.read(&doc.id).unwrap().unwrap().status,
            DocumentStatus::Processed
        );
    }

    #[test]
    fn processed_write_succeeds_on_third_attempt() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let inner = SqliteStore::in_memory().unwrap();
        inner.insert_document(&doc).unwrap();
        // write 1 marks processing, writes 2 and 3 are the first two
        // attempts at the processed result
        let flaky = Arc::new(FlakyDocumentStore::failing(inner, 1..3));

        let p = DocumentProcessor::new(
            Box::new(MockOcrClient::with_markdown(CERTIFICATE_MD)),
            flaky.clone(),
            store,
        )
        .with_config(fast_config());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert!(outcome.verified);
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 4);

        let stored = flaky.read(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Processed);
        let data = stored.extracted_data.unwrap();
        assert_eq!(data["structured_data"]["patient"]["name"], "Thabo Nkosi");
    }

    #[test]
    fn persistence_exhaustion_is_a_hard_failure() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let inner = SqliteStore::in_memory().unwrap();
        inner.insert_document(&doc).unwrap();
        let flaky = Arc::new(FlakyDocumentStore::new(inner, usize::MAX));

        let p = DocumentProcessor::new(
            Box::new(MockOcrClient::with_markdown(CERTIFICATE_MD)),
            flaky,
            store,
        )
        .with_config(fast_config());

        let err = p.process_on(&doc.id, &upload(), today()).unwrap_err();
        assert!(matches!(err, ProcessingError::Persistence { attempts: 3, .. }));
    }

    #[test]
    fn stale_read_back_is_reapplied() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let inner = SqliteStore::in_memory().unwrap();
        inner.insert_document(&doc).unwrap();
        let lagging = Arc::new(LaggingDocumentStore {
            inner,
            stale_reads: 2,
            reads: AtomicUsize::new(0),
        });

        let p = DocumentProcessor::new(
            Box::new(MockOcrClient::with_markdown(CERTIFICATE_MD)),
            lagging.clone(),
            store,
        )
        .with_config(fast_config());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert!(outcome.verified);
        assert_eq!(lagging.reads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn patient_merge_failure_does_not_fail_run() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = DocumentProcessor::new(
            Box::new(MockOcrClient::with_markdown(CERTIFICATE_MD)),
            store.clone(),
            Arc::new(FailingPatientStore),
        )
        .with_config(fast_config());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert!(outcome.patient.is_none());
        assert_eq!(store.read(&doc.id).unwrap().unwrap().status, DocumentStatus::Processed);
    }

    #[test]
    fn questionnaire_merges_medical_history() {
        let (store, doc) = seeded_store(DocumentKind::MedicalQuestionnaire);
        let ocr = MockOcrClient::new(json!({
            "result": { "predictions": {
                "form_fields": [{ "label": "Patient Name", "value": "Lerato Mokoena" }],
                "text_blocks": [{ "text": "Hypertension: yes" }]
            }}
        }));
        let p = processor(ocr, store.clone());

        let outcome = p.process_on(&doc.id, &upload(), today()).unwrap();
        assert_eq!(outcome.document_type, DocumentKind::MedicalQuestionnaire);

        let data = store.read(&doc.id).unwrap().unwrap().extracted_data.unwrap();
        assert_eq!(data["structured_data"]["medical_history"]["has_hypertension"], true);

        let patients = store.find("Lerato", "Mokoena", Some("org-1")).unwrap();
        assert_eq!(patients[0].medical_history["has_hypertension"], true);
    }

    #[test]
    fn reprocessing_overwrites_extraction() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        processor(MockOcrClient::new(json!({})), store.clone())
            .process_on(&doc.id, &upload(), today())
            .unwrap();
        processor(MockOcrClient::with_markdown(CERTIFICATE_MD), store.clone())
            .process_on(&doc.id, &upload(), today())
            .unwrap();

        let data = store.read(&doc.id).unwrap().unwrap().extracted_data.unwrap();
        assert_eq!(data["structured_data"]["patient"]["name"], "Thabo Nkosi");
    }

    #[test]
    fn document_in_flight_is_rejected() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        DocumentStore::update(store.as_ref(), &doc.id, &DocumentUpdate::status(DocumentStatus::Processing))
            .unwrap();
        let ocr = MockOcrClient::with_markdown(CERTIFICATE_MD);
        let p = processor(ocr, store);

        let err = p.process_on(&doc.id, &upload(), today()).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InvalidTransition {
                from: DocumentStatus::Processing,
                to: DocumentStatus::Processing
            }
        ));
    }

    #[test]
    fn missing_document_is_reported() {
        let (store, _) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = processor(MockOcrClient::new(json!({})), store);
        let id = Uuid::new_v4();
        let err = p.process_on(&id, &upload(), today()).unwrap_err();
        assert!(matches!(err, ProcessingError::DocumentNotFound(missing) if missing == id));
    }

    #[test]
    fn spawned_processing_completes() {
        let (store, doc) = seeded_store(DocumentKind::CertificateOfFitness);
        let p = Arc::new(processor(MockOcrClient::with_markdown(CERTIFICATE_MD), store.clone()));

        let outcome = p.spawn_processing(doc.id, upload()).join().unwrap().unwrap();
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert_eq!(store.read(&doc.id).unwrap().unwrap().status, DocumentStatus::Processed);
    }
}
