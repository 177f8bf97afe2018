//! Store seams used by the document processor.
//!
//! Two traits define the boundaries:
//! - DocumentStore: read and partially update a document row
//! - PatientStore: find, insert and merge-update patient identities
//!
//! [`SqliteStore`] implements both over a single connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use uuid::Uuid;

use super::repository;
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::{DocumentRecord, DocumentUpdate, NewPatient, PatientRecord, PatientUpdate};

pub trait DocumentStore: Send + Sync {
    fn read(&self, id: &Uuid) -> Result<Option<DocumentRecord>, DatabaseError>;

    fn update(&self, id: &Uuid, update: &DocumentUpdate) -> Result<(), DatabaseError>;
}

pub trait PatientStore: Send + Sync {
    fn find(
        &self,
        first_name: &str,
        last_name: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<PatientRecord>, DatabaseError>;

    fn insert(&self, patient: &NewPatient) -> Result<PatientRecord, DatabaseError>;

    fn update(&self, id: &Uuid, update: &PatientUpdate) -> Result<(), DatabaseError>;
}

/// SQLite-backed implementation of both stores.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    pub fn insert_document(&self, doc: &DocumentRecord) -> Result<(), DatabaseError> {
        repository::insert_document(&*self.lock()?, doc)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl DocumentStore for SqliteStore {
    fn read(&self, id: &Uuid) -> Result<Option<DocumentRecord>, DatabaseError> {
        repository::get_document(&*self.lock()?, id)
    }

    fn update(&self, id: &Uuid, update: &DocumentUpdate) -> Result<(), DatabaseError> {
        repository::update_document_fields(&*self.lock()?, id, update)
    }
}

impl PatientStore for SqliteStore {
    fn find(
        &self,
        first_name: &str,
        last_name: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<PatientRecord>, DatabaseError> {
        repository::find_patients(&*self.lock()?, first_name, last_name, organization_id)
    }

    fn insert(&self, patient: &NewPatient) -> Result<PatientRecord, DatabaseError> {
        repository::insert_patient(&*self.lock()?, patient)
    }

    fn update(&self, id: &Uuid, update: &PatientUpdate) -> Result<(), DatabaseError> {
        repository::update_patient(&*self.lock()?, id, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{DocumentKind, DocumentStatus};

    #[test]
    fn document_store_reads_back_updates() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = DocumentRecord::new("cert.pdf", DocumentKind::CertificateOfFitness);
        store.insert_document(&doc).unwrap();

        DocumentStore::update(&store, &doc.id, &DocumentUpdate::status(DocumentStatus::Processing))
            .unwrap();
        let loaded = store.read(&doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Processing);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medcert.db");
        let doc = DocumentRecord::new("cert.pdf", DocumentKind::CertificateOfFitness);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_document(&doc).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.read(&doc.id).unwrap().is_some());
    }

    #[test]
    fn patient_store_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let inserted = store
            .insert(&NewPatient {
                first_name: "Sipho".into(),
                last_name: "Dlamini".into(),
                gender: None,
                date_of_birth: None,
                id_number: None,
                organization_id: Some("org".into()),
                client_organization_id: None,
                medical_history: serde_json::json!({}),
            })
            .unwrap();
        let found = store.find("Sipho", "Dlamini", Some("org")).unwrap();
        assert_eq!(found[0].id, inserted.id);
    }
}
