use std::str::FromStr;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::{parse_json, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{DocumentKind, DocumentStatus};
use crate::models::{DocumentRecord, DocumentUpdate};

const DOCUMENT_COLUMNS: &str = "id, file_name, document_type, status, organization_id,
     client_organization_id, extracted_data, processing_error, processed_at, created_at";

pub fn insert_document(conn: &Connection, doc: &DocumentRecord) -> Result<(), DatabaseError> {
    let extracted = doc
        .extracted_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO documents (id, file_name, document_type, status, organization_id,
         client_organization_id, extracted_data, processing_error, processed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            doc.id.to_string(),
            doc.file_name,
            doc.document_type.as_str(),
            doc.status.as_str(),
            doc.organization_id,
            doc.client_organization_id,
            extracted,
            doc.processing_error,
            doc.processed_at.map(|t| t.to_rfc3339()),
            doc.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<DocumentRecord>, DatabaseError> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let result = stmt.query_row(params![id.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get all documents with the given status, newest first.
pub fn get_documents_by_status(
    conn: &Connection,
    status: DocumentStatus,
) -> Result<Vec<DocumentRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ?1 ORDER BY created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.as_str()], read_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Apply a partial update. Only the fields set on `update` are written.
pub fn update_document_fields(
    conn: &Connection,
    id: &Uuid,
    update: &DocumentUpdate,
) -> Result<(), DatabaseError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<SqlValue> = vec![SqlValue::Text(id.to_string())];

    if let Some(status) = update.status {
        sets.push("status");
        values.push(SqlValue::Text(status.as_str().to_string()));
    }
    if let Some(data) = &update.extracted_data {
        sets.push("extracted_data");
        values.push(SqlValue::Text(serde_json::to_string(data)?));
    }
    if let Some(at) = update.processed_at {
        sets.push("processed_at");
        values.push(SqlValue::Text(at.to_rfc3339()));
    }
    if let Some(error) = &update.processing_error {
        sets.push("processing_error");
        values.push(match error {
            Some(message) => SqlValue::Text(message.clone()),
            None => SqlValue::Null,
        });
    }

    if sets.is_empty() {
        return Ok(());
    }

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", i + 2))
        .collect();
    let sql = format!("UPDATE documents SET {} WHERE id = ?1", assignments.join(", "));

    let rows = conn.execute(&sql, params_from_iter(values))?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// Internal row type for DocumentRecord mapping
struct DocumentRow {
    id: String,
    file_name: String,
    document_type: String,
    status: String,
    organization_id: Option<String>,
    client_organization_id: Option<String>,
    extracted_data: Option<String>,
    processing_error: Option<String>,
    processed_at: Option<String>,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        file_name: row.get(1)?,
        document_type: row.get(2)?,
        status: row.get(3)?,
        organization_id: row.get(4)?,
        client_organization_id: row.get(5)?,
        extracted_data: row.get(6)?,
        processing_error: row.get(7)?,
        processed_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<DocumentRecord, DatabaseError> {
    Ok(DocumentRecord {
        id: parse_uuid("documents.id", &row.id)?,
        file_name: row.file_name,
        document_type: DocumentKind::from_str(&row.document_type)?,
        status: DocumentStatus::from_str(&row.status)?,
        organization_id: row.organization_id,
        client_organization_id: row.client_organization_id,
        extracted_data: parse_json(row.extracted_data)?,
        processing_error: row.processing_error,
        processed_at: row
            .processed_at
            .as_deref()
            .map(|s| parse_timestamp("documents.processed_at", s))
            .transpose()?,
        created_at: parse_timestamp("documents.created_at", &row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let doc = DocumentRecord::new("cert.pdf", DocumentKind::CertificateOfFitness)
            .with_organization("org-1");
        insert_document(&conn, &doc).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.file_name, "cert.pdf");
        assert_eq!(loaded.status, DocumentStatus::Pending);
        assert_eq!(loaded.organization_id.as_deref(), Some("org-1"));
        assert!(loaded.extracted_data.is_none());
    }

    #[test]
    fn missing_document_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_document(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn partial_update_writes_only_given_fields() {
        let conn = open_memory_database().unwrap();
        let doc = DocumentRecord::new("q.pdf", DocumentKind::MedicalQuestionnaire);
        insert_document(&conn, &doc).unwrap();

        let update = DocumentUpdate {
            status: Some(DocumentStatus::Processed),
            extracted_data: Some(json!({"structured_data": {"a": 1}})),
            processed_at: Some(Utc::now()),
            processing_error: None,
        };
        update_document_fields(&conn, &doc.id, &update).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Processed);
        assert_eq!(loaded.extracted_data.unwrap()["structured_data"]["a"], 1);
        assert!(loaded.processed_at.is_some());
        assert_eq!(loaded.document_type, DocumentKind::MedicalQuestionnaire);
    }

    #[test]
    fn processing_error_can_be_set_and_cleared() {
        let conn = open_memory_database().unwrap();
        let doc = DocumentRecord::new("c.pdf", DocumentKind::CertificateOfFitness);
        insert_document(&conn, &doc).unwrap();

        update_document_fields(&conn, &doc.id, &DocumentUpdate::failed("timed out")).unwrap();
        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Failed);
        assert_eq!(loaded.processing_error.as_deref(), Some("timed out"));

        let clear = DocumentUpdate {
            processing_error: Some(None),
            ..DocumentUpdate::status(DocumentStatus::Processing)
        };
        update_document_fields(&conn, &doc.id, &clear).unwrap();
        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert!(loaded.processing_error.is_none());
    }

    #[test]
    fn update_unknown_document_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_document_fields(
            &conn,
            &Uuid::new_v4(),
            &DocumentUpdate::status(DocumentStatus::Processing),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn empty_update_is_noop() {
        let conn = open_memory_database().unwrap();
        assert!(update_document_fields(&conn, &Uuid::new_v4(), &DocumentUpdate::default()).is_ok());
    }

    #[test]
    fn list_by_status() {
        let conn = open_memory_database().unwrap();
        let a = DocumentRecord::new("a.pdf", DocumentKind::CertificateOfFitness);
        let b = DocumentRecord::new("b.pdf", DocumentKind::CertificateOfFitness);
        insert_document(&conn, &a).unwrap();
        insert_document(&conn, &b).unwrap();
        update_document_fields(&conn, &b.id, &DocumentUpdate::status(DocumentStatus::Processing))
            .unwrap();

        let pending = get_documents_by_status(&conn, DocumentStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }
}
