use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::{parse_json, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::Sex;
use crate::models::{NewPatient, PatientRecord, PatientUpdate};

const PATIENT_COLUMNS: &str = "id, first_name, last_name, gender, date_of_birth, id_number,
     organization_id, client_organization_id, contact_info, medical_history, created_at, updated_at";

/// Patients whose first name, last name and organization match exactly.
/// A `None` organization matches only patients without one.
pub fn find_patients(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    organization_id: Option<&str>,
) -> Result<Vec<PatientRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE first_name = ?1 AND last_name = ?2 AND organization_id IS ?3
         ORDER BY created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![first_name, last_name, organization_id], read_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<PatientRecord>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;

    match stmt.query_row(params![id.to_string()], read_row) {
        Ok(row) => Ok(Some(patient_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_patient(conn: &Connection, patient: &NewPatient) -> Result<PatientRecord, DatabaseError> {
    let now = Utc::now();
    let record = PatientRecord {
        id: Uuid::new_v4(),
        first_name: patient.first_name.clone(),
        last_name: patient.last_name.clone(),
        gender: patient.gender,
        date_of_birth: patient.date_of_birth,
        id_number: patient.id_number.clone(),
        organization_id: patient.organization_id.clone(),
        client_organization_id: patient.client_organization_id.clone(),
        contact_info: None,
        medical_history: patient.medical_history.clone(),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, gender, date_of_birth, id_number,
         organization_id, client_organization_id, contact_info, medical_history, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10, ?10)",
        params![
            record.id.to_string(),
            record.first_name,
            record.last_name,
            record.gender.map(|g| g.as_str()),
            record.date_of_birth.map(|d| d.to_string()),
            record.id_number,
            record.organization_id,
            record.client_organization_id,
            serde_json::to_string(&record.medical_history)?,
            now.to_rfc3339(),
        ],
    )?;
    Ok(record)
}

/// Merge-update: only fields set on `update` are written; `updated_at` always moves.
pub fn update_patient(conn: &Connection, id: &Uuid, update: &PatientUpdate) -> Result<(), DatabaseError> {
    let mut sets: Vec<&str> = vec!["updated_at"];
    let mut values: Vec<SqlValue> = vec![
        SqlValue::Text(id.to_string()),
        SqlValue::Text(Utc::now().to_rfc3339()),
    ];

    if let Some(gender) = update.gender {
        sets.push("gender");
        values.push(SqlValue::Text(gender.as_str().to_string()));
    }
    if let Some(dob) = update.date_of_birth {
        sets.push("date_of_birth");
        values.push(SqlValue::Text(dob.to_string()));
    }
    if let Some(id_number) = &update.id_number {
        sets.push("id_number");
        values.push(SqlValue::Text(id_number.clone()));
    }
    if let Some(client_org) = &update.client_organization_id {
        sets.push("client_organization_id");
        values.push(SqlValue::Text(client_org.clone()));
    }
    if let Some(history) = &update.medical_history {
        sets.push("medical_history");
        values.push(SqlValue::Text(serde_json::to_string(history)?));
    }

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", i + 2))
        .collect();
    let sql = format!("UPDATE patients SET {} WHERE id = ?1", assignments.join(", "));

    let rows = conn.execute(&sql, params_from_iter(values))?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// Internal row type for PatientRecord mapping
struct PatientRow {
    id: String,
    first_name: String,
    last_name: String,
    gender: Option<String>,
    date_of_birth: Option<String>,
    id_number: Option<String>,
    organization_id: Option<String>,
    client_organization_id: Option<String>,
    contact_info: Option<String>,
    medical_history: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        gender: row.get(3)?,
        date_of_birth: row.get(4)?,
        id_number: row.get(5)?,
        organization_id: row.get(6)?,
        client_organization_id: row.get(7)?,
        contact_info: row.get(8)?,
        medical_history: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<PatientRecord, DatabaseError> {
    Ok(PatientRecord {
        id: parse_uuid("patients.id", &row.id)?,
        first_name: row.first_name,
        last_name: row.last_name,
        gender: row.gender.as_deref().map(Sex::from_str).transpose()?,
        date_of_birth: row
            .date_of_birth
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        id_number: row.id_number,
        organization_id: row.organization_id,
        client_organization_id: row.client_organization_id,
        contact_info: parse_json(row.contact_info)?,
        medical_history: parse_json(row.medical_history)?
            .unwrap_or_else(|| serde_json::json!({})),
        created_at: parse_timestamp("patients.created_at", &row.created_at)?,
        updated_at: parse_timestamp("patients.updated_at", &row.updated_at)?,
    })
}
