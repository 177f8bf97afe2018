//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed [`rusqlite::Connection`]. All public
//! functions are re-exported here.

mod document;
mod patient;

pub use document::*;
pub use patient::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("{field}: {e}")))
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidTimestamp {
            field: field.into(),
            value: raw.into(),
        })
}

pub(crate) fn parse_json(raw: Option<String>) -> Result<Option<serde_json::Value>, DatabaseError> {
    match raw {
        Some(s) if !s.is_empty() => Ok(Some(serde_json::from_str(&s)?)),
        _ => Ok(None),
    }
}
