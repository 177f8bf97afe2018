//! Certificate expiry urgency.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::enums::ExpiryUrgency;
use crate::models::ExtractedCertificate;
use crate::pipeline::structuring::parse_date;

pub const HIGH_WITHIN_DAYS: i64 = 7;
pub const MEDIUM_WITHIN_DAYS: i64 = 14;
pub const LOW_WITHIN_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateExpiry {
    pub valid_until: NaiveDate,
    /// Negative once expired.
    pub days_remaining: i64,
    pub urgency: Option<ExpiryUrgency>,
}

/// `None` when expiry is more than 30 days out.
pub fn expiry_urgency(valid_until: NaiveDate, today: NaiveDate) -> Option<ExpiryUrgency> {
    match (valid_until - today).num_days() {
        d if d < 0 => Some(ExpiryUrgency::Expired),
        d if d <= HIGH_WITHIN_DAYS => Some(ExpiryUrgency::High),
        d if d <= MEDIUM_WITHIN_DAYS => Some(ExpiryUrgency::Medium),
        d if d <= LOW_WITHIN_DAYS => Some(ExpiryUrgency::Low),
        _ => None,
    }
}

/// Expiry of an extracted certificate, or `None` when `valid_until` is
/// missing or unparseable.
pub fn certificate_expiry(record: &ExtractedCertificate, today: NaiveDate) -> Option<CertificateExpiry> {
    let valid_until = parse_date(&record.certification.valid_until)?;
    Some(CertificateExpiry {
        valid_until,
        days_remaining: (valid_until - today).num_days(),
        urgency: expiry_urgency(valid_until, today),
    })
}
