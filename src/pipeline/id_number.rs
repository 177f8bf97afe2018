//! Thirteen-digit national identity number decoding.
//!
//! Layout: `YYMMDD SSSS C A Z`. Birth date, sex sequence, residency
//! flag, a filler digit, then a Luhn check digit. Never panics on any
//! input. Any 13-digit number is decoded; `is_valid` reflects the
//! checksum alone.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::enums::{Residency, Sex};

pub const ID_LENGTH: usize = 13;

/// Two-digit years below this are 2000s, the rest 1900s.
pub const CENTURY_PIVOT: u32 = 25;

/// Sex sequence values at or above this are male.
const MALE_SEQUENCE_START: u32 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NationalIdDecodeResult {
    pub original: String,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub residency: Option<Residency>,
    pub is_valid: bool,
}

impl NationalIdDecodeResult {
    fn invalid(original: &str) -> Self {
        Self {
            original: original.to_string(),
            birthdate: None,
            sex: None,
            residency: None,
            is_valid: false,
        }
    }
}

/// Strip every non-digit. Returns `None` unless exactly 13 digits remain.
pub fn normalize_id_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == ID_LENGTH).then_some(digits)
}

/// Decode an ID number. Derived fields are populated for any 13 digits,
/// checksum or not; an impossible calendar date leaves `birthdate` empty
/// without invalidating the number.
pub fn decode_national_id(raw: &str) -> NationalIdDecodeResult {
    let Some(id) = normalize_id_number(raw) else {
        return NationalIdDecodeResult::invalid(raw);
    };
    let digits: Vec<u32> = id.chars().filter_map(|c| c.to_digit(10)).collect();

    NationalIdDecodeResult {
        original: raw.to_string(),
        birthdate: decode_birthdate(&digits),
        sex: Some(decode_sex(&digits)),
        residency: decode_residency(digits[10]),
        is_valid: luhn_valid(&digits),
    }
}

/// Standard Luhn over all 13 digits: the check digit must equal
/// `(10 - sum mod 10) mod 10` of the doubled payload.
fn luhn_valid(digits: &[u32]) -> bool {
    let Some((&check, payload)) = digits.split_last() else {
        return false;
    };
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10 == check
}

fn number(digits: &[u32]) -> u32 {
    digits.iter().fold(0, |acc, d| acc * 10 + d)
}

fn decode_birthdate(digits: &[u32]) -> Option<NaiveDate> {
    let yy = number(&digits[0..2]);
    let month = number(&digits[2..4]);
    let day = number(&digits[4..6]);
    let year = if yy < CENTURY_PIVOT { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

fn decode_sex(digits: &[u32]) -> Sex {
    if number(&digits[6..10]) >= MALE_SEQUENCE_START {
        Sex::Male
    } else {
        Sex::Female
    }
}

fn decode_residency(digit: u32) -> Option<Residency> {
    match digit {
        0 => Some(Residency::Citizen),
        1 => Some(Residency::PermanentResident),
        _ => None,
    }
}
