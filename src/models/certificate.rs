//! Certificate-of-fitness record produced by the extraction pipeline.
//!
//! The test-result and restriction vocabularies are closed enums backed by
//! fixed-size arrays, so every known key is present in every record and no
//! other key can appear.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::enums::FieldSource;

/// Canonical marker for a value that is absent or blank on the document.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder used when the patient cannot be identified.
pub const UNKNOWN: &str = "Unknown";

// ──────────────────────────────────────────────
// Medical tests
// ──────────────────────────────────────────────

/// The nine tests printed on a certificate of fitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MedicalTest {
    Bloods,
    FarNearVision,
    SideDepth,
    NightVision,
    Hearing,
    Heights,
    LungFunction,
    XRay,
    DrugScreen,
}

impl MedicalTest {
    pub const ALL: [MedicalTest; 9] = [
        MedicalTest::Bloods,
        MedicalTest::FarNearVision,
        MedicalTest::SideDepth,
        MedicalTest::NightVision,
        MedicalTest::Hearing,
        MedicalTest::Heights,
        MedicalTest::LungFunction,
        MedicalTest::XRay,
        MedicalTest::DrugScreen,
    ];

    /// Key prefix used in `{key}_done` / `{key}_results`.
    pub fn key(&self) -> &'static str {
        match self {
            MedicalTest::Bloods => "bloods",
            MedicalTest::FarNearVision => "far_near_vision",
            MedicalTest::SideDepth => "side_depth",
            MedicalTest::NightVision => "night_vision",
            MedicalTest::Hearing => "hearing",
            MedicalTest::Heights => "heights",
            MedicalTest::LungFunction => "lung_function",
            MedicalTest::XRay => "x_ray",
            MedicalTest::DrugScreen => "drug_screen",
        }
    }

    /// Label as printed on the certificate.
    pub fn label(&self) -> &'static str {
        match self {
            MedicalTest::Bloods => "Bloods",
            MedicalTest::FarNearVision => "Far, Near Vision",
            MedicalTest::SideDepth => "Side & Depth",
            MedicalTest::NightVision => "Night Vision",
            MedicalTest::Hearing => "Hearing",
            MedicalTest::Heights => "Working at Heights",
            MedicalTest::LungFunction => "Lung Function",
            MedicalTest::XRay => "X-Ray",
            MedicalTest::DrugScreen => "Drug Screen",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Done flag and result text for one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub done: bool,
    pub result: String,
}

impl Default for TestResult {
    fn default() -> Self {
        Self {
            done: false,
            result: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Results for the full test vocabulary. Serializes flat as
/// `{key}_done: bool` and `{key}_results: string`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestResults([TestResult; 9]);

impl TestResults {
    pub fn get(&self, test: MedicalTest) -> &TestResult {
        &self.0[test.index()]
    }

    pub fn set(&mut self, test: MedicalTest, result: TestResult) {
        self.0[test.index()] = result;
    }

    pub fn iter(&self) -> impl Iterator<Item = (MedicalTest, &TestResult)> {
        MedicalTest::ALL.iter().map(move |t| (*t, self.get(*t)))
    }

    pub fn done_count(&self) -> usize {
        self.0.iter().filter(|r| r.done).count()
    }
}

impl Serialize for TestResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(MedicalTest::ALL.len() * 2))?;
        for (test, result) in self.iter() {
            map.serialize_entry(&format!("{}_done", test.key()), &result.done)?;
            map.serialize_entry(&format!("{}_results", test.key()), &result.result)?;
        }
        map.end()
    }
}

// ──────────────────────────────────────────────
// Restrictions
// ──────────────────────────────────────────────

/// Workplace restrictions a physician may impose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Restriction {
    Heights,
    DustExposure,
    MotorizedEquipment,
    HearingProtection,
    ConfinedSpaces,
    ChemicalExposure,
    Spectacles,
    ChronicTreatment,
}

impl Restriction {
    pub const ALL: [Restriction; 8] = [
        Restriction::Heights,
        Restriction::DustExposure,
        Restriction::MotorizedEquipment,
        Restriction::HearingProtection,
        Restriction::ConfinedSpaces,
        Restriction::ChemicalExposure,
        Restriction::Spectacles,
        Restriction::ChronicTreatment,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Restriction::Heights => "heights",
            Restriction::DustExposure => "dust_exposure",
            Restriction::MotorizedEquipment => "motorized_equipment",
            Restriction::HearingProtection => "hearing_protection",
            Restriction::ConfinedSpaces => "confined_spaces",
            Restriction::ChemicalExposure => "chemical_exposure",
            Restriction::Spectacles => "spectacles",
            Restriction::ChronicTreatment => "chronic_treatment",
        }
    }

    /// Display label, as printed on the certificate.
    pub fn label(&self) -> &'static str {
        match self {
            Restriction::Heights => "Heights",
            Restriction::DustExposure => "Dust Exposure",
            Restriction::MotorizedEquipment => "Motorized Equipment",
            Restriction::HearingProtection => "Wear Hearing Protection",
            Restriction::ConfinedSpaces => "Confined Spaces",
            Restriction::ChemicalExposure => "Chemical Exposure",
            Restriction::Spectacles => "Wear Spectacles",
            Restriction::ChronicTreatment => "Remain on Treatment for Chronic Conditions",
        }
    }

    /// Labels to look for in the document, most specific first.
    pub fn search_labels(&self) -> &'static [&'static str] {
        match self {
            Restriction::ChronicTreatment => &[
                "Remain on Treatment for Chronic Conditions",
                "Remain on Treatment",
            ],
            Restriction::Heights => &["Heights"],
            Restriction::DustExposure => &["Dust Exposure"],
            Restriction::MotorizedEquipment => &["Motorized Equipment"],
            Restriction::HearingProtection => &["Wear Hearing Protection"],
            Restriction::ConfinedSpaces => &["Confined Spaces"],
            Restriction::ChemicalExposure => &["Chemical Exposure"],
            Restriction::Spectacles => &["Wear Spectacles"],
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Restrictions([bool; 8]);

impl Restrictions {
    pub fn get(&self, restriction: Restriction) -> bool {
        self.0[restriction.index()]
    }

    pub fn set(&mut self, restriction: Restriction, value: bool) {
        self.0[restriction.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Restriction, bool)> + '_ {
        Restriction::ALL.iter().map(move |r| (*r, self.get(*r)))
    }

    /// Restrictions currently in force.
    pub fn active(&self) -> Vec<Restriction> {
        self.iter().filter(|(_, on)| *on).map(|(r, _)| r).collect()
    }
}

impl Serialize for Restrictions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Restriction::ALL.len()))?;
        for (restriction, on) in self.iter() {
            map.serialize_entry(restriction.key(), &on)?;
        }
        map.end()
    }
}

// ──────────────────────────────────────────────
// Fitness
// ──────────────────────────────────────────────

/// The five fitness determinations, declared in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitnessOutcome {
    Fit,
    FitWithRestrictions,
    FitWithCondition,
    TemporarilyUnfit,
    Unfit,
}

impl FitnessOutcome {
    /// First true flag wins when more than one is set.
    pub const PRIORITY: [FitnessOutcome; 5] = [
        FitnessOutcome::Fit,
        FitnessOutcome::FitWithRestrictions,
        FitnessOutcome::FitWithCondition,
        FitnessOutcome::TemporarilyUnfit,
        FitnessOutcome::Unfit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FitnessOutcome::Fit => "Fit",
            FitnessOutcome::FitWithRestrictions => "Fit with Restrictions",
            FitnessOutcome::FitWithCondition => "Fit with Condition",
            FitnessOutcome::TemporarilyUnfit => "Temporarily Unfit",
            FitnessOutcome::Unfit => "Unfit",
        }
    }

    /// Labels to look for in the document.
    pub fn search_labels(&self) -> &'static [&'static str] {
        match self {
            FitnessOutcome::Fit => &["FIT"],
            FitnessOutcome::FitWithRestrictions => &["Fit with Restriction"],
            FitnessOutcome::FitWithCondition => &["Fit with Condition"],
            FitnessOutcome::TemporarilyUnfit => &["Temporarily Unfit", "Temporary Unfit"],
            FitnessOutcome::Unfit => &["UNFIT"],
        }
    }

    /// Interpret a free-text fitness status ("Fit for duty", "Temporary unfit").
    pub fn from_text(text: &str) -> Option<Self> {
        let t = text.trim().to_lowercase();
        if t.is_empty() || t == "unknown" {
            return None;
        }
        if t.contains("temporar") && t.contains("unfit") {
            Some(FitnessOutcome::TemporarilyUnfit)
        } else if t.contains("unfit") || t.starts_with("not fit") {
            Some(FitnessOutcome::Unfit)
        } else if t.contains("restriction") {
            Some(FitnessOutcome::FitWithRestrictions)
        } else if t.contains("condition") {
            Some(FitnessOutcome::FitWithCondition)
        } else if t.starts_with("fit") {
            Some(FitnessOutcome::Fit)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Certification {
    pub fit: bool,
    pub fit_with_restrictions: bool,
    pub fit_with_condition: bool,
    pub temporarily_unfit: bool,
    pub unfit: bool,
    pub valid_until: String,
    pub follow_up: String,
    pub review_date: String,
    pub comments: String,
}

impl Certification {
    pub fn flag(&self, outcome: FitnessOutcome) -> bool {
        match outcome {
            FitnessOutcome::Fit => self.fit,
            FitnessOutcome::FitWithRestrictions => self.fit_with_restrictions,
            FitnessOutcome::FitWithCondition => self.fit_with_condition,
            FitnessOutcome::TemporarilyUnfit => self.temporarily_unfit,
            FitnessOutcome::Unfit => self.unfit,
        }
    }

    pub fn set_flag(&mut self, outcome: FitnessOutcome, value: bool) {
        match outcome {
            FitnessOutcome::Fit => self.fit = value,
            FitnessOutcome::FitWithRestrictions => self.fit_with_restrictions = value,
            FitnessOutcome::FitWithCondition => self.fit_with_condition = value,
            FitnessOutcome::TemporarilyUnfit => self.temporarily_unfit = value,
            FitnessOutcome::Unfit => self.unfit = value,
        }
    }

    pub fn any_flag(&self) -> bool {
        FitnessOutcome::PRIORITY.iter().any(|o| self.flag(*o))
    }
}

// ──────────────────────────────────────────────
// Examination + patient
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExaminationType {
    pub pre_employment: bool,
    pub periodical: bool,
    pub exit: bool,
}

impl ExaminationType {
    pub fn any(&self) -> bool {
        self.pre_employment || self.periodical || self.exit
    }

    /// Lenient parse of a textual examination type.
    pub fn from_text(text: &str) -> Self {
        let t = text.to_lowercase();
        Self {
            pre_employment: t.contains("pre-employment") || t.contains("pre employment") || t.contains("pre_employment"),
            periodical: t.contains("periodic"),
            exit: t.split(|c: char| !c.is_alphanumeric()).any(|w| w == "exit"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Examination {
    pub date: String,
    pub physician: String,
    #[serde(rename = "type")]
    pub exam_type: ExaminationType,
    pub test_results: TestResults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientInfo {
    pub name: String,
    pub date_of_birth: String,
    pub national_id: String,
    pub company: String,
    pub occupation: String,
    pub sex: String,
}

/// Canonical structured record for one certificate of fitness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedCertificate {
    pub patient: PatientInfo,
    pub examination: Examination,
    pub certification: Certification,
    pub restrictions: Restrictions,
    /// Original markdown, retained for audit.
    pub raw_content: Option<String>,
    /// Which pass produced each populated field, keyed by dotted path.
    pub provenance: BTreeMap<String, FieldSource>,
}

impl ExtractedCertificate {
    /// Record with every field at its documented default.
    pub fn empty(today: NaiveDate) -> Self {
        let mut provenance = BTreeMap::new();
        provenance.insert("examination.date".to_string(), FieldSource::Default);
        Self {
            patient: PatientInfo {
                name: UNKNOWN.to_string(),
                ..PatientInfo::default()
            },
            examination: Examination {
                date: today.format("%Y-%m-%d").to_string(),
                ..Examination::default()
            },
            certification: Certification::default(),
            restrictions: Restrictions::default(),
            raw_content: None,
            provenance,
        }
    }

    /// Minimal record returned when extraction itself fails.
    pub fn fallback(today: NaiveDate) -> Self {
        let mut record = Self::empty(today);
        record.patient.national_id = UNKNOWN.to_string();
        record
    }

    pub fn source_of(&self, path: &str) -> FieldSource {
        self.provenance.get(path).copied().unwrap_or(FieldSource::Default)
    }

    pub fn set_source(&mut self, path: &str, source: FieldSource) {
        self.provenance.insert(path.to_string(), source);
    }
}
