use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde uses the same string form so stored JSON and SQL columns agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentStatus {
    Pending => "pending",
    Processing => "processing",
    Processed => "processed",
    Failed => "failed",
});

impl DocumentStatus {
    /// pending → processing → {processed | failed}. Finished documents may
    /// re-enter processing when reprocessed.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Processed)
                | (Processing, Failed)
                | (Processed, Processing)
                | (Failed, Processing)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Processed | DocumentStatus::Failed)
    }
}

str_enum!(DocumentKind {
    CertificateOfFitness => "certificate-of-fitness",
    MedicalQuestionnaire => "medical-questionnaire",
});

impl DocumentKind {
    /// Map the caller's document-type tag. Anything that is not a
    /// questionnaire is processed as a certificate.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_lowercase()) {
            Some(t) if t == "medical-questionnaire" || t == "medical_questionnaire" => {
                DocumentKind::MedicalQuestionnaire
            }
            _ => DocumentKind::CertificateOfFitness,
        }
    }
}

str_enum!(Sex {
    Male => "male",
    Female => "female",
});

impl Sex {
    /// Lenient parse of free-text sex/gender values ("M", "Female", ...).
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "m" | "male" | "man" => Some(Sex::Male),
            "f" | "female" | "woman" => Some(Sex::Female),
            _ => None,
        }
    }
}

str_enum!(Residency {
    Citizen => "citizen",
    PermanentResident => "permanent_resident",
});

str_enum!(ExpiryUrgency {
    Expired => "expired",
    High => "high",
    Medium => "medium",
    Low => "low",
});

str_enum!(FieldSource {
    Json => "json",
    Markdown => "markdown",
    Derived => "derived",
    Default => "default",
});
