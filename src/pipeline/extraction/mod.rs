pub mod sanitize;
pub mod table;
pub mod checkbox;
pub mod json_path;
pub mod certificate;
pub mod questionnaire;

pub use sanitize::*;
pub use checkbox::{any_selected, is_selected, LabelPattern, SelectionDetector, SelectionMatcher};
pub use json_path::*;
pub use certificate::*;
pub use questionnaire::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),
}
