pub mod certificate;
pub mod document;
pub mod enums;
pub mod normalized;
pub mod patient;
pub mod questionnaire;

pub use certificate::*;
pub use document::*;
pub use normalized::*;
pub use patient::*;
pub use questionnaire::*;
