pub mod id_number; // National ID decoding
pub mod extraction;
pub mod structuring;
pub mod ocr;
pub mod patient;
pub mod expiry;
pub mod processor; // Document Processing Orchestrator
