use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Medcert";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Direct document-analysis endpoint used when no override is configured.
pub const DEFAULT_OCR_ENDPOINT: &str =
    "https://api.va.landing.ai/v1/tools/agentic-document-analysis";

/// PDFs larger than this are handed to the delegated processing service.
pub const DEFAULT_DELEGATE_THRESHOLD_BYTES: u64 = 4 * 1024 * 1024;

/// Deadline for the direct API path (3 minutes).
pub const DIRECT_OCR_TIMEOUT_SECS: u64 = 180;

/// Deadline for the delegated large-document path (5 minutes).
pub const DELEGATED_OCR_TIMEOUT_SECS: u64 = 300;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medcert=info"
}

/// Get the application data directory
/// ~/Medcert/ on all platforms. Falls back to the working directory when
/// no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("medcert.db")
}

/// Settings for the third-party OCR collaborator.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Credential sent as HTTP Basic authorization on the direct path.
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Base URL of the delegated processing service, if deployed.
    pub delegated_url: Option<String>,
    pub delegate_threshold_bytes: u64,
    /// Route every document through the delegated service.
    pub force_delegated: bool,
    pub direct_timeout: Duration,
    pub delegated_timeout: Duration,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            delegated_url: None,
            delegate_threshold_bytes: DEFAULT_DELEGATE_THRESHOLD_BYTES,
            force_delegated: false,
            direct_timeout: Duration::from_secs(DIRECT_OCR_TIMEOUT_SECS),
            delegated_timeout: Duration::from_secs(DELEGATED_OCR_TIMEOUT_SECS),
        }
    }
}

impl OcrConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment in production,
    /// a map in tests). Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let delegate_threshold_bytes = match get("OCR_DELEGATE_THRESHOLD_BYTES") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid OCR_DELEGATE_THRESHOLD_BYTES, using default");
                defaults.delegate_threshold_bytes
            }),
            None => defaults.delegate_threshold_bytes,
        };

        let force_delegated = get("OCR_FORCE_DELEGATED")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            api_key: get("LANDING_AI_API_KEY"),
            endpoint: get("LANDING_AI_ENDPOINT").unwrap_or(defaults.endpoint),
            delegated_url: get("SDK_MICROSERVICE_URL").map(|u| u.trim_end_matches('/').to_string()),
            delegate_threshold_bytes,
            force_delegated,
            ..defaults
        }
    }
}

/// Retry and verification policy for document persistence.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Attempts per persistence write before the run is failed.
    pub persist_attempts: u32,
    /// Fixed delay between attempts (linear, not exponential).
    pub retry_delay: Duration,
    /// Read-back rounds used to confirm the stored status.
    pub verify_rounds: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            persist_attempts: 3,
            retry_delay: Duration::from_secs(1),
            verify_rounds: 3,
        }
    }
}
