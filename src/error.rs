//! Custom error types for rustpubsync.
//!
//! All library functions return `Result<T, SyncError>` instead of using `unwrap()`.
//! Which of these errors can abort a run is decided by the caller: only the
//! bulk author/publication-list stage escalates, everything else degrades.

use thiserror::Error;

/// Main error type for rustpubsync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the upstream source
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Upstream returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message
        message: String,
    },

    /// CAPTCHA / anti-bot page served instead of content
    #[error("CAPTCHA detected, upstream is blocking requests")]
    Captcha,

    /// Author profile or publication not found upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// Proxy provisioning error (never escapes the provisioner)
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `SyncError`
pub type Result<T> = std::result::Result<T, SyncError>;
