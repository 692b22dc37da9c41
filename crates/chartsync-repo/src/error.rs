//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Trust Errors ============
    #[error("{kind} '{name}' could not be read from namespace '{namespace}': {reason}")]
    ConfigLookup {
        kind: &'static str,
        name: String,
        namespace: String,
        reason: String,
    },

    #[error("{kind} '{name}' has no '{key}' key")]
    ConfigKey {
        kind: &'static str,
        name: String,
        key: String,
    },

    #[error("Invalid trust material in {source_name}: {message}")]
    TrustParse {
        source_name: String,
        message: String,
    },

    // ============ Network Errors ============
    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Fetching {url} failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to build HTTP client: {message}")]
    Transport { message: String },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    Parse { message: String },

    // ============ Other ============
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Build a fetch error from a transport failure
    pub fn fetch(url: impl Into<String>, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };

        RepoError::Fetch {
            url: url.into(),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Check if this error was caused by cancellation of the pass
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RepoError::Cancelled)
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Parse {
            message: e.to_string(),
        }
    }
}
