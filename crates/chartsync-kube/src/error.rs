//! Error types for chartsync-kube

use chartsync_repo::RepoError;
use thiserror::Error;

/// Result type for chartsync-kube operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing a repository
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Trust, transport, fetch or index error
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Reading or writing a chart record failed
    #[error("failed to persist chart record '{name}': {message}")]
    Persistence { name: String, message: String },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Resource is missing required fields
    #[error("invalid resource: {0}")]
    InvalidResource(String),
}

impl SyncError {
    /// Build a persistence error for a record
    pub fn persistence(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Persistence {
            name: name.into(),
            message: err.to_string(),
        }
    }

    /// Check if the pass was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Repo(e) if e.is_cancelled())
    }
}
