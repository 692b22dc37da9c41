//! CLI error types with exit code handling

use chartsync_kube::{PassFailure, SyncError};
use chartsync_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid settings or repository definition
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartsync::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster unreachable or request refused
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(chartsync::cli::cluster),
        help("Check KUBECONFIG or the in-cluster service account, and that the HelmChartRepository and HelmChart CRDs are installed")
    )]
    Cluster { message: String },

    /// A sync pass failed
    #[error("Sync failed: {message}")]
    #[diagnostic(code(chartsync::cli::sync))]
    Sync {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Output could not be produced
    #[error("Render error: {message}")]
    #[diagnostic(code(chartsync::cli::render))]
    Render { message: String },

    /// Stopped by a signal
    #[error("Interrupted")]
    #[diagnostic(code(chartsync::cli::interrupted))]
    Interrupted,
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Sync { .. } => exit_codes::SYNC_ERROR,
            CliError::Render { .. } => exit_codes::ERROR,
            CliError::Interrupted => exit_codes::INTERRUPTED,
        }
    }

    /// Create a cluster error
    pub fn cluster(err: impl std::fmt::Display) -> Self {
        Self::Cluster {
            message: err.to_string(),
        }
    }

    /// Create a render error
    pub fn render(err: impl std::fmt::Display) -> Self {
        Self::Render {
            message: err.to_string(),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let help = match &err {
            RepoError::ConfigLookup { kind, namespace, .. } => Some(format!(
                "Create the {} in namespace '{}' or fix the reference on the repository",
                kind, namespace
            )),
            RepoError::ConfigKey { key, .. } => Some(format!("Add a '{}' key to it", key)),
            RepoError::Fetch { .. } => {
                Some("Check the repository URL and that it serves index.yaml".to_string())
            }
            _ => None,
        };

        match err {
            RepoError::Cancelled => CliError::Interrupted,
            RepoError::InvalidRepositoryUrl { .. } => CliError::Config {
                message: err.to_string(),
                help: Some("Use an http:// or https:// URL".to_string()),
            },
            other => CliError::Sync {
                message: other.to_string(),
                help,
            },
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Repo(e) => e.into(),
            SyncError::Api(e) => CliError::cluster(e),
            SyncError::InvalidResource(message) => CliError::Config {
                message,
                help: None,
            },
            other => CliError::Sync {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<PassFailure> for CliError {
    fn from(failure: PassFailure) -> Self {
        failure.error.into()
    }
}
