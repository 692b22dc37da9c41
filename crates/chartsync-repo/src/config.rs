//! Repository connection configuration
//!
//! The read-only view of a chart repository that a sync pass works from.
//! It is built by the hosting side (e.g. from a cluster resource) and never
//! written back.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RepoError, Result};

/// Canonical location of the index document below a repository base URL
pub const INDEX_FILE: &str = "index.yaml";

/// Repository definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Unique name for this repository
    pub name: String,

    /// Human readable name shown alongside synced charts
    #[serde(default)]
    pub display_name: Option<String>,

    /// Repository base URL (HTTP(S))
    pub url: String,

    /// Disabled repositories are never contacted
    #[serde(default)]
    pub disabled: bool,

    /// Name of the config object holding the CA bundle
    #[serde(default)]
    pub ca_ref: Option<String>,

    /// Name of the secret holding the client certificate and key
    #[serde(default)]
    pub client_cert_ref: Option<String>,
}

impl RepositoryConfig {
    /// Create a new enabled repository without trust references
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            url: url.into(),
            disabled: false,
            ca_ref: None,
            client_cert_ref: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the CA bundle reference
    pub fn with_ca_ref(mut self, name: impl Into<String>) -> Self {
        self.ca_ref = Some(name.into());
        self
    }

    /// Set the client certificate reference
    pub fn with_client_cert_ref(mut self, name: impl Into<String>) -> Self {
        self.client_cert_ref = Some(name.into());
        self
    }

    /// CA reference, if one is set and non-empty
    pub fn ca_ref(&self) -> Option<&str> {
        non_empty(self.ca_ref.as_deref())
    }

    /// Client certificate reference, if one is set and non-empty
    pub fn client_cert_ref(&self) -> Option<&str> {
        non_empty(self.client_cert_ref.as_deref())
    }

    /// Display name, if one is set and non-empty
    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.display_name.as_deref())
    }

    /// Get the normalized index URL for this repository
    pub fn index_url(&self) -> Result<String> {
        index_url(&self.url)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Normalize a repository base URL to the location of its index document
///
/// URLs that already point at `index.yaml` are kept as they are. Anything
/// else gets `/index.yaml` appended after trailing slashes are trimmed.
pub fn index_url(base: &str) -> Result<String> {
    let base = base.trim();
    let parsed = Url::parse(base).map_err(|e| RepoError::InvalidRepositoryUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RepoError::InvalidRepositoryUrl {
            url: base.to_string(),
            reason: "URL must start with http:// or https://".to_string(),
        });
    }

    let suffix = format!("/{}", INDEX_FILE);
    if base.ends_with(&suffix) {
        Ok(base.to_string())
    } else {
        Ok(format!("{}{}", base.trim_end_matches('/'), suffix))
    }
}
