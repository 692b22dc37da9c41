//! Custom resource types
//!
//! - [`HelmChartRepository`]: repository definition watched by the controller
//! - [`HelmChart`]: one record per chart, owned by its repository

use chartsync_repo::RepositoryConfig;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Label carrying the name of the repository a record came from
pub const REPOSITORY_LABEL: &str = "helm-chart-repository-operator.redhat-cop.io/repository";

/// Chart repository definition
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "helm.openshift.io",
    version = "v1beta1",
    kind = "HelmChartRepository",
    plural = "helmchartrepositories",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartRepositorySpec {
    /// Disabled repositories are not synchronized
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub connection_config: ConnectionConfig,
}

/// How to reach a repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Repository base URL
    #[serde(default)]
    pub url: String,

    /// ConfigMap holding a `ca-bundle.crt` key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<NameReference>,

    /// Secret holding `tls.crt` and `tls.key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_config: Option<NameReference>,
}

/// Reference to an object in the configuration namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameReference {
    #[serde(default)]
    pub name: String,
}

impl From<&HelmChartRepository> for RepositoryConfig {
    fn from(repo: &HelmChartRepository) -> Self {
        let spec = &repo.spec;
        let conn = &spec.connection_config;
        RepositoryConfig {
            name: repo.name_any(),
            display_name: spec.display_name.clone(),
            url: conn.url.clone(),
            disabled: spec.disabled,
            ca_ref: conn.ca.as_ref().map(|r| r.name.clone()),
            client_cert_ref: conn.tls_client_config.as_ref().map(|r| r.name.clone()),
        }
    }
}

/// Chart record
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "redhatcop.redhat.io",
    version = "v1alpha1",
    kind = "HelmChart",
    plural = "helmcharts",
    status = "HelmChartStatus",
    derive = "PartialEq",
    derive = "Default",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartSpec {
    /// Chart name
    pub name: String,

    /// Compatible versions, newest first
    #[serde(default)]
    pub versions: Vec<HelmChartVersion>,

    pub repository_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartStatus {
    /// When the record was last synchronized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_timestamp: Option<Time>,
}

/// One chart version as stored in a record
///
/// `sources`, `maintainers` and `dependencies` keep "absent" apart from
/// "present but empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartVersion {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Time>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,

    #[serde(default)]
    pub api_version: String,

    #[serde(default, rename = "keyword", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub home: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainers: Option<Vec<HelmChartMaintainer>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<HelmChartDependency>>,

    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub chart_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kube_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmChartMaintainer {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmChartDependency {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default)]
    pub repository: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
}

/// Name of the record for a chart of a repository
pub fn record_name(repository: &str, chart: &str) -> String {
    format!("{}.{}", repository, chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_name() {
        assert_eq!(record_name("stable", "nginx"), "stable.nginx");
    }

    #[test]
    fn test_repository_into_config() {
        let repo: HelmChartRepository = serde_json::from_value(json!({
            "apiVersion": "helm.openshift.io/v1beta1",
            "kind": "HelmChartRepository",
            "metadata": { "name": "private" },
            "spec": {
                "displayName": "Private Charts",
                "connectionConfig": {
                    "url": "https://charts.example.com",
                    "ca": { "name": "custom-ca" },
                    "tlsClientConfig": { "name": "" }
                }
            }
        }))
        .unwrap();

        let config = RepositoryConfig::from(&repo);
        assert_eq!(config.name, "private");
        assert_eq!(config.url, "https://charts.example.com");
        assert!(!config.disabled);
        assert_eq!(config.display_name(), Some("Private Charts"));
        assert_eq!(config.ca_ref(), Some("custom-ca"));
        assert_eq!(config.client_cert_ref(), None);
    }

    #[test]
    fn test_disabled_repository_manifest() {
        let repo: HelmChartRepository = serde_yaml::from_str(
            r#"
apiVersion: helm.openshift.io/v1beta1
kind: HelmChartRepository
metadata:
  name: legacy
spec:
  disabled: true
  connectionConfig:
    url: http://charts.internal/legacy
"#,
        )
        .unwrap();

        let config = RepositoryConfig::from(&repo);
        assert!(config.disabled);
        assert_eq!(config.display_name(), None);
        assert_eq!(config.ca_ref(), None);
    }

    #[test]
    fn test_version_serialization() {
        let version = HelmChartVersion {
            version: "1.0.0".to_string(),
            api_version: "v2".to_string(),
            keywords: vec!["web".to_string()],
            sources: Some(vec![]),
            urls: vec!["https://example.com/nginx-1.0.0.tgz".to_string()],
            kube_version: ">=1.20.0".to_string(),
            dependencies: Some(vec![HelmChartDependency {
                name: "common".to_string(),
                repository: "https://charts.example.com".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&version).unwrap(),
            json!({
                "version": "1.0.0",
                "apiVersion": "v2",
                "keyword": ["web"],
                "sources": [],
                "dependencies": [{ "name": "common", "repository": "https://charts.example.com" }],
                "urls": ["https://example.com/nginx-1.0.0.tgz"],
                "kubeVersion": ">=1.20.0"
            })
        );
    }

    #[test]
    fn test_record_scope_and_kind() {
        use kube::Resource;

        assert_eq!(HelmChart::kind(&()), "HelmChart");
        assert_eq!(HelmChart::api_version(&()), "redhatcop.redhat.io/v1alpha1");
        assert_eq!(HelmChartRepository::plural(&()), "helmchartrepositories");
    }
}
