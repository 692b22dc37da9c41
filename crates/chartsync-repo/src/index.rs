//! Repository index types
//!
//! Helm-compatible `index.yaml` documents. Chart metadata in the wild is
//! loosely typed, so list-valued fields accept a single scalar, a list or
//! nothing at all, and optional lists keep "absent" apart from "empty".

use chrono::{DateTime, Datelike, Utc};
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use url::Url;

use crate::error::{RepoError, Result};

/// API version assumed for chart versions that do not declare one
pub const DEFAULT_CHART_API_VERSION: &str = "v1";

/// Repository index document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    /// API version of the index format
    #[serde(default)]
    pub api_version: String,

    /// When this index was generated
    #[serde(default)]
    pub generated: Option<DateTime<Utc>>,

    /// Chart versions by chart name
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<Option<VersionEntry>>>,
}

/// Parsed index: chart name to its version entries
pub type ChartVersions = BTreeMap<String, Vec<VersionEntry>>;

/// One version of a chart as listed in the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    /// Chart name
    #[serde(default)]
    pub name: String,

    /// Chart version (semver)
    #[serde(default, deserialize_with = "string_or_default")]
    pub version: String,

    /// Creation timestamp
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    /// Description
    #[serde(default, deserialize_with = "string_or_default")]
    pub description: String,

    /// Archive digest
    #[serde(default, deserialize_with = "string_or_default")]
    pub digest: String,

    /// Chart API version
    #[serde(default, deserialize_with = "string_or_default")]
    pub api_version: String,

    /// Application version
    #[serde(default, deserialize_with = "string_or_default")]
    pub app_version: String,

    /// Home URL
    #[serde(default, deserialize_with = "string_or_default")]
    pub home: String,

    /// Icon URL
    #[serde(default, deserialize_with = "string_or_default")]
    pub icon: String,

    /// Search keywords
    #[serde(default, deserialize_with = "one_or_many")]
    pub keywords: Option<Vec<String>>,

    /// Source URLs
    #[serde(default, deserialize_with = "one_or_many")]
    pub sources: Option<Vec<String>>,

    /// Maintainers
    #[serde(default)]
    pub maintainers: Option<Vec<Maintainer>>,

    /// Chart dependencies
    #[serde(default)]
    pub dependencies: Option<Vec<Dependency>>,

    /// Chart type (application or library)
    #[serde(default, rename = "type", deserialize_with = "string_or_default")]
    pub chart_type: String,

    /// Download URLs of the chart archive
    #[serde(default, deserialize_with = "one_or_many")]
    pub urls: Option<Vec<String>>,

    /// Platform versions this chart version supports
    #[serde(default, deserialize_with = "string_or_default")]
    pub kube_version: String,

    /// Deprecated flag
    #[serde(default)]
    pub deprecated: bool,

    /// Annotations
    #[serde(default)]
    pub annotations: Option<HashMap<String, String>>,
}

impl VersionEntry {
    /// Parse version as semver, tolerating a leading `v` and missing components
    pub fn parsed_version(&self) -> Option<Version> {
        parse_version_lenient(&self.version)
    }

    /// Download URLs (empty if none are listed)
    pub fn download_urls(&self) -> &[String] {
        self.urls.as_deref().unwrap_or_default()
    }
}

/// Maintainer of a chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    #[serde(default, deserialize_with = "string_or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub email: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub url: String,
}

/// Dependency declared by a chart version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default, deserialize_with = "string_or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub version: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub repository: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub condition: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "string_or_default")]
    pub alias: String,
}

/// A scalar or a list of scalars
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Option<Scalar>>),
    One(Scalar),
}

/// Scalars that may show up where strings are expected
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::String(s) => s,
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|value| match value {
        OneOrMany::Many(items) => items.into_iter().flatten().map(Scalar::into_string).collect(),
        OneOrMany::One(item) => vec![item.into_string()],
    }))
}

fn string_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_string)
        .unwrap_or_default())
}

impl IndexDocument {
    /// Decode an index document (YAML or JSON)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| RepoError::Parse {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(text)
    }

    /// Decode an index document from a string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let index: IndexDocument = serde_yaml::from_str(yaml).map_err(|e| RepoError::Parse {
            message: e.to_string(),
        })?;

        if index.api_version.trim().is_empty() {
            return Err(RepoError::Parse {
                message: "no API version specified".to_string(),
            });
        }

        Ok(index)
    }

    /// Drop unusable entries and fill in defaults
    pub fn into_chart_versions(self) -> ChartVersions {
        self.entries
            .into_iter()
            .map(|(name, versions)| {
                let versions = versions
                    .into_iter()
                    .flatten()
                    .filter_map(|mut entry| {
                        if entry.version.trim().is_empty() {
                            tracing::warn!(chart = %name, "Skipping index entry without a version");
                            return None;
                        }
                        if entry.api_version.is_empty() {
                            entry.api_version = DEFAULT_CHART_API_VERSION.to_string();
                        }
                        // Zero time means "not set"
                        if entry.created.is_some_and(|t| t.year() <= 1) {
                            entry.created = None;
                        }
                        Some(entry)
                    })
                    .collect();
                (name, versions)
            })
            .collect()
    }
}

/// Decode an index, resolve its download URLs and order its versions
///
/// `index_url` is the normalized URL the bytes were fetched from; relative
/// download URLs are resolved against it.
pub fn parse_index(bytes: &[u8], index_url: &str) -> Result<ChartVersions> {
    let mut charts = IndexDocument::from_bytes(bytes)?.into_chart_versions();

    for (name, versions) in charts.iter_mut() {
        for entry in versions.iter_mut() {
            resolve_entry_urls(name, entry, index_url);
        }
        sort_versions(versions);
    }

    Ok(charts)
}

fn resolve_entry_urls(chart: &str, entry: &mut VersionEntry, index_url: &str) {
    let Some(urls) = entry.urls.as_mut() else {
        return;
    };

    for url in urls.iter_mut() {
        match resolve_reference_url(index_url, url) {
            Ok(resolved) => *url = resolved,
            Err(e) => tracing::warn!(
                chart,
                version = %entry.version,
                url = %url,
                error = %e,
                "Failed to resolve chart URL, leaving it as is"
            ),
        }
    }
}

/// Resolve a possibly relative reference against the index URL
///
/// Absolute references are returned unchanged.
pub fn resolve_reference_url(index_url: &str, reference: &str) -> Result<String> {
    match Url::parse(reference) {
        Ok(_) => Ok(reference.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(index_url).map_err(|e| RepoError::InvalidRepositoryUrl {
                url: index_url.to_string(),
                reason: e.to_string(),
            })?;
            let resolved = base.join(reference).map_err(|e| RepoError::InvalidRepositoryUrl {
                url: reference.to_string(),
                reason: format!("cannot be resolved against {}: {}", index_url, e),
            })?;
            Ok(resolved.to_string())
        }
        Err(e) => Err(RepoError::InvalidRepositoryUrl {
            url: reference.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Sort versions by descending precedence
///
/// Unparsable versions go last; equal versions keep their input order.
pub fn sort_versions(versions: &mut [VersionEntry]) {
    versions.sort_by_cached_key(|entry| std::cmp::Reverse(SortKey(entry.parsed_version())));
}

/// Precedence key: parsable above unparsable, build metadata ignored
#[derive(PartialEq, Eq)]
struct SortKey(Option<Version>);

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => (a.major, a.minor, a.patch, &a.pre)
                .cmp(&(b.major, b.minor, b.patch, &b.pre)),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Parse a version the way chart tooling does
///
/// Accepts a leading `v` and fills in missing minor/patch components
/// (`v1.25` becomes `1.25.0`).
pub fn parse_version_lenient(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('v').unwrap_or(raw);
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }

    // Split off pre-release/build before padding the core
    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, rest) = raw.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    Version::parse(&padded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_URL: &str = "https://example.com/repo/index.yaml";

    fn sample_index() -> &'static str {
        r#"
apiVersion: v1
generated: "2024-01-01T00:00:00Z"
entries:
  nginx:
    - name: nginx
      version: "1.9.0"
      apiVersion: v2
      urls:
        - charts/nginx-1.9.0.tgz
    - name: nginx
      version: "2.0.0"
      apiVersion: v2
      created: "2024-01-01T10:00:00.123456789Z"
      appVersion: 1.25
      urls:
        - https://mirror.example.org/nginx-2.0.0.tgz
      maintainers:
        - name: Jane
          email: jane@example.com
      sources: https://github.com/example/nginx
    - name: nginx
      version: "1.10.0"
      urls: charts/nginx-1.10.0.tgz
      maintainers: []
  redis:
    - name: redis
      version: "17.0.0"
      keywords:
        - cache
      dependencies:
        - name: common
          version: 2.x.x
          repository: https://charts.example.com/common
          tags: infra
          enabled: true
"#
    }

    #[test]
    fn test_parse_and_order() {
        let charts = parse_index(sample_index().as_bytes(), INDEX_URL).unwrap();
        assert_eq!(charts.len(), 2);

        let versions: Vec<_> = charts["nginx"].iter().map(|e| e.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0.0", "1.10.0", "1.9.0"]);
    }

    #[test]
    fn test_relative_urls_resolved() {
        let charts = parse_index(sample_index().as_bytes(), INDEX_URL).unwrap();
        let nginx = &charts["nginx"];

        assert_eq!(
            nginx[0].download_urls(),
            ["https://mirror.example.org/nginx-2.0.0.tgz"]
        );
        assert_eq!(
            nginx[1].download_urls(),
            ["https://example.com/repo/charts/nginx-1.10.0.tgz"]
        );
        assert_eq!(
            nginx[2].download_urls(),
            ["https://example.com/repo/charts/nginx-1.9.0.tgz"]
        );
    }

    #[test]
    fn test_resolve_reference_url() {
        assert_eq!(
            resolve_reference_url(INDEX_URL, "charts/foo-1.0.0.tgz").unwrap(),
            "https://example.com/repo/charts/foo-1.0.0.tgz"
        );
        assert_eq!(
            resolve_reference_url(INDEX_URL, "/other/foo-1.0.0.tgz").unwrap(),
            "https://example.com/other/foo-1.0.0.tgz"
        );
        assert_eq!(
            resolve_reference_url(INDEX_URL, "https://cdn.example.net/foo-1.0.0.tgz").unwrap(),
            "https://cdn.example.net/foo-1.0.0.tgz"
        );
    }

    #[test]
    fn test_resolution_error_names_reference_and_base() {
        let err = resolve_reference_url(INDEX_URL, "//charts.example.com:99999/foo-1.0.0.tgz")
            .unwrap_err();

        match err {
            RepoError::InvalidRepositoryUrl { url, reason } => {
                assert_eq!(url, "//charts.example.com:99999/foo-1.0.0.tgz");
                assert!(reason.contains(INDEX_URL), "reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolvable_url_left_unchanged() {
        let yaml = r#"
apiVersion: v1
entries:
  broken:
    - version: 1.0.0
      urls:
        - "http://[::1"
"#;
        let charts = parse_index(yaml.as_bytes(), INDEX_URL).unwrap();
        assert_eq!(charts["broken"][0].download_urls(), ["http://[::1"]);
    }

    #[test]
    fn test_optional_lists_keep_absence() {
        let charts = parse_index(sample_index().as_bytes(), INDEX_URL).unwrap();
        let nginx = &charts["nginx"];

        // 2.0.0 has maintainers, 1.10.0 an explicit empty list, 1.9.0 none
        assert_eq!(nginx[0].maintainers.as_ref().map(Vec::len), Some(1));
        assert_eq!(nginx[1].maintainers, Some(vec![]));
        assert_eq!(nginx[2].maintainers, None);
    }

    #[test]
    fn test_loose_scalars() {
        let charts = parse_index(sample_index().as_bytes(), INDEX_URL).unwrap();
        let latest = &charts["nginx"][0];
        assert_eq!(latest.app_version, "1.25");
        assert_eq!(
            latest.sources,
            Some(vec!["https://github.com/example/nginx".to_string()])
        );
        assert!(latest.created.is_some());

        let redis = &charts["redis"][0];
        let deps = redis.dependencies.as_ref().unwrap();
        assert_eq!(deps[0].tags, Some(vec!["infra".to_string()]));
        assert!(deps[0].enabled);
    }

    #[test]
    fn test_defaults_filled_in() {
        let charts = parse_index(sample_index().as_bytes(), INDEX_URL).unwrap();
        assert_eq!(charts["redis"][0].api_version, DEFAULT_CHART_API_VERSION);
        assert_eq!(charts["nginx"][0].api_version, "v2");
    }

    #[test]
    fn test_null_and_versionless_entries_skipped() {
        let yaml = r#"
apiVersion: v1
entries:
  odd:
    - null
    - name: odd
    - name: odd
      version: 0.1.0
"#;
        let charts = parse_index(yaml.as_bytes(), INDEX_URL).unwrap();
        assert_eq!(charts["odd"].len(), 1);
        assert_eq!(charts["odd"][0].version, "0.1.0");
    }

    #[test]
    fn test_zero_created_time_is_absent() {
        let yaml = r#"
apiVersion: v1
entries:
  old:
    - version: 1.0.0
      created: "0001-01-01T00:00:00Z"
"#;
        let charts = parse_index(yaml.as_bytes(), INDEX_URL).unwrap();
        assert_eq!(charts["old"][0].created, None);
    }

    #[test]
    fn test_json_index_accepted() {
        let json = r#"{"apiVersion":"v1","entries":{"app":[{"name":"app","version":"1.0.0","urls":["app-1.0.0.tgz"]}]}}"#;
        let charts = parse_index(json.as_bytes(), INDEX_URL).unwrap();
        assert_eq!(
            charts["app"][0].download_urls(),
            ["https://example.com/repo/app-1.0.0.tgz"]
        );
    }

    #[test]
    fn test_malformed_index_rejected() {
        for input in [
            &b"<html><body>Not Found</body></html>"[..],
            b"entries: [unclosed",
            b"",
            b"\xff\xfe\x00",
            b"entries: {}",
        ] {
            let err = parse_index(input, INDEX_URL).unwrap_err();
            assert!(matches!(err, RepoError::Parse { .. }), "input {:?}", input);
        }
    }

    #[test]
    fn test_sort_unparsable_last_and_stable() {
        let mut versions: Vec<VersionEntry> = ["latest", "1.0.0", "main", "1.0.0+build.2", "2.0.0-rc.1", "2.0.0"]
            .iter()
            .enumerate()
            .map(|(i, v)| VersionEntry {
                version: v.to_string(),
                description: i.to_string(),
                ..Default::default()
            })
            .collect();

        sort_versions(&mut versions);

        let order: Vec<_> = versions
            .iter()
            .map(|e| (e.version.as_str(), e.description.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2.0.0", "5"),
                ("2.0.0-rc.1", "4"),
                ("1.0.0", "1"),
                ("1.0.0+build.2", "3"),
                ("latest", "0"),
                ("main", "2"),
            ]
        );
    }

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version_lenient("v1.25.3"), Some(Version::new(1, 25, 3)));
        assert_eq!(parse_version_lenient("1.25"), Some(Version::new(1, 25, 0)));
        assert_eq!(parse_version_lenient("2"), Some(Version::new(2, 0, 0)));
        assert_eq!(
            parse_version_lenient("v1.25.3+k3s1").map(|v| v.build.to_string()),
            Some("k3s1".to_string())
        );
        assert_eq!(
            parse_version_lenient("v1.25-gke.100").map(|v| v.pre.to_string()),
            Some("gke.100".to_string())
        );
        assert_eq!(parse_version_lenient("latest"), None);
        assert_eq!(parse_version_lenient("1..2"), None);
        assert_eq!(parse_version_lenient(""), None);
    }
}
