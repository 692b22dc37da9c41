//! Index entries to chart records

use chartsync_repo::{RepositoryConfig, VersionEntry, is_compatible_range};
use chrono::SubsecRound;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use std::collections::BTreeMap;

use crate::resources::{
    HelmChart, HelmChartDependency, HelmChartMaintainer, HelmChartSpec, HelmChartVersion,
    REPOSITORY_LABEL, record_name,
};

/// Versions that survived the compatibility filter
#[derive(Debug, Default)]
pub struct MappedVersions {
    pub versions: Vec<HelmChartVersion>,
    pub excluded: usize,
}

/// Filter entries against the platform version and map the survivors
///
/// Input order is kept.
pub fn map_versions(entries: &[VersionEntry], platform_version: &str) -> MappedVersions {
    let mut mapped = MappedVersions::default();
    for entry in entries {
        if is_compatible_range(&entry.kube_version, platform_version) {
            mapped.versions.push(map_entry(entry));
        } else {
            tracing::debug!(
                chart = %entry.name,
                version = %entry.version,
                constraint = %entry.kube_version,
                platform_version,
                "Excluding incompatible chart version"
            );
            mapped.excluded += 1;
        }
    }
    mapped
}

/// Field-for-field copy of an index entry
pub fn map_entry(entry: &VersionEntry) -> HelmChartVersion {
    HelmChartVersion {
        version: entry.version.clone(),
        // Stored timestamps have second precision
        created: entry.created.map(|t| Time(t.trunc_subsecs(0))),
        description: entry.description.clone(),
        digest: entry.digest.clone(),
        api_version: entry.api_version.clone(),
        keywords: entry.keywords.clone().unwrap_or_default(),
        app_version: entry.app_version.clone(),
        home: entry.home.clone(),
        icon: entry.icon.clone(),
        sources: entry.sources.clone(),
        maintainers: entry.maintainers.as_ref().map(|list| {
            list.iter()
                .map(|m| HelmChartMaintainer {
                    name: m.name.clone(),
                    email: m.email.clone(),
                    url: m.url.clone(),
                })
                .collect()
        }),
        dependencies: entry.dependencies.as_ref().map(|list| {
            list.iter()
                .map(|d| HelmChartDependency {
                    name: d.name.clone(),
                    version: d.version.clone(),
                    repository: d.repository.clone(),
                    condition: d.condition.clone(),
                    tags: d.tags.clone().unwrap_or_default(),
                    enabled: d.enabled,
                    alias: d.alias.clone(),
                })
                .collect()
        }),
        chart_type: entry.chart_type.clone(),
        urls: entry.urls.clone().unwrap_or_default(),
        kube_version: entry.kube_version.clone(),
    }
}

/// Build the proposed record for one chart of a repository
pub fn build_record(
    repo: &RepositoryConfig,
    owner: Option<&OwnerReference>,
    chart: &str,
    versions: Vec<HelmChartVersion>,
) -> HelmChart {
    let metadata = ObjectMeta {
        name: Some(record_name(&repo.name, chart)),
        labels: Some(BTreeMap::from([(
            REPOSITORY_LABEL.to_string(),
            repo.name.clone(),
        )])),
        owner_references: owner.map(|o| vec![o.clone()]),
        ..Default::default()
    };

    HelmChart {
        metadata,
        spec: HelmChartSpec {
            name: chart.to_string(),
            versions,
            repository_name: repo.name.clone(),
            repository_display_name: repo.display_name().map(str::to_string),
        },
        status: None,
    }
}
