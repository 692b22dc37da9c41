//! Render command - run one pass against a repository and print the records
//!
//! Nothing is written to a cluster. Records go to an in-memory store and
//! are printed as a multi-document YAML stream.

use chartsync_kube::{ChartSynchronizer, HelmChart, MemoryRecordStore};
use chartsync_repo::{RepositoryConfig, StaticTrustStore};
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::SyncArgs;
use crate::error::{CliError, Result};

/// Run the render command
pub async fn run(
    name: &str,
    url: &str,
    platform_version: &str,
    args: &SyncArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let settings = args.settings(Duration::ZERO);
    let trust = StaticTrustStore::new(settings.config_namespace.clone());
    let store = MemoryRecordStore::new();
    let sync = ChartSynchronizer::new(store.clone(), trust, settings);

    let repo = RepositoryConfig::new(name, url);
    let report = sync.run_pass(&repo, None, platform_version, &cancel).await?;

    tracing::info!(
        charts = report.charts,
        excluded_versions = report.excluded_versions,
        "Rendered chart records"
    );

    let output = to_yaml_stream(&store.records())?;
    std::io::stdout()
        .lock()
        .write_all(output.as_bytes())
        .map_err(CliError::render)?;
    Ok(())
}

/// Serialize records as `---` separated YAML documents
pub fn to_yaml_stream(records: &[HelmChart]) -> Result<String> {
    let mut output = String::new();
    for record in records {
        let doc = serde_yaml::to_string(record).map_err(CliError::render)?;
        output.push_str("---\n");
        output.push_str(&doc);
    }
    Ok(output)
}
