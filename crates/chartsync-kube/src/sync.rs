//! Repository synchronization passes
//!
//! A pass runs fetch → parse → filter → map → store for one repository,
//! strictly in sequence. Each pass starts `Idle`, is `Running` while it
//! works and ends `Idle` again or `Failed`:
//!
//! ```text
//! Idle ──▶ Running ──▶ Idle
//!   │          └─────▶ Failed
//!   └── disabled ────▶ Idle (nothing contacted)
//! ```
//!
//! Writes are not transactional. When a chart fails to persist, charts
//! handled before it stay committed and the ones after it are not tried.
//! Records of charts that vanished from the index are left in place.

use chartsync_repo::{IndexFetcher, RepoError, RepositoryConfig, SecureClientBuilder, TrustStore};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SyncError};
use crate::mapper::{build_record, map_versions};
use crate::store::{RecordStore, UpsertOutcome, mark_synced, upsert};
use crate::trust::DEFAULT_CONFIG_NAMESPACE;

/// Default time between two passes of a repository (10 minutes)
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Default delay before retrying a failed pass
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(10);

/// Process-wide sync settings, fixed at startup
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Time between successful passes
    pub resync_interval: Duration,
    /// Delay before a failed pass is retried
    pub error_requeue: Duration,
    /// Upper bound for the index request
    pub fetch_timeout: Duration,
    /// Namespace holding CA ConfigMaps and client certificate Secrets
    pub config_namespace: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            error_requeue: DEFAULT_ERROR_REQUEUE,
            fetch_timeout: chartsync_repo::DEFAULT_FETCH_TIMEOUT,
            config_namespace: DEFAULT_CONFIG_NAMESPACE.to_string(),
        }
    }
}

/// State of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    #[default]
    Idle,
    Running,
    Failed,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassState::Idle => write!(f, "idle"),
            PassState::Running => write!(f, "running"),
            PassState::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub repository: String,
    pub state: PassState,
    /// The repository is disabled and was not contacted
    pub skipped: bool,
    /// Charts listed in the index
    pub charts: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Versions dropped by the compatibility filter
    pub excluded_versions: usize,
    /// Timestamp written to the last record
    pub synced_at: Option<DateTime<Utc>>,
}

impl PassReport {
    fn new(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            ..Default::default()
        }
    }

    /// Records processed successfully
    pub fn records(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// A failed pass with whatever it got done
#[derive(Debug, Error)]
#[error("sync of repository '{}' failed: {error}", .report.repository)]
pub struct PassFailure {
    pub report: PassReport,
    #[source]
    pub error: SyncError,
}

impl From<PassFailure> for SyncError {
    fn from(failure: PassFailure) -> Self {
        failure.error
    }
}

/// Result of a pass
pub type PassResult = std::result::Result<PassReport, PassFailure>;

/// Runs sync passes against a record store
pub struct ChartSynchronizer<S, T> {
    store: S,
    trust: T,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
}

impl<S: RecordStore, T: TrustStore> ChartSynchronizer<S, T> {
    /// Create a synchronizer using the wall clock
    pub fn new(store: S, trust: T, settings: SyncSettings) -> Self {
        Self {
            store,
            trust,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Use a different time source for sync timestamps
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one pass for a repository
    ///
    /// `owner` is attached to every record as its controller reference.
    /// An empty `platform_version` keeps every chart version.
    pub async fn run_pass(
        &self,
        repo: &RepositoryConfig,
        owner: Option<&OwnerReference>,
        platform_version: &str,
        cancel: &CancellationToken,
    ) -> PassResult {
        let mut report = PassReport::new(&repo.name);

        if repo.disabled {
            tracing::info!(repository = %repo.name, "Skipping disabled chart repository");
            report.skipped = true;
            return Ok(report);
        }

        report.state = PassState::Running;
        tracing::info!(
            repository = %repo.name,
            url = %repo.url,
            platform_version,
            "Synchronizing chart repository"
        );

        match self.sync(repo, owner, platform_version, cancel, &mut report).await {
            Ok(()) => {
                report.state = PassState::Idle;
                tracing::info!(
                    repository = %repo.name,
                    charts = report.charts,
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    excluded_versions = report.excluded_versions,
                    "Chart repository synchronized"
                );
                Ok(report)
            }
            Err(error) => {
                report.state = PassState::Failed;
                tracing::error!(
                    repository = %repo.name,
                    records = report.records(),
                    error = %error,
                    "Chart repository sync failed"
                );
                Err(PassFailure { report, error })
            }
        }
    }

    async fn sync(
        &self,
        repo: &RepositoryConfig,
        owner: Option<&OwnerReference>,
        platform_version: &str,
        cancel: &CancellationToken,
        report: &mut PassReport,
    ) -> Result<()> {
        let client = SecureClientBuilder::new()
            .timeout(self.settings.fetch_timeout)
            .build_for(repo, &self.trust)
            .await?;

        let charts = IndexFetcher::new(client).fetch_charts(repo, cancel).await?;
        report.charts = charts.len();

        for (chart, entries) in &charts {
            if cancel.is_cancelled() {
                return Err(RepoError::Cancelled.into());
            }

            let mapped = map_versions(entries, platform_version);
            report.excluded_versions += mapped.excluded;

            let record = build_record(repo, owner, chart, mapped.versions);
            let name = record.name_any();

            let outcome = upsert(&self.store, record).await?;
            tracing::debug!(repository = %repo.name, chart = %chart, record = %name, ?outcome, "Upserted chart record");
            match outcome {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }

            let synced = mark_synced(&self.store, &name, self.clock.as_ref()).await?;
            report.synced_at = Some(synced.0);
        }

        Ok(())
    }
}
