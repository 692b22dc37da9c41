//! Repository controller
//!
//! Watches `HelmChartRepository` resources and runs one pass per reconcile.
//! Successful passes requeue after the resync interval, failed ones after
//! the fixed error delay.

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, Resource, ResourceExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use chartsync_repo::RepositoryConfig;

use crate::error::{Result, SyncError};
use crate::resources::HelmChartRepository;
use crate::store::KubeRecordStore;
use crate::sync::{ChartSynchronizer, SyncSettings};
use crate::trust::KubeTrustStore;

/// Shared state of the reconciler
pub struct Context {
    client: Client,
    synchronizer: ChartSynchronizer<KubeRecordStore, KubeTrustStore>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new(client: Client, settings: SyncSettings, cancel: CancellationToken) -> Self {
        let store = KubeRecordStore::new(client.clone());
        let trust = KubeTrustStore::new(client.clone(), settings.config_namespace.clone());
        Self {
            client,
            synchronizer: ChartSynchronizer::new(store, trust, settings),
            cancel,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        self.synchronizer.settings()
    }
}

/// Run one pass for a repository resource
pub async fn reconcile(repo: Arc<HelmChartRepository>, ctx: Arc<Context>) -> Result<Action> {
    let config = RepositoryConfig::from(repo.as_ref());
    if config.name.is_empty() {
        return Err(SyncError::InvalidResource(
            "HelmChartRepository has no name".to_string(),
        ));
    }

    let interval = ctx.settings().resync_interval;
    if config.disabled {
        // No version lookup for disabled repositories
        ctx.synchronizer
            .run_pass(&config, None, "", &ctx.cancel)
            .await?;
        return Ok(Action::requeue(interval));
    }

    let platform_version = platform_version(&ctx.client).await;
    let owner = repo.controller_owner_ref(&());

    ctx.synchronizer
        .run_pass(&config, owner.as_ref(), &platform_version, &ctx.cancel)
        .await?;

    Ok(Action::requeue(interval))
}

/// Retry failed passes after a fixed delay
pub fn error_policy(repo: Arc<HelmChartRepository>, error: &SyncError, ctx: Arc<Context>) -> Action {
    let delay = ctx.settings().error_requeue;
    tracing::warn!(
        repository = %repo.name_any(),
        error = %error,
        retry_in = ?delay,
        "Reconcile failed"
    );
    Action::requeue(delay)
}

/// Version of the API server, or an empty string when it cannot be read
pub async fn platform_version(client: &Client) -> String {
    match client.apiserver_version().await {
        Ok(info) => info.git_version,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read platform version, not filtering chart versions");
            String::new()
        }
    }
}

/// Run the controller until the token is cancelled
pub async fn run(client: Client, settings: SyncSettings, cancel: CancellationToken) -> Result<()> {
    let repos: Api<HelmChartRepository> = Api::all(client.clone());

    // Fail early when the resource type is not installed
    repos
        .list(&kube::api::ListParams::default().limit(1))
        .await?;

    tracing::info!(
        resync_interval = ?settings.resync_interval,
        error_requeue = ?settings.error_requeue,
        fetch_timeout = ?settings.fetch_timeout,
        config_namespace = %settings.config_namespace,
        "Starting chart repository controller"
    );

    let ctx = Arc::new(Context::new(client, settings, cancel.clone()));

    Controller::new(repos, watcher::Config::default())
        .graceful_shutdown_on(cancel.cancelled_owned())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => tracing::debug!(repository = %obj.name, "Reconciled"),
                Err(e) => tracing::debug!(error = %e, "Reconcile finished with error"),
            }
        })
        .await;

    tracing::info!("Chart repository controller stopped");
    Ok(())
}
