//! Kubernetes record store
//!
//! Records are cluster-scoped `HelmChart` resources. Spec writes replace the
//! whole object (guarded by its resourceVersion); status is merge-patched
//! through the status subresource.

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::json;

use super::RecordStore;
use crate::error::{Result, SyncError};
use crate::resources::{HelmChart, HelmChartStatus};

/// Field manager used for status patches
const FIELD_MANAGER: &str = "chartsync";

/// Record store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeRecordStore {
    api: Api<HelmChart>,
}

impl KubeRecordStore {
    /// Create with an existing client
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl RecordStore for KubeRecordStore {
    async fn get(&self, name: &str) -> Result<Option<HelmChart>> {
        self.api
            .get_opt(name)
            .await
            .map_err(|e| SyncError::persistence(name, e))
    }

    async fn create(&self, record: &HelmChart) -> Result<HelmChart> {
        let name = record.name_any();
        tracing::debug!(record = %name, "Creating chart record");
        self.api
            .create(&PostParams::default(), record)
            .await
            .map_err(|e| SyncError::persistence(name, e))
    }

    async fn update_spec(&self, record: &HelmChart) -> Result<HelmChart> {
        let name = record.name_any();
        tracing::debug!(record = %name, "Updating chart record");
        self.api
            .replace(&name, &PostParams::default(), record)
            .await
            .map_err(|e| SyncError::persistence(name, e))
    }

    async fn update_status(&self, name: &str, status: &HelmChartStatus) -> Result<HelmChart> {
        let patch = json!({ "status": status });
        self.api
            .patch_status(name, &status_patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| SyncError::persistence(name, e))
    }
}

/// Params for a plain merge patch, not a server-side apply
fn status_patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}
