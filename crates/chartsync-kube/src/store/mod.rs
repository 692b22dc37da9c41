//! Record persistence
//!
//! Two backends implement [`RecordStore`]:
//! - **Kubernetes**: records are `HelmChart` custom resources
//! - **Memory**: records live in a map, for tests and offline runs
//!
//! [`upsert`] and [`mark_synced`] build the idempotent write sequence of a
//! pass on top of the four primitive operations.

mod kubernetes;
mod memory;

pub use kubernetes::KubeRecordStore;
pub use memory::{MemoryRecordStore, OperationCounts, StoreOp};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use crate::clock::Clock;
use crate::error::Result;
use crate::resources::{HelmChart, HelmChartStatus};

/// Storage backend for chart records
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record by name
    async fn get(&self, name: &str) -> Result<Option<HelmChart>>;

    /// Create a new record
    async fn create(&self, record: &HelmChart) -> Result<HelmChart>;

    /// Replace the spec and metadata of an existing record
    async fn update_spec(&self, record: &HelmChart) -> Result<HelmChart>;

    /// Write the status of an existing record
    async fn update_status(&self, name: &str, status: &HelmChartStatus) -> Result<HelmChart>;
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Create the record or bring an existing one in line with it
///
/// Only the spec, the repository label and the owner reference are owned by
/// synchronization. Other labels, annotations and owner references on the
/// stored record are left alone. Nothing is written when the stored record
/// already matches.
pub async fn upsert<S: RecordStore + ?Sized>(store: &S, proposed: HelmChart) -> Result<UpsertOutcome> {
    let name = proposed.name_any();

    let Some(existing) = store.get(&name).await? else {
        store.create(&proposed).await?;
        return Ok(UpsertOutcome::Created);
    };

    let merged = merge_record(&existing, proposed);
    if merged == existing {
        return Ok(UpsertOutcome::Unchanged);
    }

    store.update_spec(&merged).await?;
    Ok(UpsertOutcome::Updated)
}

/// Stamp the record with the current time
pub async fn mark_synced<S: RecordStore + ?Sized>(
    store: &S,
    name: &str,
    clock: &dyn Clock,
) -> Result<Time> {
    let now = Time(clock.now());
    let status = HelmChartStatus {
        last_update_timestamp: Some(now.clone()),
    };
    store.update_status(name, &status).await?;
    Ok(now)
}

/// Apply the sync-owned parts of `proposed` onto `existing`
fn merge_record(existing: &HelmChart, proposed: HelmChart) -> HelmChart {
    let mut merged = existing.clone();
    merged.spec = proposed.spec;

    if let Some(labels) = proposed.metadata.labels {
        merged.labels_mut().extend(labels);
    }

    for owner in proposed.metadata.owner_references.unwrap_or_default() {
        let refs = merged.owner_references_mut();
        if !refs.iter().any(|r| r.uid == owner.uid) {
            refs.push(owner);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::resources::{HelmChartSpec, HelmChartVersion, REPOSITORY_LABEL};
    use chrono::{TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use std::collections::BTreeMap;

    fn proposed(versions: &[&str]) -> HelmChart {
        let mut record = HelmChart::new(
            "stable.nginx",
            HelmChartSpec {
                name: "nginx".to_string(),
                versions: versions
                    .iter()
                    .map(|v| HelmChartVersion {
                        version: v.to_string(),
                        api_version: "v2".to_string(),
                        ..Default::default()
                    })
                    .collect(),
                repository_name: "stable".to_string(),
                repository_display_name: None,
            },
        );
        record
            .labels_mut()
            .insert(REPOSITORY_LABEL.to_string(), "stable".to_string());
        record
    }

    #[tokio::test]
    async fn test_upsert_creates_then_is_idempotent() {
        let store = MemoryRecordStore::new();

        assert_eq!(upsert(&store, proposed(&["1.0.0"])).await.unwrap(), UpsertOutcome::Created);
        assert_eq!(upsert(&store, proposed(&["1.0.0"])).await.unwrap(), UpsertOutcome::Unchanged);

        let counts = store.operation_counts();
        assert_eq!(counts.creates, 1);
        assert_eq!(counts.spec_updates, 0);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_updates_changed_spec() {
        let store = MemoryRecordStore::new();
        upsert(&store, proposed(&["1.0.0"])).await.unwrap();

        let outcome = upsert(&store, proposed(&["1.1.0", "1.0.0"])).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let stored = store.record("stable.nginx").unwrap();
        assert_eq!(stored.spec.versions.len(), 2);
        assert_eq!(store.operation_counts().spec_updates, 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_foreign_metadata() {
        let mut existing = proposed(&["0.1.0"]);
        existing
            .labels_mut()
            .insert("team".to_string(), "web".to_string());
        existing
            .annotations_mut()
            .insert("note".to_string(), "keep me".to_string());
        existing.owner_references_mut().push(OwnerReference {
            uid: "foreign".to_string(),
            ..Default::default()
        });
        let store = MemoryRecordStore::with_records(vec![existing]);

        let mut next = proposed(&["1.0.0"]);
        next.owner_references_mut().push(OwnerReference {
            uid: "repo-uid".to_string(),
            controller: Some(true),
            ..Default::default()
        });
        upsert(&store, next).await.unwrap();

        let stored = store.record("stable.nginx").unwrap();
        assert_eq!(stored.spec.versions[0].version, "1.0.0");
        assert_eq!(
            stored.labels(),
            &BTreeMap::from([
                (REPOSITORY_LABEL.to_string(), "stable".to_string()),
                ("team".to_string(), "web".to_string()),
            ])
        );
        assert_eq!(stored.annotations()["note"], "keep me");
        let uids: Vec<_> = stored.owner_references().iter().map(|r| r.uid.as_str()).collect();
        assert_eq!(uids, vec!["foreign", "repo-uid"]);
    }

    #[tokio::test]
    async fn test_upsert_does_not_touch_status() {
        let store = MemoryRecordStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        upsert(&store, proposed(&["1.0.0"])).await.unwrap();
        mark_synced(&store, "stable.nginx", &clock).await.unwrap();
        upsert(&store, proposed(&["2.0.0"])).await.unwrap();

        let stored = store.record("stable.nginx").unwrap();
        assert_eq!(
            stored.status.unwrap().last_update_timestamp,
            Some(Time(clock.now()))
        );
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let store = MemoryRecordStore::new();
        store.fail_on(StoreOp::Create, "stable.nginx");

        let err = upsert(&store, proposed(&["1.0.0"])).await.unwrap_err();
        assert!(matches!(err, crate::SyncError::Persistence { .. }));
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_mark_synced_failure_leaves_spec() {
        let store = MemoryRecordStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        store.fail_on(StoreOp::UpdateStatus, "stable.nginx");

        upsert(&store, proposed(&["1.0.0"])).await.unwrap();
        assert!(mark_synced(&store, "stable.nginx", &clock).await.is_err());

        let stored = store.record("stable.nginx").unwrap();
        assert_eq!(stored.spec.versions.len(), 1);
        assert!(stored.status.is_none());
    }
}
