//! chartsync Kube - cluster side of chart repository synchronization
//!
//! This crate provides:
//! - **Resources**: `HelmChartRepository` (watched) and `HelmChart` (one record per chart)
//! - **Mapping**: platform compatibility filtering and index entry to record conversion
//! - **Record stores**: Kubernetes and in-memory backends behind one trait, with idempotent upserts
//! - **Trust lookups**: CA bundles and client certificates from ConfigMaps and Secrets
//! - **Sync passes**: the sequential fetch → parse → filter → map → store pass
//! - **Controller**: kube-runtime wiring with fixed resync and error requeue delays

pub mod clock;
pub mod controller;
pub mod error;
pub mod mapper;
pub mod resources;
pub mod store;
pub mod sync;
pub mod trust;

pub use clock::{Clock, FixedClock, SystemClock};
pub use controller::{Context, error_policy, platform_version, reconcile};
pub use error::{Result, SyncError};
pub use mapper::{MappedVersions, build_record, map_entry, map_versions};
pub use resources::{
    ConnectionConfig, HelmChart, HelmChartDependency, HelmChartMaintainer, HelmChartRepository,
    HelmChartRepositorySpec, HelmChartSpec, HelmChartStatus, HelmChartVersion, NameReference,
    REPOSITORY_LABEL, record_name,
};
pub use store::{
    KubeRecordStore, MemoryRecordStore, OperationCounts, RecordStore, StoreOp, UpsertOutcome,
    mark_synced, upsert,
};
pub use sync::{
    ChartSynchronizer, DEFAULT_ERROR_REQUEUE, DEFAULT_RESYNC_INTERVAL, PassFailure, PassReport,
    PassResult, PassState, SyncSettings,
};
pub use trust::{DEFAULT_CONFIG_NAMESPACE, KubeTrustStore};
