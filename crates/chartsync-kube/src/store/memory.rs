//! In-memory record store
//!
//! Keeps records in a map, counts operations and can be told to fail
//! specific writes. Used by tests and by offline runs.

use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::RecordStore;
use crate::error::{Result, SyncError};
use crate::resources::{HelmChart, HelmChartStatus};

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Create,
    UpdateSpec,
    UpdateStatus,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub creates: usize,
    pub spec_updates: usize,
    pub status_updates: usize,
}

impl OperationCounts {
    /// Total number of writes
    pub fn writes(&self) -> usize {
        self.creates + self.spec_updates + self.status_updates
    }
}

#[derive(Default)]
struct State {
    records: BTreeMap<String, HelmChart>,
    operations: OperationCounts,
    failures: HashSet<(StoreOp, String)>,
    revision: u64,
}

/// In-memory record store
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated records
    pub fn with_records(records: Vec<HelmChart>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for record in records {
                state.records.insert(record.name_any(), record);
            }
        }
        store
    }

    /// Make every future `op` on the named record fail
    pub fn fail_on(&self, op: StoreOp, name: &str) {
        self.lock().failures.insert((op, name.to_string()));
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.lock().operations.clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        self.lock().operations = OperationCounts::default();
    }

    /// Get a stored record
    pub fn record(&self, name: &str) -> Option<HelmChart> {
        self.lock().records.get(name).cloned()
    }

    /// All stored records, ordered by name
    pub fn records(&self) -> Vec<HelmChart> {
        self.lock().records.values().cloned().collect()
    }

    /// Count stored records
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn check(&self, op: StoreOp, name: &str) -> Result<()> {
        if self.failures.contains(&(op, name.to_string())) {
            return Err(SyncError::persistence(
                name,
                format!("injected {:?} failure", op),
            ));
        }
        Ok(())
    }

    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    fn existing(&self, name: &str) -> Result<&HelmChart> {
        self.records
            .get(name)
            .ok_or_else(|| SyncError::persistence(name, "record not found"))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, name: &str) -> Result<Option<HelmChart>> {
        let mut state = self.lock();
        state.operations.gets += 1;
        state.check(StoreOp::Get, name)?;
        Ok(state.records.get(name).cloned())
    }

    async fn create(&self, record: &HelmChart) -> Result<HelmChart> {
        let name = record.name_any();
        let mut state = self.lock();
        state.operations.creates += 1;
        state.check(StoreOp::Create, &name)?;

        if state.records.contains_key(&name) {
            return Err(SyncError::persistence(name, "record already exists"));
        }

        let mut stored = record.clone();
        stored.metadata.resource_version = Some(state.next_revision());
        state.records.insert(name, stored.clone());
        Ok(stored)
    }

    async fn update_spec(&self, record: &HelmChart) -> Result<HelmChart> {
        let name = record.name_any();
        let mut state = self.lock();
        state.operations.spec_updates += 1;
        state.check(StoreOp::UpdateSpec, &name)?;

        // Status is only written through update_status
        let status = state.existing(&name)?.status.clone();
        let mut stored = record.clone();
        stored.status = status;
        stored.metadata.resource_version = Some(state.next_revision());
        state.records.insert(name, stored.clone());
        Ok(stored)
    }

    async fn update_status(&self, name: &str, status: &HelmChartStatus) -> Result<HelmChart> {
        let mut state = self.lock();
        state.operations.status_updates += 1;
        state.check(StoreOp::UpdateStatus, name)?;

        let mut stored = state.existing(name)?.clone();
        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(state.next_revision());
        state.records.insert(name.to_string(), stored.clone());
        Ok(stored)
    }
}
