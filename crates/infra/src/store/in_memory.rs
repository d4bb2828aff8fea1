use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use hooksink_core::{ProjectId, TableSchema};

use super::r#trait::{
    AnalyticsStore, DatasetRef, InsertResponse, InsertRow, RowInsertError, StoreError, TableRef,
};
use crate::credentials::{CredentialError, ServiceAccountCredentials, StoreFactory};

/// One call observed by the in-memory backend, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    DatasetExists(DatasetRef),
    CreateDataset(DatasetRef),
    TableExists(TableRef),
    CreateTable(TableRef),
    InsertRows {
        table: TableRef,
        template_suffix: String,
        rows: Vec<InsertRow>,
    },
}

/// Failure modes the backend can be told to simulate.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Returned by every `create_dataset` call.
    pub create_dataset: Option<StoreError>,
    /// Returned by every `create_table` call.
    pub create_table: Option<StoreError>,
    /// Another worker creates the dataset/table between our existence check and our
    /// create call, so the create is answered with `AlreadyExists`.
    pub concurrent_creator: bool,
    /// Number of `table_exists` checks that still miss after a table is created.
    pub table_visibility_lag: u32,
    /// Rows whose package reference is listed here are rejected per-row.
    pub reject_package_refs: HashSet<String>,
    /// Insert calls carrying one of these package references fail at the transport level.
    pub drop_package_refs: HashSet<String>,
    /// Client emails whose identity the store refuses on every call.
    pub revoked_identities: HashSet<String>,
}

#[derive(Debug, Default)]
struct BackendState {
    datasets: HashSet<DatasetRef>,
    tables: HashMap<TableRef, TableSchema>,
    invisible_checks: HashMap<TableRef, u32>,
    rows: HashMap<(TableRef, String), Vec<InsertRow>>,
    calls: Vec<StoreCall>,
}

/// In-memory stand-in for the analytics service shared by every tenant.
///
/// Intended for tests/dev. Handles opened through [`InMemoryStoreFactory`] are
/// independent values; only this backend (the "remote service") is shared.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    faults: Mutex<Faults>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            faults: Mutex::new(faults),
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        if let Ok(mut f) = self.faults.lock() {
            *f = faults;
        }
    }

    /// Pre-create a dataset and base table, as if an earlier message had provisioned them.
    pub fn seed_table(&self, table: &TableRef, schema: TableSchema) {
        if let Ok(mut state) = self.state.lock() {
            state.datasets.insert(table.dataset());
            state.tables.insert(table.clone(), schema);
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    /// Insert calls only, in order.
    pub fn insert_calls(&self) -> Vec<(String, Vec<InsertRow>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::InsertRows {
                    template_suffix,
                    rows,
                    ..
                } => Some((template_suffix, rows)),
                _ => None,
            })
            .collect()
    }

    pub fn count_calls(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn table_schema(&self, table: &TableRef) -> Option<TableSchema> {
        self.state.lock().ok()?.tables.get(table).cloned()
    }

    pub fn has_dataset(&self, dataset: &DatasetRef) -> bool {
        self.state
            .lock()
            .map(|s| s.datasets.contains(dataset))
            .unwrap_or(false)
    }

    /// Rows that landed in the shard `table + suffix`.
    pub fn rows(&self, table: &TableRef, suffix: &str) -> Vec<InsertRow> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.rows.get(&(table.clone(), suffix.to_string())).cloned())
            .unwrap_or_default()
    }

    fn faults(&self) -> Faults {
        self.faults.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, BackendState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Transport("lock poisoned".to_string()))
    }
}

/// Tenant-scoped handle onto an [`InMemoryBackend`].
#[derive(Debug)]
pub struct InMemoryStore {
    project_id: ProjectId,
    client_email: String,
    backend: Arc<InMemoryBackend>,
}

impl InMemoryStore {
    fn authorize(&self, faults: &Faults) -> Result<(), StoreError> {
        if faults.revoked_identities.contains(&self.client_email) {
            return Err(StoreError::Unauthorized(format!(
                "identity {} is not authorized",
                self.client_email
            )));
        }
        Ok(())
    }
}

impl AnalyticsStore for InMemoryStore {
    fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    fn dataset_exists(&self, dataset: &DatasetRef) -> Result<bool, StoreError> {
        let faults = self.backend.faults();
        self.authorize(&faults)?;
        let mut state = self.backend.state()?;
        state.calls.push(StoreCall::DatasetExists(dataset.clone()));
        Ok(state.datasets.contains(dataset))
    }

    fn create_dataset(&self, dataset: &DatasetRef) -> Result<(), StoreError> {
        let faults = self.backend.faults();
        self.authorize(&faults)?;
        let mut state = self.backend.state()?;
        state.calls.push(StoreCall::CreateDataset(dataset.clone()));

        if let Some(err) = faults.create_dataset {
            return Err(err);
        }
        if faults.concurrent_creator {
            state.datasets.insert(dataset.clone());
            return Err(StoreError::AlreadyExists(dataset.to_string()));
        }
        if !state.datasets.insert(dataset.clone()) {
            return Err(StoreError::AlreadyExists(dataset.to_string()));
        }
        Ok(())
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool, StoreError> {
        let faults = self.backend.faults();
        self.authorize(&faults)?;
        let mut state = self.backend.state()?;
        state.calls.push(StoreCall::TableExists(table.clone()));

        if let Some(remaining) = state.invisible_checks.get_mut(table) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }
        Ok(state.tables.contains_key(table))
    }

    fn create_table(&self, table: &TableRef, schema: &TableSchema) -> Result<(), StoreError> {
        let faults = self.backend.faults();
        self.authorize(&faults)?;
        let mut state = self.backend.state()?;
        state.calls.push(StoreCall::CreateTable(table.clone()));

        if let Some(err) = faults.create_table {
            return Err(err);
        }
        if !state.datasets.contains(&table.dataset()) {
            return Err(StoreError::NotFound(table.dataset().to_string()));
        }
        if faults.concurrent_creator {
            state.tables.insert(table.clone(), schema.clone());
            return Err(StoreError::AlreadyExists(table.to_string()));
        }
        if state.tables.contains_key(table) {
            return Err(StoreError::AlreadyExists(table.to_string()));
        }

        state.tables.insert(table.clone(), schema.clone());
        if faults.table_visibility_lag > 0 {
            state
                .invisible_checks
                .insert(table.clone(), faults.table_visibility_lag);
        }
        Ok(())
    }

    fn insert_rows(
        &self,
        table: &TableRef,
        template_suffix: &str,
        rows: &[InsertRow],
    ) -> Result<InsertResponse, StoreError> {
        let faults = self.backend.faults();
        self.authorize(&faults)?;
        let mut state = self.backend.state()?;
        state.calls.push(StoreCall::InsertRows {
            table: table.clone(),
            template_suffix: template_suffix.to_string(),
            rows: rows.to_vec(),
        });

        if rows
            .iter()
            .any(|r| faults.drop_package_refs.contains(&r.json.packages.reference))
        {
            return Err(StoreError::Transport("connection reset by peer".to_string()));
        }
        if !state.tables.contains_key(table) {
            return Err(StoreError::NotFound(table.to_string()));
        }

        let mut response = InsertResponse::default();
        let key = (table.clone(), template_suffix.to_string());
        for (index, row) in rows.iter().enumerate() {
            if faults.reject_package_refs.contains(&row.json.packages.reference) {
                response.errors.push(RowInsertError {
                    index,
                    reason: "invalid".to_string(),
                    message: format!("rejected package {}", row.json.packages.reference),
                });
                continue;
            }
            state.rows.entry(key.clone()).or_default().push(row.clone());
        }

        Ok(response)
    }
}

/// Opens [`InMemoryStore`] handles against one shared backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreFactory {
    backend: Arc<InMemoryBackend>,
}

impl InMemoryStoreFactory {
    pub fn new(backend: Arc<InMemoryBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<InMemoryBackend> {
        &self.backend
    }
}

impl StoreFactory for InMemoryStoreFactory {
    type Store = InMemoryStore;

    fn open(&self, credentials: ServiceAccountCredentials) -> Result<Self::Store, CredentialError> {
        Ok(InMemoryStore {
            project_id: credentials.project_id().clone(),
            client_email: credentials.client_email().to_string(),
            backend: self.backend.clone(),
        })
    }
}
