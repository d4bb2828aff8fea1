use serde::{Deserialize, Serialize};
use thiserror::Error;

use hooksink_core::{Destination, InsertId, OutputRow, ProjectId};

/// Fully-qualified dataset reference (`project.dataset`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub project_id: ProjectId,
    pub dataset_id: String,
}

impl core::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.project_id, self.dataset_id)
    }
}

/// Fully-qualified base table reference (`project.dataset.table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: ProjectId,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn dataset(&self) -> DatasetRef {
        DatasetRef {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
        }
    }
}

impl core::fmt::Display for TableRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

impl From<&Destination> for DatasetRef {
    fn from(value: &Destination) -> Self {
        Self {
            project_id: value.project_id().clone(),
            dataset_id: value.dataset().to_string(),
        }
    }
}

impl From<&Destination> for TableRef {
    fn from(value: &Destination) -> Self {
        Self {
            project_id: value.project_id().clone(),
            dataset_id: value.dataset().to_string(),
            table_id: value.table().to_string(),
        }
    }
}

/// One row handed to the store, with the id the store may use to drop retried duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRow {
    pub insert_id: InsertId,
    pub json: OutputRow,
}

impl InsertRow {
    pub fn new(json: OutputRow) -> Self {
        Self {
            insert_id: InsertId::new(),
            json,
        }
    }
}

/// A single rejection reported by the store for one row of an insert request.
///
/// `index` is the row's position inside the request that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInsertError {
    pub index: usize,
    pub reason: String,
    pub message: String,
}

impl core::fmt::Display for RowInsertError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "row {}: {} ({})", self.index, self.message, self.reason)
    }
}

/// Result of an insert call that reached the store. An empty error list means every row landed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertResponse {
    pub errors: Vec<RowInsertError>,
}

impl InsertResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Analytics store operation error.
///
/// These are **infrastructure errors** (transport, authorization, API rejections).
/// `AlreadyExists` is the signal the provisioner turns into a successful outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The store (or its token endpoint) rejected the tenant identity itself.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("store api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Tenant-scoped handle to the analytics store.
///
/// A handle is bound to exactly one tenant identity at construction time and is never
/// shared between ingestion calls. Calls block until the store answers (or the
/// client's own timeouts fire).
pub trait AnalyticsStore: Send + Sync {
    /// Project this handle is authorized for.
    fn project_id(&self) -> &ProjectId;

    fn dataset_exists(&self, dataset: &DatasetRef) -> Result<bool, StoreError>;

    /// Create a dataset with default options. Fails with `AlreadyExists` if it is there.
    fn create_dataset(&self, dataset: &DatasetRef) -> Result<(), StoreError>;

    fn table_exists(&self, table: &TableRef) -> Result<bool, StoreError>;

    /// Create a standard (non-partitioned) table. Fails with `AlreadyExists` if it is there.
    fn create_table(
        &self,
        table: &TableRef,
        schema: &hooksink_core::TableSchema,
    ) -> Result<(), StoreError>;

    /// Stream rows into the shard `table + template_suffix`, created from the base table
    /// on first use. Per-row rejections come back in the response, not as `Err`.
    fn insert_rows(
        &self,
        table: &TableRef,
        template_suffix: &str,
        rows: &[InsertRow],
    ) -> Result<InsertResponse, StoreError>;
}
