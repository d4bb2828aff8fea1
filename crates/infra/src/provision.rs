//! Idempotent provisioning of the tenant dataset and base table.
//!
//! Several workers may race to create the same dataset/table; whoever loses gets an
//! "already exists" answer, which is reported as [`ProvisionOutcome::AlreadyExisted`].

use std::collections::HashSet;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use hooksink_core::{DateShard, Destination, ProjectId, TableSchema};

use crate::store::{AnalyticsStore, DatasetRef, StoreError, TableRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    AlreadyExisted,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport {
    pub dataset: ProvisionOutcome,
    pub table: ProvisionOutcome,
}

impl ProvisionReport {
    pub fn already_provisioned() -> Self {
        Self {
            dataset: ProvisionOutcome::AlreadyExisted,
            table: ProvisionOutcome::AlreadyExisted,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("failed to provision dataset {dataset}: {source}")]
    Dataset {
        dataset: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to provision table {table}: {source}")]
    Table {
        table: String,
        #[source]
        source: StoreError,
    },
}

impl ProvisionError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            ProvisionError::Dataset { source, .. } | ProvisionError::Table { source, .. } => source,
        }
    }

    /// The store refused the tenant identity rather than the operation.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.store_error(), StoreError::Unauthorized(_))
    }
}

/// Bounded wait for a freshly created table to become visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPoll {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for VisibilityPoll {
    fn default() -> Self {
        Self {
            attempts: 15,
            interval: Duration::from_millis(5),
        }
    }
}

/// Destinations known to be provisioned, keyed by tenant and date shard.
#[derive(Debug, Default)]
pub struct ProvisionCache {
    ready: Mutex<HashSet<(ProjectId, DateShard)>>,
}

impl ProvisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, destination: &Destination) -> bool {
        self.ready
            .lock()
            .map(|r| r.contains(&key(destination)))
            .unwrap_or(false)
    }

    pub fn mark_ready(&self, destination: &Destination) {
        if let Ok(mut ready) = self.ready.lock() {
            ready.insert(key(destination));
        }
    }

    pub fn len(&self) -> usize {
        self.ready.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(destination: &Destination) -> (ProjectId, DateShard) {
    (destination.project_id().clone(), destination.shard().clone())
}

#[derive(Debug)]
pub struct SchemaProvisioner {
    schema: TableSchema,
    poll: VisibilityPoll,
    cache: Option<ProvisionCache>,
}

impl Default for SchemaProvisioner {
    fn default() -> Self {
        Self::new(VisibilityPoll::default())
    }
}

impl SchemaProvisioner {
    pub fn new(poll: VisibilityPoll) -> Self {
        Self {
            schema: TableSchema::resolve_versions(),
            poll,
            cache: None,
        }
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = Some(ProvisionCache::new());
        self
    }

    pub fn poll(&self) -> VisibilityPoll {
        self.poll
    }

    pub fn cache(&self) -> Option<&ProvisionCache> {
        self.cache.as_ref()
    }

    /// Make sure the destination's dataset and base table exist.
    pub fn ensure<S>(&self, store: &S, destination: &Destination) -> Result<ProvisionReport, ProvisionError>
    where
        S: AnalyticsStore + ?Sized,
    {
        if self.cache.as_ref().is_some_and(|c| c.contains(destination)) {
            debug!(destination = %destination, "destination already provisioned (cached)");
            return Ok(ProvisionReport::already_provisioned());
        }

        let dataset = DatasetRef::from(destination);
        let table = TableRef::from(destination);

        let report = ProvisionReport {
            dataset: self.ensure_dataset(store, &dataset)?,
            table: self.ensure_table(store, &table)?,
        };

        if let Some(cache) = &self.cache {
            cache.mark_ready(destination);
        }
        Ok(report)
    }

    fn ensure_dataset<S>(&self, store: &S, dataset: &DatasetRef) -> Result<ProvisionOutcome, ProvisionError>
    where
        S: AnalyticsStore + ?Sized,
    {
        let fail = |source| ProvisionError::Dataset {
            dataset: dataset.to_string(),
            source,
        };

        if store.dataset_exists(dataset).map_err(fail)? {
            return Ok(ProvisionOutcome::AlreadyExisted);
        }

        match store.create_dataset(dataset) {
            Ok(()) => {
                info!(dataset = %dataset, "created dataset");
                Ok(ProvisionOutcome::Created)
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!(dataset = %dataset, "dataset created concurrently");
                Ok(ProvisionOutcome::AlreadyExisted)
            }
            Err(err) => Err(fail(err)),
        }
    }

    fn ensure_table<S>(&self, store: &S, table: &TableRef) -> Result<ProvisionOutcome, ProvisionError>
    where
        S: AnalyticsStore + ?Sized,
    {
        let fail = |source| ProvisionError::Table {
            table: table.to_string(),
            source,
        };

        if store.table_exists(table).map_err(fail)? {
            return Ok(ProvisionOutcome::AlreadyExisted);
        }

        match store.create_table(table, &self.schema) {
            Ok(()) => {
                info!(table = %table, "created table");
                self.await_visibility(store, table);
                Ok(ProvisionOutcome::Created)
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!(table = %table, "table created concurrently");
                Ok(ProvisionOutcome::AlreadyExisted)
            }
            Err(err) => Err(fail(err)),
        }
    }

    /// Poll until the new table answers existence checks. Gives up quietly after the bound.
    fn await_visibility<S>(&self, store: &S, table: &TableRef)
    where
        S: AnalyticsStore + ?Sized,
    {
        for attempt in 1..=self.poll.attempts {
            match store.table_exists(table) {
                Ok(true) => {
                    debug!(table = %table, attempt, "table visible");
                    return;
                }
                Ok(false) => {}
                Err(err) => debug!(table = %table, attempt, error = %err, "visibility check failed"),
            }
            thread::sleep(self.poll.interval);
        }
        warn!(table = %table, attempts = self.poll.attempts, "table not yet visible, continuing");
    }
}
