//! Ingestion client: one inbound message in, one row per reported package out.
//!
//! Flow for a message:
//! 1. normalize to the canonical event hook
//! 2. resolve the hook's tenant secret into a fresh store handle
//! 3. compute today's destination and make sure it is provisioned
//! 4. insert each package as its own single-row request, in package order
//!
//! Steps 2 and 3 abort the message. Failures in step 4 are recorded per row and
//! never stop the remaining inserts.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use hooksink_core::{Destination, OutputRow, ProjectId};
use hooksink_events::InboundMessage;

use crate::credentials::{CredentialError, CredentialResolver, StoreFactory};
use crate::provision::{ProvisionError, ProvisionReport, SchemaProvisioner};
use crate::store::{AnalyticsStore, InsertRow, RowInsertError, StoreError, TableRef};

/// Source of ingestion timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Why one row did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFailureCause {
    /// The store answered and rejected the row.
    Rejected(RowInsertError),
    /// The insert call itself failed.
    Store(StoreError),
}

impl core::fmt::Display for RowFailureCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RowFailureCause::Rejected(err) => write!(f, "rejected: {} ({})", err.message, err.reason),
            RowFailureCause::Store(err) => write!(f, "{err}"),
        }
    }
}

/// A package whose row was not written. `index` is the package's position in the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub index: usize,
    pub cause: RowFailureCause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub project_id: ProjectId,
    pub destination: Destination,
    pub provisioning: ProvisionReport,
    pub rows_attempted: usize,
    pub rows_failed: Vec<RowFailure>,
}

impl IngestReport {
    /// Packages that landed. A row the store rejected more than once counts once.
    pub fn rows_written(&self) -> usize {
        let failed: HashSet<usize> = self.rows_failed.iter().map(|f| f.index).collect();
        self.rows_attempted.saturating_sub(failed.len())
    }

    pub fn is_clean(&self) -> bool {
        self.rows_failed.is_empty()
    }
}

pub struct IngestionClient<F: StoreFactory> {
    resolver: CredentialResolver<F>,
    provisioner: SchemaProvisioner,
    clock: Arc<dyn Clock>,
}

impl<F: StoreFactory> core::fmt::Debug for IngestionClient<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IngestionClient")
            .field("provisioner", &self.provisioner)
            .finish_non_exhaustive()
    }
}

impl<F: StoreFactory> IngestionClient<F> {
    pub fn new(factory: F, provisioner: SchemaProvisioner) -> Self {
        Self::with_clock(factory, provisioner, Arc::new(SystemClock))
    }

    pub fn with_clock(factory: F, provisioner: SchemaProvisioner, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: CredentialResolver::new(factory),
            provisioner,
            clock,
        }
    }

    pub fn resolver(&self) -> &CredentialResolver<F> {
        &self.resolver
    }

    pub fn provisioner(&self) -> &SchemaProvisioner {
        &self.provisioner
    }

    pub fn ingest(&self, message: InboundMessage) -> Result<IngestReport, IngestError> {
        let kind = message.kind();
        let event_hook = message.normalize();
        let request = &event_hook.device_event.request;

        let store = self.resolver.resolve(event_hook.hook.secret())?;
        let project_id = store.project_id().clone();

        let destination = Destination::new(project_id.clone(), self.clock.now());
        let provisioning = self
            .provisioner
            .ensure(&store, &destination)
            .map_err(|err| match err {
                err if err.is_unauthorized() => {
                    IngestError::Credential(CredentialError::Rejected(err.store_error().to_string()))
                }
                err => IngestError::Provision(err),
            })?;

        debug!(
            project_id = %project_id,
            kind,
            hook = %event_hook.hook.name,
            packages = request.packages.len(),
            "ingesting device event"
        );

        let table = TableRef::from(&destination);
        let suffix = destination.shard().as_str().to_string();
        let suffix = suffix.as_str();
        let mut rows_failed = Vec::new();

        for (index, package) in request.packages.iter().enumerate() {
            let row = InsertRow::new(OutputRow::map(request, package, self.clock.now()));

            match store.insert_rows(&table, suffix, std::slice::from_ref(&row)) {
                Ok(response) => {
                    for rejected in response.errors {
                        warn!(
                            project_id = %project_id,
                            table = %table,
                            suffix,
                            index,
                            reason = %rejected.reason,
                            detail = %rejected.message,
                            "row rejected by store"
                        );
                        rows_failed.push(RowFailure {
                            index,
                            cause: RowFailureCause::Rejected(rejected),
                        });
                    }
                }
                Err(err) => {
                    warn!(
                        project_id = %project_id,
                        table = %table,
                        suffix,
                        index,
                        error = %err,
                        "row insert failed"
                    );
                    rows_failed.push(RowFailure {
                        index,
                        cause: RowFailureCause::Store(err),
                    });
                }
            }
        }

        let report = IngestReport {
            project_id,
            destination,
            provisioning,
            rows_attempted: request.packages.len(),
            rows_failed,
        };
        info!(
            project_id = %report.project_id,
            suffix,
            rows_attempted = report.rows_attempted,
            rows_failed = report.rows_failed.len(),
            "ingested device event"
        );
        Ok(report)
    }
}
