//! Infrastructure layer: tenant credentials, analytics store adapters, schema
//! provisioning, the ingestion client and its bus worker, configuration.

pub mod config;
pub mod credentials;
pub mod ingest;
pub mod provision;
pub mod store;
pub mod workers;


#[cfg(test)]
mod test_support;

pub use config::{ConfigError, HooksinkConfig};
pub use credentials::{CredentialError, CredentialResolver, ServiceAccountCredentials, StoreFactory};
pub use ingest::{
    Clock, IngestError, IngestReport, IngestionClient, RowFailure, RowFailureCause, SystemClock,
};
pub use provision::{
    ProvisionCache, ProvisionError, ProvisionOutcome, ProvisionReport, SchemaProvisioner,
    VisibilityPoll,
};
