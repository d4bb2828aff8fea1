//! Background workers.

pub mod ingestion_worker;

pub use ingestion_worker::{IngestionWorker, WorkerConfig, WorkerHandle, WorkerStats};
