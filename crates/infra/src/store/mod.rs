//! Tenant-scoped access to the analytics store.
//!
//! - `r#trait`: the store abstraction and its reference/row/error types
//! - `in_memory`: shared in-process backend for tests and local runs
//! - `bigquery`: REST client for the hosted warehouse
//! - `token`: OAuth access tokens for one service-account identity

pub mod bigquery;
pub mod in_memory;
pub mod token;
pub mod r#trait;

pub use bigquery::{BigQueryOptions, BigQueryStore, BigQueryStoreFactory};
pub use in_memory::{Faults, InMemoryBackend, InMemoryStore, InMemoryStoreFactory, StoreCall};
pub use r#trait::{
    AnalyticsStore, DatasetRef, InsertResponse, InsertRow, RowInsertError, StoreError, TableRef,
};
