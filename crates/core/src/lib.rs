//! `hooksink-core`: domain building blocks for device-event ingestion.
//!
//! This crate contains **pure domain** types (no infrastructure concerns): tenant
//! secrets, device events, the fixed analytics schema, destinations and output rows.

pub mod destination;
pub mod device;
pub mod error;
pub mod id;
pub mod row;
pub mod schema;
pub mod secret;
pub mod value_object;

pub use destination::{DATASET_NAME, DateShard, Destination, TABLE_NAME};
pub use device::{DeviceEvent, DeviceRequest, Package};
pub use error::{DomainError, DomainResult};
pub use id::{InsertId, ProjectId};
pub use row::{BLANK_SENTINEL, OutputRow, PackageRecord};
pub use schema::{FieldSchema, FieldType, TableSchema};
pub use secret::TenantSecret;
pub use value_object::ValueObject;
