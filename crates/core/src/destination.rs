//! Date-sharded destination addressing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ProjectId;
use crate::value_object::ValueObject;

/// Dataset holding the resolve-version tables in every tenant project.
pub const DATASET_NAME: &str = "Barracks";

/// Base (template) table name; daily shards are `ResolveVersions{YYYYMMDD}`.
pub const TABLE_NAME: &str = "ResolveVersions";

/// Per-day suffix applied to the templated table (`YYYYMMDD`, UTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateShard(String);

impl DateShard {
    pub fn for_instant(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for DateShard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where one ingestion writes: `{project}.Barracks.ResolveVersions` + date shard.
///
/// Fully determined by the tenant's project id and the ingestion instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    project_id: ProjectId,
    shard: DateShard,
}

impl Destination {
    pub fn new(project_id: ProjectId, at: DateTime<Utc>) -> Self {
        Self {
            project_id,
            shard: DateShard::for_instant(at),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn dataset(&self) -> &'static str {
        DATASET_NAME
    }

    pub fn table(&self) -> &'static str {
        TABLE_NAME
    }

    pub fn shard(&self) -> &DateShard {
        &self.shard
    }

    /// Physical table the store materializes for this shard.
    pub fn sharded_table_name(&self) -> String {
        format!("{}{}", TABLE_NAME, self.shard)
    }
}

impl core::fmt::Display for Destination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, DATASET_NAME, TABLE_NAME)
    }
}

impl ValueObject for Destination {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn shard_is_utc_calendar_date() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 59).unwrap();
        assert_eq!(DateShard::for_instant(at).as_str(), "20260105");
    }

    #[test]
    fn destination_addresses_fixed_dataset_and_table() {
        let project = ProjectId::parse("tenant-a").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let dest = Destination::new(project, at);

        assert_eq!(dest.to_string(), "tenant-a.Barracks.ResolveVersions");
        assert_eq!(dest.shard().as_str(), "20261019");
        assert_eq!(dest.sharded_table_name(), "ResolveVersions20261019");
    }
}
