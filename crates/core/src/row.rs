//! Row mapping: one device request + one package → one analytics row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{DeviceRequest, Package};
use crate::value_object::ValueObject;

/// Written in place of an absent `ipAddress` / `userAgent`; rows never carry nulls there.
///
/// A single space rather than an empty string, matching rows already stored in existing
/// tenant tables so queries filtering on it keep working.
pub const BLANK_SENTINEL: &str = " ";

/// Nested `packages` record of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub reference: String,
    pub version: String,
}

impl From<&Package> for PackageRecord {
    fn from(value: &Package) -> Self {
        Self {
            reference: value.reference.clone(),
            version: value.version.clone(),
        }
    }
}

/// One row of the resolve-versions table.
///
/// `timestamp` is the ingestion instant, not the time the device made the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRow {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub unit_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub custom_client_data: String,
    pub packages: PackageRecord,
}

impl OutputRow {
    /// Map a request and one of its packages into a row. Pure; cannot fail.
    pub fn map(request: &DeviceRequest, package: &Package, ingested_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: ingested_at,
            user_id: request.user_id.clone(),
            unit_id: request.unit_id.clone(),
            ip_address: or_blank(request.ip_address.as_deref()),
            user_agent: or_blank(request.user_agent.as_deref()),
            custom_client_data: request.custom_client_data.to_string(),
            packages: PackageRecord::from(package),
        }
    }
}

fn or_blank(value: Option<&str>) -> String {
    value.unwrap_or(BLANK_SENTINEL).to_string()
}

impl ValueObject for OutputRow {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn request(ip: Option<&str>, agent: Option<&str>) -> DeviceRequest {
        DeviceRequest {
            user_id: "user-1".to_string(),
            unit_id: "unit-1".to_string(),
            ip_address: ip.map(str::to_string),
            user_agent: agent.map(str::to_string),
            custom_client_data: json!({ "channel": "beta", "retries": 2 }),
            packages: vec![Package::new("a", "1.0"), Package::new("b", "2.0")],
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    #[test]
    fn absent_optionals_become_blank_sentinel() {
        let req = request(None, Some("sdk/3"));
        let row = OutputRow::map(&req, &req.packages[0], at());

        assert_eq!(row.ip_address, BLANK_SENTINEL);
        assert_eq!(row.user_agent, "sdk/3");
        assert_eq!(
            row.packages,
            PackageRecord {
                reference: "a".to_string(),
                version: "1.0".to_string()
            }
        );
    }

    #[test]
    fn custom_client_data_is_stringified_json() {
        let req = request(Some("10.0.0.1"), None);
        let row = OutputRow::map(&req, &req.packages[1], at());

        let parsed: serde_json::Value = serde_json::from_str(&row.custom_client_data).unwrap();
        assert_eq!(parsed, json!({ "channel": "beta", "retries": 2 }));
    }

    #[test]
    fn serializes_with_table_column_names() {
        let req = request(None, None);
        let row = OutputRow::map(&req, &req.packages[0], at());
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["ipAddress"], " ");
        assert_eq!(value["userAgent"], " ");
        assert_eq!(value["packages"], json!({ "reference": "a", "version": "1.0" }));
        assert_eq!(value["timestamp"], "2026-10-19T08:30:00Z");
    }

    proptest! {
        /// Property: whatever the optional fields hold, the mapped row never carries a null
        /// and passes present values through unchanged.
        #[test]
        fn optionals_never_map_to_null(
            ip in proptest::option::of("[a-z0-9.:]{1,20}"),
            agent in proptest::option::of("[a-zA-Z0-9/ .]{1,20}"),
        ) {
            let req = request(ip.as_deref(), agent.as_deref());
            let row = OutputRow::map(&req, &req.packages[0], at());
            let value = serde_json::to_value(&row).unwrap();

            prop_assert!(value["ipAddress"].is_string());
            prop_assert!(value["userAgent"].is_string());
            prop_assert_eq!(row.ip_address, ip.unwrap_or_else(|| BLANK_SENTINEL.to_string()));
            prop_assert_eq!(row.user_agent, agent.unwrap_or_else(|| BLANK_SENTINEL.to_string()));
        }
    }
}
