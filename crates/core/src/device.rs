//! Device activity events: what a device asked for, and which packages it reported.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::value_object::ValueObject;

/// A package entry reported by a device. One package yields exactly one output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub reference: String,
    pub version: String,
}

impl Package {
    pub fn new(reference: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            version: version.into(),
        }
    }
}

impl ValueObject for Package {}

/// The request half of a device event (the canonical event the core ingests).
///
/// `user_id` and `unit_id` are required on the wire; `custom_client_data` defaults to
/// an empty JSON object and `packages` to an empty list when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub user_id: String,
    pub unit_id: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "empty_object")]
    pub custom_client_data: JsonValue,
    #[serde(default)]
    pub packages: Vec<Package>,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

/// A device event as published on the bus: the request plus whatever the resolver
/// answered. Only the request is ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    pub request: DeviceRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<JsonValue>,
}

impl DeviceEvent {
    pub fn new(request: DeviceRequest) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &DeviceRequest {
        &self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_deserializes_camel_case_fields() {
        let request: DeviceRequest = serde_json::from_value(json!({
            "userId": "user-1",
            "unitId": "unit-1",
            "ipAddress": "10.0.0.1",
            "userAgent": "sdk/3",
            "customClientData": { "channel": "beta" },
            "packages": [
                { "reference": "a", "version": "1.0" },
                { "reference": "b", "version": "2.0" }
            ]
        }))
        .unwrap();

        assert_eq!(request.user_id, "user-1");
        assert_eq!(request.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(request.custom_client_data, json!({ "channel": "beta" }));
        assert_eq!(
            request.packages,
            vec![Package::new("a", "1.0"), Package::new("b", "2.0")]
        );
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let request: DeviceRequest = serde_json::from_value(json!({
            "userId": "user-1",
            "unitId": "unit-1"
        }))
        .unwrap();

        assert_eq!(request.ip_address, None);
        assert_eq!(request.user_agent, None);
        assert_eq!(request.custom_client_data, json!({}));
        assert!(request.packages.is_empty());
    }

    #[test]
    fn request_requires_user_and_unit() {
        let missing_unit = serde_json::from_value::<DeviceRequest>(json!({ "userId": "u" }));
        assert!(missing_unit.is_err());
    }

    #[test]
    fn event_keeps_resolver_response_opaque() {
        let event: DeviceEvent = serde_json::from_value(json!({
            "request": { "userId": "u", "unitId": "d" },
            "response": { "available": [], "changed": [] }
        }))
        .unwrap();

        assert_eq!(event.request().unit_id, "d");
        assert!(event.response.is_some());
    }
}
