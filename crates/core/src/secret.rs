//! Per-tenant credential material carried on every inbound hook.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::ProjectId;

/// Service-account secret of one tenant, in the key-file layout issued by Google Cloud.
///
/// Supplied per event and never cached beyond one ingestion call. `Debug` output
/// redacts the private key so secrets can ride along in log fields.
///
/// Only `type` is required on the wire. Absent fields deserialize empty and are
/// rejected later, when the secret is turned into credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSecret {
    #[serde(rename = "type")]
    pub secret_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub auth_uri: String,
    #[serde(default)]
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: String,
    #[serde(default)]
    pub client_x509_cert_url: String,
}

impl TenantSecret {
    /// Project that owns the tenant's analytics tables.
    pub fn project_id(&self) -> Result<ProjectId, DomainError> {
        ProjectId::parse(self.project_id.clone())
    }
}

impl core::fmt::Debug for TenantSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantSecret")
            .field("secret_type", &self.secret_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
