use crate::{EventHook, InboundMessage};

/// Helper trait for tenant-scoped messages.
///
/// A tenant is identified by the project named in its hook secret. Workers can be
/// pinned to one project and ignore messages for every other tenant.
///
/// The value is the raw project id from the wire; it is validated when the
/// credential resolver builds a store handle, not here.
pub trait TenantScoped {
    fn project_id(&self) -> &str;
}

impl TenantScoped for EventHook {
    fn project_id(&self) -> &str {
        &self.hook.google_client_secret.project_id
    }
}

impl TenantScoped for InboundMessage {
    fn project_id(&self) -> &str {
        &self.hook().google_client_secret.project_id
    }
}
