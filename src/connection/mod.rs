//! Connection resolution: where a project's base connection string comes from and how a stored
//! password turns it into something the tool server can dial.

mod management;
mod resolver;

pub use management::{ManagementClient, Organization, Project};
pub use resolver::{
    ConnectionResolver, ConnectionString, PASSWORD_PLACEHOLDER, direct_template, redact,
};

use tracing::{debug, warn};

/// Pick the base connection string for `instance_ref`.
///
/// Order: the caller-supplied string, then the management API, then the direct-host template.
pub async fn base_connection_string(
    explicit: Option<&str>,
    management: Option<&ManagementClient>,
    access_token: &str,
    instance_ref: &str,
) -> String {
    if let Some(explicit) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        debug!(instance_ref, "Using caller-supplied connection string");
        return explicit.to_string();
    }

    if let Some(management) = management {
        match management.connection_string(access_token, instance_ref).await {
            Ok(url) if !url.trim().is_empty() => return url,
            Ok(_) => warn!(instance_ref, "Management API returned an empty connection string"),
            Err(e) => warn!(instance_ref, error = %e, "Management API lookup failed; using direct template"),
        }
    }

    direct_template(instance_ref)
}
