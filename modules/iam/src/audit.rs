//! Audit emission.
//!
//! Identity-changing operations record an [`AuditEvent`] through an
//! [`AuditSink`]. Recording is strictly secondary to the primary operation:
//! the sink signature is infallible and implementations log-and-swallow
//! their own failures. Detail payloads are sanitized before they leave the
//! process so credential material can never end up in an audit trail.

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Keys whose values are stripped from detail payloads, matched
/// case-insensitively as substrings of the key name.
const CREDENTIAL_KEYS: [&str; 4] = ["password", "token", "secret", "hash"];

/// One identity-changing event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    /// Dotted action name, e.g. `role.assigned`.
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub resource_label: Option<String>,
    pub detail: serde_json::Value,
    pub recorded_at: OffsetDateTime,
}

impl AuditEvent {
    #[must_use]
    pub fn new(tenant_id: Uuid, actor_id: Uuid, action: &str, resource_type: &str) -> Self {
        Self {
            tenant_id,
            actor_id,
            action: action.to_owned(),
            resource_type: resource_type.to_owned(),
            resource_id: None,
            resource_label: None,
            detail: serde_json::Value::Null,
            recorded_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn resource(mut self, id: Uuid, label: &str) -> Self {
        self.resource_id = Some(id);
        self.resource_label = Some(label.to_owned());
        self
    }

    /// Attach a structured detail payload. Credential-like keys are
    /// stripped here, at construction, so no sink implementation can
    /// forget to do it.
    #[must_use]
    pub fn detail(mut self, mut detail: serde_json::Value) -> Self {
        sanitize(&mut detail);
        self.detail = detail;
        self
    }
}

/// Destination for audit events. Fire-and-forget: implementations must not
/// let their own failures reach the caller.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// In-process sink that writes events to the `audit` tracing target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => {
                tracing::info!(target: "audit", tenant_id = %event.tenant_id, action = %event.action, event = %json);
            }
            Err(e) => {
                tracing::warn!(target: "audit", error = %e, action = %event.action, "failed to serialize audit event");
            }
        }
    }
}

/// Recursively strip credential-like keys from a JSON value.
fn sanitize(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|key, _| {
                let key = key.to_ascii_lowercase();
                !CREDENTIAL_KEYS.iter().any(|c| key.contains(c))
            });
            for nested in map.values_mut() {
                sanitize(nested);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize(item);
            }
        }
        _ => {}
    }
}
