/// Structured audit events for the boot pipeline.
/// Each lifecycle transition is emitted as one JSON line through the logger,
/// correlated by a per-boot id, so a container log aggregator can reconstruct
/// exactly how far a failed boot progressed. Purely observational: no control
/// flow depends on anything in this module.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Boot lifecycle events we track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BootEventType {
    BootStart,
    ConfigWritten,
    PathRejected,
    PrivilegeDropped,
    StorageReady,
    StorageTimeout,
    Handoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BootSeverity {
    Info,
    Warning,
    Critical,
}

impl BootEventType {
    fn default_severity(&self) -> BootSeverity {
        match self {
            BootEventType::BootStart
            | BootEventType::ConfigWritten
            | BootEventType::PrivilegeDropped
            | BootEventType::StorageReady
            | BootEventType::Handoff => BootSeverity::Info,
            BootEventType::PathRejected | BootEventType::StorageTimeout => BootSeverity::Critical,
        }
    }
}

/// One serialized audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootEvent {
    pub boot_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: BootEventType,
    pub severity: BootSeverity,
    pub detail: String,
}

/// Emitter bound to one boot attempt.
#[derive(Debug, Clone)]
pub struct BootAudit {
    boot_id: String,
}

impl BootAudit {
    pub fn new() -> Self {
        BootAudit {
            boot_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn boot_id(&self) -> &str {
        &self.boot_id
    }

    /// Emit one event as a single JSON line at a level matching its severity.
    pub fn emit<D: Into<String>>(&self, event: BootEventType, detail: D) {
        let record = BootEvent {
            boot_id: self.boot_id.clone(),
            timestamp: Utc::now(),
            severity: event.default_severity(),
            event,
            detail: detail.into(),
        };
        match serde_json::to_string(&record) {
            Ok(line) => match record.severity {
                BootSeverity::Info => log::info!("audit: {}", line),
                BootSeverity::Warning => log::warn!("audit: {}", line),
                BootSeverity::Critical => log::error!("audit: {}", line),
            },
            Err(e) => log::warn!("audit serialization failed: {}", e),
        }
    }
}

impl Default for BootAudit {
    fn default() -> Self {
        Self::new()
    }
}
