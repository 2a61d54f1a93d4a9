//! Shared data models
//!
//! Canonical record types for the two synced collections (incidents and
//! cameras), the caller context threaded through every engine call, and the
//! typed patch structs used by the RecordStore merge primitives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record identity.
///
/// Confirmed records carry a backend-assigned numeric id; in-flight optimistic
/// records carry a client-assigned temporary id. A record never holds both.
/// Server ids arrive on the wire as JSON numbers, so the enum is untagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Backend-assigned id (authoritative)
    Server(i64),
    /// Client-assigned id, pending server confirmation
    Temp(Uuid),
}

impl RecordId {
    /// Fresh temporary identity for an optimistic record
    pub fn temp() -> Self {
        RecordId::Temp(Uuid::new_v4())
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, RecordId::Temp(_))
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Server(id) => write!(f, "{}", id),
            RecordId::Temp(id) => write!(f, "tmp:{}", id),
        }
    }
}

/// Incident severity (ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// Incident display status
///
/// Settable idempotently in any direction (Hidden <-> Active); the reconciler
/// applies the most recently received value, never a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentStatus {
    Active,
    Hidden,
    Resolved,
}

impl Default for IncidentStatus {
    fn default() -> Self {
        IncidentStatus::Active
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IncidentStatus::Active => "Active",
            IncidentStatus::Hidden => "Hidden",
            IncidentStatus::Resolved => "Resolved",
        };
        f.write_str(s)
    }
}

/// Camera liveness status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraLiveness {
    Active,
    Inactive,
}

impl Default for CameraLiveness {
    fn default() -> Self {
        CameraLiveness::Active
    }
}

/// Security detection record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub camera_id: String,
    /// Category tag ("Loitering", "Rapid Escalation", ...)
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    /// Detection confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(default = "default_owner")]
    pub owner_id: String,
    #[serde(default)]
    pub status: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,
}

/// Registered video source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: RecordId,
    pub name: String,
    pub location: String,
    pub source_url: String,
    #[serde(default = "default_owner")]
    pub owner_id: String,
    #[serde(default)]
    pub status: CameraLiveness,
}

fn default_owner() -> String {
    "admin".to_string()
}

/// Fields for registering a new camera (POST /cameras)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCamera {
    pub name: String,
    pub location: String,
    /// Device index or network stream URL
    pub source: String,
}

/// Typed partial update for an incident
#[derive(Debug, Clone, Default)]
pub struct IncidentPatch {
    pub status: Option<IncidentStatus>,
    pub description: Option<String>,
    pub ai_summary: Option<String>,
}

impl IncidentPatch {
    pub fn status(status: IncidentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Typed partial update for a camera
#[derive(Debug, Clone, Default)]
pub struct CameraPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub status: Option<CameraLiveness>,
}

/// Caller privilege level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Administrative privilege: sees everything
    Admin,
    /// Standard privilege: sees only owned records, never hidden incidents
    Operator,
}

/// Identity under which requests are issued and visibility is filtered.
///
/// Set once per session and passed explicitly through every engine call;
/// there is no hidden default header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: String,
    pub role: Role,
}

impl CallerContext {
    pub fn admin() -> Self {
        Self {
            user_id: "admin".to_string(),
            role: Role::Admin,
        }
    }

    pub fn operator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Operator,
        }
    }

    /// Unprivileged identity used before any session context is set
    pub fn anonymous() -> Self {
        Self {
            user_id: String::new(),
            role: Role::Operator,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_untagged_roundtrip() {
        let server: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(server, RecordId::Server(42));
        assert_eq!(serde_json::to_string(&server).unwrap(), "42");

        let temp = RecordId::temp();
        let json = serde_json::to_string(&temp).unwrap();
        let parsed: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, temp);
        assert!(parsed.is_temp());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn test_incident_deserializes_with_missing_fields() {
        // Snapshot records may omit optional columns entirely
        let json = r#"{
            "id": 1,
            "timestamp": "2026-08-01T10:00:00Z",
            "camera_id": "WEB-01",
            "type": "Loitering"
        }"#;
        let incident: Incident = serde_json::from_str(json).unwrap();
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(incident.status, IncidentStatus::Active);
        assert_eq!(incident.owner_id, "admin");
        assert!(incident.ai_summary.is_none());
    }

    #[test]
    fn test_camera_liveness_wire_format() {
        let json = r#"{
            "id": 3,
            "name": "Lobby",
            "location": "Entrance",
            "source_url": "0",
            "owner_id": "op_7",
            "status": "inactive"
        }"#;
        let cam: Camera = serde_json::from_str(json).unwrap();
        assert_eq!(cam.status, CameraLiveness::Inactive);
        assert!(serde_json::to_string(&cam).unwrap().contains("\"inactive\""));
    }

    #[test]
    fn test_anonymous_context_is_unprivileged() {
        let ctx = CallerContext::anonymous();
        assert!(!ctx.is_admin());
        assert!(ctx.is_anonymous());
    }
}
