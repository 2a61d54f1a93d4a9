//! Event envelope types for the server-pushed stream
//!
//! Every inbound frame is a JSON object whose `type` field selects the
//! payload shape. Events are at-most-once and carry no ordering guarantee;
//! the reconciler owns all merge decisions.

use crate::models::{Camera, Incident, IncidentStatus, RecordId, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Baseline confidence substituted when a create event omits the score
pub const DEFAULT_CONFIDENCE: f64 = 0.75;

/// Inbound stream message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A new incident was detected
    #[serde(rename = "incident")]
    IncidentCreated(IncidentCreatedEvent),
    /// An incident's status changed
    #[serde(rename = "incident_update")]
    IncidentStatusChanged(IncidentStatusChangedEvent),
    /// A camera registration was confirmed server-side
    #[serde(rename = "camera-created")]
    CameraCreated(Camera),
    /// Display-only telemetry; never merged into the store
    #[serde(rename = "stats")]
    Stats(StatsFrame),
    /// Full-collection push; merged under the snapshot rule
    #[serde(rename = "snapshot-replace")]
    SnapshotReplace(SnapshotReplaceEvent),
}

/// `incident` payload.
///
/// Producers may send partially populated records; every field except the
/// discriminator is optional and the reconciler substitutes defaults rather
/// than rejecting the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentCreatedEvent {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    /// The AI producer reports this as `escalation_score`
    #[serde(default, alias = "escalation_score")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl IncidentCreatedEvent {
    /// Build a full incident, substituting defaults for absent fields.
    ///
    /// An event without an id gets a fresh temporary identity so it can
    /// still be displayed until a snapshot supersedes it.
    pub fn into_incident(self) -> Incident {
        Incident {
            id: self.id.unwrap_or_else(RecordId::temp),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            camera_id: self.camera_id.unwrap_or_else(|| "Webcam".to_string()),
            category: self
                .category
                .unwrap_or_else(|| "Suspicious Activity".to_string()),
            severity: self.severity.unwrap_or_default(),
            confidence: self.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            description: self
                .description
                .or_else(|| self.ai_summary.clone())
                .unwrap_or_else(|| "Activity detected".to_string()),
            ai_summary: self.ai_summary,
            owner_id: self.owner_id.unwrap_or_else(|| "admin".to_string()),
            status: self.status.unwrap_or_default(),
            snapshot_path: self.snapshot_path,
        }
    }
}

/// `incident_update` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentStatusChangedEvent {
    pub id: RecordId,
    pub status: IncidentStatus,
    /// Embedded domain timestamp; parsed but NOT used for ordering
    /// (last-write-wins by arrival).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `stats` payload ("most recent wins", no identity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsFrame {
    /// Current motion/escalation score
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cam: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
}

/// `snapshot-replace` payload: one full collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entity", content = "records", rename_all = "lowercase")]
pub enum SnapshotReplaceEvent {
    Incidents(Vec<Incident>),
    Cameras(Vec<Camera>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators_exact() {
        let frames = [
            (r#"{"type":"incident","id":7,"category":"Loitering"}"#, "incident"),
            (r#"{"type":"incident_update","id":7,"status":"Hidden"}"#, "incident_update"),
            (r#"{"type":"stats","score":0.42}"#, "stats"),
        ];
        for (json, expected) in frames {
            let event: StreamEvent = serde_json::from_str(json).unwrap();
            let back = serde_json::to_value(&event).unwrap();
            assert_eq!(back["type"], expected);
        }
    }

    #[test]
    fn test_partial_incident_gets_defaults() {
        let json = r#"{"type":"incident","id":3}"#;
        let StreamEvent::IncidentCreated(event) = serde_json::from_str(json).unwrap() else {
            panic!("wrong variant");
        };
        let incident = event.into_incident();
        assert_eq!(incident.id, RecordId::Server(3));
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(incident.status, IncidentStatus::Active);
        assert!((incident.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_incident_without_id_gets_temp_identity() {
        let json = r#"{"type":"incident","category":"Intrusion"}"#;
        let StreamEvent::IncidentCreated(event) = serde_json::from_str(json).unwrap() else {
            panic!("wrong variant");
        };
        assert!(event.into_incident().id.is_temp());
    }

    #[test]
    fn test_escalation_score_alias_maps_to_confidence() {
        let json = r#"{"type":"incident","id":5,"escalation_score":0.91}"#;
        let StreamEvent::IncidentCreated(event) = serde_json::from_str(json).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(event.confidence, Some(0.91));
    }

    #[test]
    fn test_snapshot_replace_cameras() {
        let json = r#"{
            "type": "snapshot-replace",
            "entity": "cameras",
            "records": [
                {"id": 1, "name": "Lobby", "location": "Entrance", "source_url": "0"}
            ]
        }"#;
        let StreamEvent::SnapshotReplace(SnapshotReplaceEvent::Cameras(cams)) =
            serde_json::from_str(json).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(cams.len(), 1);
        assert_eq!(cams[0].name, "Lobby");
    }

    #[test]
    fn test_malformed_frame_is_an_error_not_a_panic() {
        assert!(serde_json::from_str::<StreamEvent>(r#"{"type":"bogus"}"#).is_err());
        assert!(serde_json::from_str::<StreamEvent>("not json").is_err());
    }
}
