//! VisibilityFilter - role-aware read projections
//!
//! Pure functions over point-in-time store snapshots. Admins see every
//! record regardless of owner or status; operators see only records they
//! own, and hidden incidents are never shown to them. Hiding an incident
//! is a visibility state, not a delete, so the record itself stays in the
//! store for admins and for later un-hiding.

use crate::models::{CallerContext, Camera, Incident, IncidentStatus};

/// Incidents visible to the caller, newest first
pub fn visible_incidents(incidents: &[Incident], ctx: &CallerContext) -> Vec<Incident> {
    let mut visible: Vec<Incident> = incidents
        .iter()
        .filter(|incident| {
            if ctx.is_admin() {
                return true;
            }
            incident.owner_id == ctx.user_id && incident.status != IncidentStatus::Hidden
        })
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    visible
}

/// Cameras visible to the caller, registration order preserved
pub fn visible_cameras(cameras: &[Camera], ctx: &CallerContext) -> Vec<Camera> {
    cameras
        .iter()
        .filter(|camera| ctx.is_admin() || camera.owner_id == ctx.user_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CameraLiveness, RecordId, Severity};
    use chrono::{Duration, Utc};

    fn incident(id: i64, owner: &str, status: IncidentStatus, age_secs: i64) -> Incident {
        Incident {
            id: RecordId::Server(id),
            timestamp: Utc::now() - Duration::seconds(age_secs),
            camera_id: "WEB-01".to_string(),
            category: "Loitering".to_string(),
            severity: Severity::Medium,
            confidence: 0.75,
            description: "test".to_string(),
            ai_summary: None,
            owner_id: owner.to_string(),
            status,
            snapshot_path: None,
        }
    }

    fn camera(id: i64, owner: &str) -> Camera {
        Camera {
            id: RecordId::Server(id),
            name: format!("cam-{}", id),
            location: "Site".to_string(),
            source_url: "0".to_string(),
            owner_id: owner.to_string(),
            status: CameraLiveness::Active,
        }
    }

    #[test]
    fn test_admin_sees_everything_including_hidden() {
        let incidents = vec![
            incident(1, "op_1", IncidentStatus::Active, 10),
            incident(2, "op_2", IncidentStatus::Hidden, 20),
        ];
        let visible = visible_incidents(&incidents, &CallerContext::admin());
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn test_operator_sees_only_own_unhidden() {
        let incidents = vec![
            incident(1, "op_1", IncidentStatus::Active, 10),
            incident(2, "op_1", IncidentStatus::Hidden, 20),
            incident(3, "op_2", IncidentStatus::Active, 30),
        ];
        let visible = visible_incidents(&incidents, &CallerContext::operator("op_1"));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, RecordId::Server(1));
    }

    #[test]
    fn test_incidents_sorted_newest_first() {
        let incidents = vec![
            incident(1, "admin", IncidentStatus::Active, 300),
            incident(2, "admin", IncidentStatus::Active, 10),
            incident(3, "admin", IncidentStatus::Active, 100),
        ];
        let visible = visible_incidents(&incidents, &CallerContext::admin());
        let ids: Vec<_> = visible.iter().map(|i| i.id).collect();
        assert_eq!(
            ids,
            vec![RecordId::Server(2), RecordId::Server(3), RecordId::Server(1)]
        );
    }

    #[test]
    fn test_camera_order_preserved_under_filter() {
        let cameras = vec![camera(1, "op_1"), camera(2, "op_2"), camera(3, "op_1")];
        let visible = visible_cameras(&cameras, &CallerContext::operator("op_1"));
        let ids: Vec<_> = visible.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![RecordId::Server(1), RecordId::Server(3)]);
    }

    #[test]
    fn test_anonymous_sees_nothing_owned() {
        let incidents = vec![incident(1, "op_1", IncidentStatus::Active, 10)];
        let cameras = vec![camera(1, "op_1")];
        assert!(visible_incidents(&incidents, &CallerContext::anonymous()).is_empty());
        assert!(visible_cameras(&cameras, &CallerContext::anonymous()).is_empty());
    }
}
