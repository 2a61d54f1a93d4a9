//! BackendClient - HTTP transport to the system-of-record
//!
//! ## Responsibilities
//!
//! - One shared `reqwest::Client` with connect/request timeouts
//! - Caller identity header (`X-User-ID`) attached per request from an
//!   explicit [`CallerContext`] argument; anonymous callers send no header
//! - Status-checked responses mapped to the engine error taxonomy
//!
//! No retries; one-shot callers decide what to do with a failure.

use crate::error::{Error, Result};
use crate::models::{CallerContext, Camera, Incident, IncidentStatus, NewCamera};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_HEADER: &str = "X-User-ID";

/// Liveness probe response (GET /health)
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// HTTP client for the dashboard backend
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for the given base URL (no trailing slash)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_identity(&self, req: RequestBuilder, ctx: &CallerContext) -> RequestBuilder {
        if ctx.is_anonymous() {
            req
        } else {
            req.header(USER_HEADER, &ctx.user_id)
        }
    }

    /// Map a non-success response to the error taxonomy
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
            StatusCode::CONFLICT => Err(Error::Conflict(message)),
            _ => Err(Error::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    /// GET /incidents - full authoritative snapshot
    pub async fn get_incidents(&self, ctx: &CallerContext) -> Result<Vec<Incident>> {
        let req = self.with_identity(self.http.get(self.url("/incidents")), ctx);
        let response = self.check(req.send().await?).await?;
        let incidents: Vec<Incident> = response.json().await?;
        debug!(count = incidents.len(), "Fetched incident snapshot");
        Ok(incidents)
    }

    /// GET /cameras - full authoritative snapshot
    pub async fn get_cameras(&self, ctx: &CallerContext) -> Result<Vec<Camera>> {
        let req = self.with_identity(self.http.get(self.url("/cameras")), ctx);
        let response = self.check(req.send().await?).await?;
        let cameras: Vec<Camera> = response.json().await?;
        debug!(count = cameras.len(), "Fetched camera snapshot");
        Ok(cameras)
    }

    /// POST /cameras - returns the created record with its server id
    pub async fn create_camera(&self, ctx: &CallerContext, fields: &NewCamera) -> Result<Camera> {
        let req = self.with_identity(self.http.post(self.url("/cameras")).query(fields), ctx);
        let response = self.check(req.send().await?).await?;
        let camera: Camera = response.json().await?;
        debug!(camera_id = %camera.id, name = %camera.name, "Camera created on backend");
        Ok(camera)
    }

    /// DELETE /cameras/{id}
    pub async fn delete_camera(&self, ctx: &CallerContext, id: i64) -> Result<()> {
        let req = self.with_identity(self.http.delete(self.url(&format!("/cameras/{}", id))), ctx);
        self.check(req.send().await?).await?;
        debug!(camera_id = id, "Camera deleted on backend");
        Ok(())
    }

    /// PATCH /incidents/{id}/status - idempotent status update
    pub async fn set_incident_status(
        &self,
        ctx: &CallerContext,
        id: i64,
        status: IncidentStatus,
    ) -> Result<()> {
        let req = self.with_identity(
            self.http
                .patch(self.url(&format!("/incidents/{}/status", id)))
                .query(&[("status", status.to_string())]),
            ctx,
        );
        self.check(req.send().await?).await?;
        debug!(incident_id = id, status = %status, "Incident status updated on backend");
        Ok(())
    }

    /// GET /health - liveness probe (no identity required)
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.check(self.http.get(self.url("/health")).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BackendClient::new("http://localhost:8001/").unwrap();
        assert_eq!(client.url("/incidents"), "http://localhost:8001/incidents");
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        // Nothing listens on this port; the fetch must fail as Transport,
        // never panic.
        let client = BackendClient::new("http://127.0.0.1:9").unwrap();
        let err = client.health().await.unwrap_err();
        assert!(err.is_transport());
    }
}
