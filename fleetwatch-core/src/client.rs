use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::{EndpointPaths, Settings};
use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::transfer::{ExportPayload, ImportFile, ImportResult};
use crate::types::{QueryKey, RawResponse};

/// Body shared by the listing and export endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsRequest {
    /// `yyyy-MM-dd`
    pub monitoring_date: String,
    pub team_id_list: Vec<String>,
    pub current: usize,
    pub size: usize,
    pub session_id: String,
}

impl DetailsRequest {
    pub fn for_key(key: &QueryKey, size: usize, session_token: Option<&str>) -> Self {
        DetailsRequest {
            monitoring_date: key.date_string(),
            team_id_list: key.organization_id.iter().cloned().collect(),
            current: 1,
            size,
            session_id: session_token.unwrap_or_default().to_string(),
        }
    }
}

/// Remote operations of the fleet backend. Each call is attempted exactly
/// once; failures come back as transport errors for the caller to handle.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    async fn list_organizations(&self) -> Result<RawResponse>;
    async fn list_monitoring_details(&self, request: &DetailsRequest) -> Result<RawResponse>;
    async fn export_monitoring_details(&self, request: &DetailsRequest) -> Result<ExportPayload>;
    async fn import_alert_records(&self, file: &ImportFile) -> Result<ImportResult>;
}

pub struct HttpMonitoringApi {
    client: Client,
    base_url: String,
    endpoints: EndpointPaths,
}

impl HttpMonitoringApi {
    pub fn try_new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        info!(
            "Monitoring API client configured, base_url: {}, timeout: {}s",
            settings.base_url, settings.timeout_secs
        );
        Ok(HttpMonitoringApi {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            endpoints: settings.endpoints.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Response> {
        let response = self.client.post(self.url(path)).json(body).send().await;
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                error!("Request to {path} failed: {err}");
                return Err(err.into());
            }
        };
        check_status(path, response)
    }
}

fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        error!("Request to {endpoint} returned HTTP status {status}");
        Err(ErrorKind::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        }
        .into())
    }
}

#[async_trait]
impl MonitoringApi for HttpMonitoringApi {
    async fn list_organizations(&self) -> Result<RawResponse> {
        let path = &self.endpoints.organizations;
        let response = self.post_json(path, &json!({ "teamId": "" })).await?;
        Ok(response.json::<RawResponse>().await?)
    }

    async fn list_monitoring_details(&self, request: &DetailsRequest) -> Result<RawResponse> {
        let path = &self.endpoints.monitoring_details;
        info!(
            date = %request.monitoring_date,
            teams = ?request.team_id_list,
            "Requesting monitoring details"
        );
        let response = self.post_json(path, request).await?;
        Ok(response.json::<RawResponse>().await?)
    }

    async fn export_monitoring_details(&self, request: &DetailsRequest) -> Result<ExportPayload> {
        let path = &self.endpoints.export;
        let response = self.post_json(path, request).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        info!(bytes = bytes.len(), "Received monitoring details export");
        Ok(ExportPayload {
            bytes,
            content_type,
        })
    }

    async fn import_alert_records(&self, file: &ImportFile) -> Result<ImportResult> {
        let path = &self.endpoints.import;
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if let Some(mime) = &file.mime {
            part = part.mime_str(mime)?;
        }
        let form = Form::new().part("file", part);
        info!(file = %file.name, bytes = file.bytes.len(), "Uploading alert records");
        let response = match self.client.post(self.url(path)).multipart(form).send().await {
            Ok(response) => response,
            Err(err) => {
                error!("Upload to {path} failed: {err}");
                return Err(err.into());
            }
        };
        let response = check_status(path, response)?;
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ImportResult {
                success: true,
                message: String::new(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
