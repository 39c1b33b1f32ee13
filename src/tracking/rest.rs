//! MLflow REST API 2.0 tracking backend.

use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::artifact::{copy_to_local_root, relative_artifact_path, ArtifactLocation};
use super::{NewRun, TrackingClient};
use crate::config::{Auth, TrackingConfig, TrackingUri};
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord,
};
use crate::{Error, Result};

/// User agent for tracking requests.
const USER_AGENT_VALUE: &str = concat!("run-recorder/", env!("CARGO_PKG_VERSION"));

const TRACKING_API: &str = "api/2.0/mlflow";
const ARTIFACTS_API: &str = "api/2.0/mlflow-artifacts/artifacts";

/// Client for an MLflow-compatible tracking server.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth: Option<Auth>,
}

impl RestClient {
    /// Build a client for `config.tracking_uri`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the tracking URI is not an HTTP(S) URL,
    /// or `Error::Http` if the HTTP client cannot be built.
    pub fn new(config: &TrackingConfig) -> Result<Self> {
        let TrackingUri::Rest(url) = &config.tracking_uri else {
            return Err(Error::Config(format!(
                "REST backend needs an http(s) tracking URI, got {}",
                config.tracking_uri
            )));
        };

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()?;

        // Normalize base URL (remove trailing slash)
        let base_url = url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            auth: config.auth.clone(),
        })
    }

    /// Tracking server base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(Auth::Bearer(token)) => request.bearer_auth(token),
            Some(Auth::Basic { username, password }) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn get<R: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<R> {
        let url = format!("{}/{TRACKING_API}/{endpoint}", self.base_url);
        debug!(url = %url, "GET");
        let request = self.authorize(self.client.get(&url).query(query));
        decode(check(request.send().await?).await?).await
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{TRACKING_API}/{endpoint}", self.base_url);
        debug!(url = %url, "POST");
        let request = self.authorize(self.client.post(&url).json(body));
        decode(check(request.send().await?).await?).await
    }

    async fn upload(&self, proxied_root: &str, relative: &str, local_path: &Path) -> Result<u64> {
        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len() as u64;
        let url = format!(
            "{}/{ARTIFACTS_API}/{}/{relative}",
            self.base_url,
            proxied_root.trim_matches('/')
        );
        debug!(url = %url, bytes = size, "PUT artifact");

        let request = self.authorize(
            self.client
                .put(&url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        );
        check(request.send().await?).await?;
        Ok(size)
    }
}

/// Map non-2xx responses to `Error::Api`, keeping the server's error code.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => (err.error_code, err.message),
        Err(_) => (
            status
                .canonical_reason()
                .unwrap_or("HTTP_ERROR")
                .to_ascii_uppercase()
                .replace(' ', "_"),
            body,
        ),
    };

    Err(Error::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

/// Decode a JSON body; empty bodies decode as `{}`.
async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let body = response.text().await?;
    let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
    Ok(serde_json::from_str(body)?)
}

fn millis_to_utc(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[derive(Debug, Deserialize)]
struct WireExperiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    artifact_location: String,
}

impl From<WireExperiment> for ExperimentRecord {
    fn from(wire: WireExperiment) -> Self {
        Self::new(wire.experiment_id, wire.name, wire.artifact_location)
    }
}

#[derive(Debug, Deserialize)]
struct ExperimentResponse {
    experiment: WireExperiment,
}

#[derive(Debug, Serialize)]
struct CreateExperimentRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Serialize)]
struct WireTag<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    experiment_id: &'a str,
    run_name: &'a str,
    start_time: i64,
    tags: Vec<WireTag<'a>>,
}

#[derive(Debug, Deserialize)]
struct WireRunInfo {
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    run_uuid: String,
    experiment_id: String,
    #[serde(default)]
    run_name: String,
    status: RunStatus,
    start_time: Option<i64>,
    end_time: Option<i64>,
    #[serde(default)]
    artifact_uri: String,
}

impl From<WireRunInfo> for RunRecord {
    fn from(wire: WireRunInfo) -> Self {
        // Older servers only send the deprecated run_uuid
        let run_id = if wire.run_id.is_empty() {
            wire.run_uuid
        } else {
            wire.run_id
        };
        let mut builder = Self::builder(run_id, wire.experiment_id, wire.artifact_uri)
            .run_name(wire.run_name)
            .status(wire.status)
            .ended_at(millis_to_utc(wire.end_time));
        if let Some(started_at) = millis_to_utc(wire.start_time) {
            builder = builder.started_at(started_at);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
struct WireRun {
    info: WireRunInfo,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: WireRun,
}

#[derive(Debug, Serialize)]
struct KeyValueRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct LogMetricRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: f64,
    timestamp: i64,
    step: i64,
}

#[derive(Debug, Serialize)]
struct UpdateRunRequest<'a> {
    run_id: &'a str,
    status: RunStatus,
    end_time: i64,
}

// ============================================================================
// TrackingClient
// ============================================================================

impl TrackingClient for RestClient {
    async fn resolve_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        let lookup: Result<ExperimentResponse> = self
            .get("experiments/get-by-name", &[("experiment_name", name)])
            .await;
        match lookup {
            Ok(found) => return Ok(found.experiment.into()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let created: CreateExperimentResponse = self
            .post("experiments/create", &CreateExperimentRequest { name })
            .await?;
        debug!(experiment_id = %created.experiment_id, name, "created experiment");

        let fetched: ExperimentResponse = self
            .get(
                "experiments/get",
                &[("experiment_id", created.experiment_id.as_str())],
            )
            .await?;
        Ok(fetched.experiment.into())
    }

    async fn create_run(&self, run: NewRun) -> Result<RunRecord> {
        let request = CreateRunRequest {
            experiment_id: &run.experiment_id,
            run_name: &run.run_name,
            start_time: run.start_time.timestamp_millis(),
            tags: run
                .tags
                .iter()
                .map(|t| WireTag {
                    key: t.key(),
                    value: t.value(),
                })
                .collect(),
        };
        let response: CreateRunResponse = self.post("runs/create", &request).await?;
        Ok(response.run.info.into())
    }

    async fn log_param(&self, run_id: &str, param: &ParamRecord) -> Result<()> {
        let request = KeyValueRequest {
            run_id,
            key: param.key(),
            value: param.value(),
        };
        let _: Empty = self.post("runs/log-parameter", &request).await?;
        Ok(())
    }

    async fn log_metric(&self, run_id: &str, metric: &MetricRecord) -> Result<()> {
        let request = LogMetricRequest {
            run_id,
            key: metric.key(),
            value: metric.value(),
            timestamp: metric.timestamp().timestamp_millis(),
            step: metric.step(),
        };
        let _: Empty = self.post("runs/log-metric", &request).await?;
        Ok(())
    }

    async fn set_tag(&self, run_id: &str, tag: &TagRecord) -> Result<()> {
        let request = KeyValueRequest {
            run_id,
            key: tag.key(),
            value: tag.value(),
        };
        let _: Empty = self.post("runs/set-tag", &request).await?;
        Ok(())
    }

    async fn log_artifact(
        &self,
        run: &RunRecord,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<ArtifactRecord> {
        let relative = relative_artifact_path(local_path, artifact_dir)?;
        let size = match ArtifactLocation::parse(run.artifact_uri())? {
            ArtifactLocation::Proxied(root) => self.upload(&root, &relative, local_path).await?,
            // Server without artifact proxy sharing a filesystem with us
            ArtifactLocation::Local(root) => copy_to_local_root(&root, local_path, &relative).await?,
            ArtifactLocation::Memory => {
                return Err(Error::UnsupportedArtifactUri(run.artifact_uri().to_string()))
            }
        };
        Ok(ArtifactRecord::new(run.run_id(), relative, size))
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        let request = UpdateRunRequest {
            run_id,
            status,
            end_time: end_time.timestamp_millis(),
        };
        let _: serde_json::Value = self.post("runs/update", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_non_http_uri() {
        let config = TrackingConfig::default();
        assert!(matches!(RestClient::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_normalized() {
        let config = TrackingConfig {
            tracking_uri: TrackingUri::parse("http://tracking.local:5000/").unwrap(),
            ..TrackingConfig::default()
        };
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://tracking.local:5000");
    }

    #[test]
    fn test_wire_run_info_prefers_run_id() {
        let wire: WireRunInfo = serde_json::from_value(serde_json::json!({
            "run_uuid": "legacy",
            "experiment_id": "0",
            "status": "RUNNING",
            "start_time": 1_700_000_000_000_i64,
            "artifact_uri": "mlflow-artifacts:/0/legacy/artifacts"
        }))
        .unwrap();
        let record: RunRecord = wire.into();
        assert_eq!(record.run_id(), "legacy");
        assert_eq!(record.started_at().timestamp_millis(), 1_700_000_000_000);
        assert!(record.ended_at().is_none());
    }

    #[test]
    fn test_update_request_wire_shape() {
        let request = UpdateRunRequest {
            run_id: "abc",
            status: RunStatus::Finished,
            end_time: 5,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"run_id": "abc", "status": "FINISHED", "end_time": 5})
        );
    }
}
