//! HTTP asset client for the Build API.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET assets/pull`: JSON bundle, or a zip stream when the server sends
//!   `application/zip`
//! - `POST assets/stage`: multipart upload of one asset
//! - `POST assets/push`: multipart transaction of upserts and deletes

use crate::config::ClientConfig;
use crate::stream::{channel_reader, ProgressFn};
use crate::wire::{self, Envelope, PullResponse, PushedVersion, StagedAsset};
use async_trait::async_trait;
use flex_core::{
    ApiError, AssetApi, AssetOperation, InlineBundle, PullBundle, PushedAssets, StagingId,
    UpsertPayload,
};
use reqwest::multipart::{Form, Part};
use reqwest::{header, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub const PULL_PATH: &str = "assets/pull";
pub const STAGE_PATH: &str = "assets/stage";
pub const PUSH_PATH: &str = "assets/push";

/// `AssetApi` over HTTP.
#[derive(Clone)]
pub struct AssetClient {
    base_url: Url,
    api_key: Option<String>,
    http: reqwest::Client,
    progress: Option<ProgressFn>,
}

impl std::fmt::Debug for AssetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AssetClient {
    /// Build a client. `timeout_secs` bounds connecting and each wait for
    /// data, never a whole transfer, so long archive downloads run to the end.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("flex-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: "client_init".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            base_url: config.base_url,
            api_key: config.api_key,
            http,
            progress: None,
        })
    }

    /// Report download progress of archive pulls.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn api_key(&self) -> Result<&str, ApiError> {
        self.api_key.as_deref().ok_or(ApiError::NotLoggedIn)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| ApiError::Transport {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Send a request, turning non-success statuses into `ApiError`s.
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let resp = request.send().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!("{} failed ({}): {}", endpoint, status, body);
            return Err(wire::api_error(status, &body));
        }
        Ok(resp)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, ApiError> {
        let body = resp.bytes().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

fn is_zip(resp: &Response) -> bool {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/zip"))
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Encode a push transaction as indexed multipart fields.
fn push_form(current_version: &str, operations: Vec<AssetOperation>) -> Form {
    let mut form = Form::new().text("current-version", current_version.to_string());
    for (i, op) in operations.into_iter().enumerate() {
        form = form
            .text(format!("path-{}", i), op.path().to_string())
            .text(format!("op-{}", i), op.op_name());
        if let AssetOperation::Upsert { path, payload } = op {
            form = match payload {
                UpsertPayload::Staged(id) => form.text(format!("staging-id-{}", i), id.0),
                UpsertPayload::Inline(data) => form.part(
                    format!("data-raw-{}", i),
                    Part::bytes(data).file_name(base_name(&path)),
                ),
            };
        }
    }
    form
}

#[async_trait]
impl AssetApi for AssetClient {
    async fn pull_assets(
        &self,
        marketplace: &str,
        version: Option<&str>,
    ) -> Result<PullBundle, ApiError> {
        let key = self.api_key()?;
        let mut query = vec![("marketplace", marketplace)];
        match version {
            Some(v) => query.push(("version", v)),
            None => query.push(("version-alias", "latest")),
        }
        let request = self
            .http
            .get(self.endpoint(PULL_PATH)?)
            .bearer_auth(key)
            .header(header::ACCEPT, "application/zip, application/json")
            .query(&query);
        let resp = self.send(PULL_PATH, request).await?;

        if is_zip(&resp) {
            tracing::debug!("Streaming archive bundle ({:?} bytes)", resp.content_length());
            let total = resp.content_length();
            let reader = channel_reader(PULL_PATH, resp.bytes_stream(), total, self.progress.clone());
            return Ok(PullBundle::Archive(Box::new(reader)));
        }

        let pulled: PullResponse = Self::decode(PULL_PATH, resp).await?;
        Ok(PullBundle::Inline(InlineBundle::from(pulled)))
    }

    async fn stage_asset(
        &self,
        marketplace: &str,
        data: &[u8],
        filename: &str,
    ) -> Result<StagingId, ApiError> {
        let key = self.api_key()?;
        let form = Form::new().part(
            "data-raw",
            Part::bytes(data.to_vec()).file_name(filename.to_string()),
        );
        let request = self
            .http
            .post(self.endpoint(STAGE_PATH)?)
            .bearer_auth(key)
            .query(&[("marketplace", marketplace)])
            .multipart(form);
        let resp = self.send(STAGE_PATH, request).await?;
        let staged: Envelope<StagedAsset> = Self::decode(STAGE_PATH, resp).await?;
        Ok(StagingId(staged.data.staging_id))
    }

    async fn push_assets(
        &self,
        marketplace: &str,
        current_version: &str,
        operations: Vec<AssetOperation>,
    ) -> Result<PushedAssets, ApiError> {
        let key = self.api_key()?;
        let request = self
            .http
            .post(self.endpoint(PUSH_PATH)?)
            .bearer_auth(key)
            .query(&[("marketplace", marketplace)])
            .multipart(push_form(current_version, operations));
        let resp = self.send(PUSH_PATH, request).await?;
        let pushed: Envelope<PushedVersion> = Self::decode(PUSH_PATH, resp).await?;
        Ok(pushed.data.into())
    }
}
