//! JSON shapes of Build API requests and responses.

use flex_core::error::INVALID_CONTENT_CODE;
use flex_core::{ApiError, AssetRecord, InlineAsset, InlineBundle, PushedAssets};
use serde::Deserialize;
use std::fmt;

/// `{"data": ...}` wrapper around every successful response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Versions arrive as strings, but older deployments send bare numbers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireVersion {
    Text(String),
    Number(i64),
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVersion::Text(s) => write!(f, "{}", s),
            WireVersion::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAsset {
    pub path: String,
    pub data_raw: String,
    #[serde(default)]
    pub content_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PullMeta {
    #[serde(alias = "aliasedVersion")]
    pub version: WireVersion,
}

#[derive(Debug, Deserialize)]
pub struct PullResponse {
    pub data: Vec<WireAsset>,
    pub meta: PullMeta,
}

impl From<PullResponse> for InlineBundle {
    fn from(resp: PullResponse) -> Self {
        InlineBundle {
            version: resp.meta.version.to_string(),
            assets: resp
                .data
                .into_iter()
                .map(|a| InlineAsset {
                    path: a.path,
                    data_raw: a.data_raw,
                    content_hash: a.content_hash,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedAsset {
    pub staging_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    pub path: String,
    pub content_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct PushedVersion {
    pub version: WireVersion,
    #[serde(default)]
    pub assets: Vec<WireRecord>,
}

impl From<PushedVersion> for PushedAssets {
    fn from(pushed: PushedVersion) -> Self {
        PushedAssets {
            version: pushed.version.to_string(),
            assets: pushed
                .assets
                .into_iter()
                .map(|r| AssetRecord::new(r.path, r.content_hash))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Map a failed response to an `ApiError`.
///
/// The first entry of `{"errors": [...]}` wins. Bodies without one fall back
/// to an `http-<status>` code and the status line.
pub fn api_error(status: reqwest::StatusCode, body: &str) -> ApiError {
    let first = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.errors.into_iter().next());

    match first {
        Some(err) if err.code == INVALID_CONTENT_CODE => ApiError::InvalidContent {
            detail: err.details.or(err.title).unwrap_or(err.code),
        },
        Some(err) => ApiError::Api {
            status: status.as_u16(),
            message: err.title.or(err.details).unwrap_or_else(|| err.code.clone()),
            code: err.code,
        },
        None => ApiError::Api {
            status: status.as_u16(),
            code: format!("http-{}", status.as_u16()),
            message: format!("Request failed: {}", status),
        },
    }
}
