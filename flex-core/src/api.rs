//! Remote asset API interface.
//!
//! The pull and push pipelines only talk to the server through `AssetApi`.
//! Implementations own transport, authentication and wire encoding.

use crate::error::ApiError;
use crate::metadata::AssetRecord;
use async_trait::async_trait;
use std::fmt;
use std::io::Read;

/// An asset delivered inline in a JSON pull response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAsset {
    pub path: String,
    /// Base64-encoded content
    pub data_raw: String,
    pub content_hash: Option<String>,
}

/// A JSON pull response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBundle {
    pub version: String,
    pub assets: Vec<InlineAsset>,
}

/// What a pull request returned.
pub enum PullBundle {
    /// Assets with inline base64 payloads.
    Inline(InlineBundle),
    /// A zip stream holding a metadata entry and one entry per asset,
    /// read in a single pass.
    Archive(Box<dyn Read + Send>),
}

impl fmt::Debug for PullBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullBundle::Inline(bundle) => f.debug_tuple("Inline").field(bundle).finish(),
            PullBundle::Archive(_) => f.debug_tuple("Archive").field(&"<stream>").finish(),
        }
    }
}

/// Opaque handle for a staged upload. Referenced by exactly one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingId(pub String);

impl fmt::Display for StagingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertPayload {
    Staged(StagingId),
    Inline(Vec<u8>),
}

/// One change in a push transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOperation {
    Upsert { path: String, payload: UpsertPayload },
    Delete { path: String },
}

impl AssetOperation {
    pub fn path(&self) -> &str {
        match self {
            AssetOperation::Upsert { path, .. } | AssetOperation::Delete { path } => path,
        }
    }

    /// Wire name of the operation.
    pub fn op_name(&self) -> &'static str {
        match self {
            AssetOperation::Upsert { .. } => "upsert",
            AssetOperation::Delete { .. } => "delete",
        }
    }
}

/// Server state after an accepted push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedAssets {
    pub version: String,
    pub assets: Vec<AssetRecord>,
}

/// Remote asset operations for one marketplace.
#[async_trait]
pub trait AssetApi: Send + Sync {
    /// Fetch the bundle at `version`, or the latest one when `None`.
    async fn pull_assets(
        &self,
        marketplace: &str,
        version: Option<&str>,
    ) -> Result<PullBundle, ApiError>;

    /// Upload one asset's bytes ahead of a push.
    ///
    /// Fails with `ApiError::InvalidContent` when the server refuses the bytes.
    async fn stage_asset(
        &self,
        marketplace: &str,
        data: &[u8],
        filename: &str,
    ) -> Result<StagingId, ApiError>;

    /// Submit a transaction based on `current_version`.
    async fn push_assets(
        &self,
        marketplace: &str,
        current_version: &str,
        operations: Vec<AssetOperation>,
    ) -> Result<PushedAssets, ApiError>;
}
