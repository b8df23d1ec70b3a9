//! Flex Core Library
//!
//! Asset synchronization for the marketplace Build API:
//! - Content hashing compatible with the server's convention
//! - Local tree scanning and JSON validation
//! - Asset metadata persistence (EDN) under the tracked directory
//! - Diffing local state against the last known version
//! - Pull and push pipelines over the `AssetApi` collaborator
//! - Streamed archive ingestion for large asset sets

pub mod api;
pub mod archive;
pub mod diff;
pub mod edn;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod pull;
pub mod push;
pub mod scan;
pub mod validate;

pub use api::{
    AssetApi, AssetOperation, InlineAsset, InlineBundle, PullBundle, PushedAssets, StagingId,
    UpsertPayload,
};
pub use error::{ApiError, AssetError, Result};
pub use hash::{content_hash, ContentHasher};
pub use metadata::{AssetMetadata, AssetRecord, NO_VERSION};
pub use pull::AssetPull;
pub use push::AssetPush;
pub use scan::{LocalAsset, META_DIR};

/// Operator-facing result of a pull or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to transfer; no files or metadata were written.
    UpToDate { version: String },
    /// A bundle was materialized into the local tree.
    Pulled {
        version: String,
        written: usize,
        deleted: usize,
    },
    /// A transaction was accepted by the server.
    Pushed {
        version: String,
        upserted: usize,
        deleted: usize,
    },
}

impl SyncOutcome {
    /// The version the local tree is at after the operation.
    pub fn version(&self) -> &str {
        match self {
            SyncOutcome::UpToDate { version }
            | SyncOutcome::Pulled { version, .. }
            | SyncOutcome::Pushed { version, .. } => version,
        }
    }
}
