//! Pushing local changes as a single versioned transaction.
//!
//! Nothing is sent unless the whole tree passes JSON validation. Non-JSON
//! changes are staged one by one before the transaction; any staging
//! failure aborts the push with the server untouched. The metadata file is
//! only rewritten after the server accepts the transaction.

use crate::SyncOutcome;
use crate::api::{AssetApi, AssetOperation, StagingId, UpsertPayload};
use crate::diff::{changed_assets, deleted_records};
use crate::error::{ApiError, AssetError, Result};
use crate::metadata::{AssetMetadata, NO_VERSION};
use crate::scan::{scan_assets, LocalAsset};
use crate::validate::{is_json_asset, validate_json_assets};
use std::path::PathBuf;

/// Push a local directory's changes for a marketplace.
pub struct AssetPush<'a, A: AssetApi + ?Sized> {
    api: &'a A,
    marketplace: String,
    root: PathBuf,
    prune: bool,
}

impl<'a, A: AssetApi + ?Sized> AssetPush<'a, A> {
    pub fn new(api: &'a A, marketplace: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            api,
            marketplace: marketplace.into(),
            root: root.into(),
            prune: false,
        }
    }

    /// Delete remote assets that no longer exist locally.
    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Run the push.
    pub async fn push(&self) -> Result<SyncOutcome> {
        if !self.root.is_dir() {
            return Err(AssetError::NotADirectory(self.root.clone()));
        }

        let existing = AssetMetadata::read(&self.root);
        let base_version = existing
            .as_ref()
            .map(|m| m.version.clone())
            .unwrap_or_else(|| NO_VERSION.to_string());
        let records = existing.as_ref().map(|m| m.assets.as_slice()).unwrap_or(&[]);

        let assets = scan_assets(&self.root)?;
        validate_json_assets(&assets)?;

        let changed = changed_assets(records, &assets);
        let deleted: Vec<&str> = if self.prune {
            deleted_records(records, assets.iter().map(|a| a.path.as_str()))
                .into_iter()
                .map(|r| r.path.as_str())
                .collect()
        } else {
            Vec::new()
        };

        if changed.is_empty() && deleted.is_empty() {
            tracing::info!("Assets are up to date at version {}", base_version);
            return Ok(SyncOutcome::UpToDate {
                version: base_version,
            });
        }

        tracing::info!(
            "Pushing {} changed and {} deleted assets on top of version {}",
            changed.len(),
            deleted.len(),
            base_version
        );

        let mut operations = Vec::with_capacity(changed.len() + deleted.len());
        for asset in &changed {
            let payload = if is_json_asset(&asset.path) {
                UpsertPayload::Inline(asset.data.clone())
            } else {
                UpsertPayload::Staged(self.stage(asset).await?)
            };
            operations.push(AssetOperation::Upsert {
                path: asset.path.clone(),
                payload,
            });
        }
        operations.extend(deleted.iter().map(|path| AssetOperation::Delete {
            path: path.to_string(),
        }));

        let result = self
            .api
            .push_assets(&self.marketplace, &base_version, operations)
            .await?;

        let meta = AssetMetadata::new(result.version, result.assets);
        meta.write(&self.root)?;

        tracing::info!("Pushed new version {}", meta.version);
        Ok(SyncOutcome::Pushed {
            version: meta.version,
            upserted: changed.len(),
            deleted: deleted.len(),
        })
    }

    async fn stage(&self, asset: &LocalAsset) -> Result<StagingId> {
        let filename = asset.path.rsplit('/').next().unwrap_or(&asset.path);
        match self
            .api
            .stage_asset(&self.marketplace, &asset.data, filename)
            .await
        {
            Ok(id) => {
                tracing::debug!("Staged {} as {}", asset.path, id);
                Ok(id)
            }
            Err(ApiError::InvalidContent { detail }) => Err(AssetError::Staging {
                path: asset.path.clone(),
                detail,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
