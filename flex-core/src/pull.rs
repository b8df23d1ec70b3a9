//! Pulling a versioned asset bundle into a local tree.
//!
//! Order of effects:
//! 1. snapshot local paths (only when pruning)
//! 2. fetch and normalize the bundle (inline or streamed archive)
//! 3. delete pruned files
//! 4. stop if the version is unchanged and nothing was pruned
//! 5. write every bundle asset, then the metadata file last

use crate::SyncOutcome;
use crate::api::{AssetApi, InlineBundle, PullBundle};
use crate::archive::{ingest_archive, SpooledBundle};
use crate::diff::stale_paths;
use crate::error::{AssetError, Result};
use crate::hash::content_hash;
use crate::metadata::{AssetMetadata, AssetRecord};
use crate::scan::{check_bundle_path, scan_paths, META_DIR};
use base64::Engine as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Spool directory for archive bodies, inside the metadata directory.
pub const SPOOL_DIR: &str = "pull-spool";

/// Pull assets for a marketplace into a local directory.
pub struct AssetPull<'a, A: AssetApi + ?Sized> {
    api: &'a A,
    marketplace: String,
    root: PathBuf,
    version: Option<String>,
    prune: bool,
}

impl<'a, A: AssetApi + ?Sized> AssetPull<'a, A> {
    pub fn new(api: &'a A, marketplace: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            api,
            marketplace: marketplace.into(),
            root: root.into(),
            version: None,
            prune: false,
        }
    }

    /// Pull an explicit version instead of the latest one.
    pub fn version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Delete local files that are not part of the pulled bundle.
    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Run the pull.
    pub async fn pull(&self) -> Result<SyncOutcome> {
        ensure_target_dir(&self.root)?;

        let local_paths = if self.prune {
            Some(scan_paths(&self.root)?)
        } else {
            None
        };
        let existing = AssetMetadata::read(&self.root);
        let meta_dir = self.root.join(META_DIR);
        let had_meta_dir = meta_dir.is_dir();

        tracing::info!(
            "Pulling assets for {} (version: {})",
            self.marketplace,
            self.version.as_deref().unwrap_or("latest")
        );
        let bundle = self
            .api
            .pull_assets(&self.marketplace, self.version.as_deref())
            .await?;

        let spool_dir = meta_dir.join(SPOOL_DIR);
        remove_spool(&spool_dir);
        let result = self
            .apply(bundle, existing.as_ref(), local_paths.as_deref(), &spool_dir)
            .await;
        remove_spool(&spool_dir);
        if result.is_err() && !had_meta_dir {
            remove_empty_dir(&meta_dir);
        }
        result
    }

    async fn apply(
        &self,
        bundle: PullBundle,
        existing: Option<&AssetMetadata>,
        local_paths: Option<&[String]>,
        spool_dir: &Path,
    ) -> Result<SyncOutcome> {
        let pulled = normalize(bundle, spool_dir).await?;

        let deletions: Vec<&str> = match local_paths {
            Some(local) => stale_paths(local, pulled.assets.iter().map(|a| a.path.as_str())),
            None => Vec::new(),
        };
        for path in &deletions {
            let target = self.root.join(path);
            match fs::remove_file(&target) {
                Ok(()) => tracing::info!("Deleted {}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AssetError::io(&target, e)),
            }
        }

        let unchanged = existing.is_some_and(|m| m.version == pulled.version);
        if unchanged && deletions.is_empty() {
            tracing::info!("Assets are up to date at version {}", pulled.version);
            return Ok(SyncOutcome::UpToDate {
                version: pulled.version,
            });
        }

        let mut records = Vec::with_capacity(pulled.assets.len());
        for asset in pulled.assets {
            let target = self.root.join(&asset.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
            }
            match asset.body {
                PulledBody::Bytes(data) => {
                    fs::write(&target, data).map_err(|e| AssetError::io(&target, e))?;
                }
                PulledBody::Spooled(file) => move_into_place(&file, &target)?,
            }
            tracing::debug!("Wrote {}", asset.path);
            records.push(AssetRecord::new(asset.path, asset.content_hash));
        }

        let written = records.len();
        let meta = AssetMetadata::new(pulled.version, records);
        meta.write(&self.root)?;

        tracing::info!(
            "Pulled version {} ({} assets, {} deleted)",
            meta.version,
            written,
            deletions.len()
        );
        Ok(SyncOutcome::Pulled {
            version: meta.version,
            written,
            deleted: deletions.len(),
        })
    }
}

enum PulledBody {
    Bytes(Vec<u8>),
    Spooled(PathBuf),
}

struct PulledAsset {
    path: String,
    content_hash: String,
    body: PulledBody,
}

/// A bundle in the one shape the pipeline works with.
struct Pulled {
    version: String,
    assets: Vec<PulledAsset>,
}

async fn normalize(bundle: PullBundle, spool_dir: &Path) -> Result<Pulled> {
    match bundle {
        PullBundle::Inline(inline) => decode_inline(inline),
        PullBundle::Archive(reader) => {
            let dir = spool_dir.to_path_buf();
            let spooled = tokio::task::spawn_blocking(move || ingest_archive(reader, &dir))
                .await
                .map_err(|e| AssetError::Bundle(format!("archive reader failed: {}", e)))??;
            Ok(from_spooled(spooled))
        }
    }
}

fn decode_inline(bundle: InlineBundle) -> Result<Pulled> {
    let mut assets = Vec::with_capacity(bundle.assets.len());
    for asset in bundle.assets {
        check_bundle_path(&asset.path)?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(asset.data_raw.as_bytes())
            .map_err(|e| AssetError::Bundle(format!("invalid base64 for {}: {}", asset.path, e)))?;
        let hash = asset.content_hash.unwrap_or_else(|| content_hash(&data));
        assets.push(PulledAsset {
            path: asset.path,
            content_hash: hash,
            body: PulledBody::Bytes(data),
        });
    }
    Ok(Pulled {
        version: bundle.version,
        assets,
    })
}

fn from_spooled(bundle: SpooledBundle) -> Pulled {
    Pulled {
        version: bundle.version,
        assets: bundle
            .assets
            .into_iter()
            .map(|a| PulledAsset {
                path: a.path,
                content_hash: a.content_hash,
                body: PulledBody::Spooled(a.file),
            })
            .collect(),
    }
}

fn ensure_target_dir(root: &Path) -> Result<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(AssetError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(root).map_err(|e| AssetError::io(root, e))
        }
        Err(e) => Err(AssetError::io(root, e)),
    }
}

fn move_into_place(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| AssetError::io(to, e))?;
    if let Err(e) = fs::remove_file(from) {
        tracing::debug!("Failed to remove {}: {}", from.display(), e);
    }
    Ok(())
}

fn remove_spool(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            tracing::warn!("Failed to remove {}: {}", dir.display(), e);
        }
    }
}

/// Remove a directory this pull created, if nothing else landed in it.
fn remove_empty_dir(dir: &Path) {
    match fs::remove_dir(dir) {
        Ok(()) => tracing::debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Left {} in place: {}", dir.display(), e),
    }
}
