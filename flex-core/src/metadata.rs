//! Asset metadata persisted under the tracked directory.
//!
//! Stored at `<root>/.flex-cli/asset-meta.edn` as
//! `{:version "..." :assets [{:path "..." :content-hash "..."} ...]}`.
//! A missing or unreadable file means "no prior state", never an error.

use crate::edn::{self, EdnError, Value};
use crate::error::{AssetError, Result};
use crate::scan::META_DIR;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata file name inside the metadata directory.
pub const META_FILE: &str = "asset-meta.edn";

/// Base version sent on the first push, when no metadata exists yet.
pub const NO_VERSION: &str = "nil";

/// One tracked file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssetRecord {
    pub path: String,
    pub content_hash: String,
}

impl AssetRecord {
    pub fn new(path: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// The version a tree was last synced at, and the files it held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub version: String,
    pub assets: Vec<AssetRecord>,
}

impl AssetMetadata {
    /// Create metadata, keeping one record per path (last one wins) sorted by path.
    pub fn new(version: impl Into<String>, assets: impl IntoIterator<Item = AssetRecord>) -> Self {
        let unique: BTreeMap<String, AssetRecord> = assets
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();
        Self {
            version: version.into(),
            assets: unique.into_values().collect(),
        }
    }

    /// Path of the metadata file for a tracked directory.
    pub fn file_path(root: &Path) -> PathBuf {
        root.join(META_DIR).join(META_FILE)
    }

    /// Load metadata for `root`. Absent or unparseable files yield `None`.
    pub fn read(root: &Path) -> Option<Self> {
        let path = Self::file_path(root);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable asset metadata {}: {}", path.display(), e);
                return None;
            }
        };
        match Self::from_edn(&data) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!("Ignoring malformed asset metadata {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Replace the metadata file for `root` atomically.
    pub fn write(&self, root: &Path) -> Result<()> {
        let path = Self::file_path(root);
        let dir = root.join(META_DIR);
        fs::create_dir_all(&dir).map_err(|e| AssetError::io(&dir, e))?;
        let tmp_path = path.with_extension("edn.tmp");
        fs::write(&tmp_path, self.to_edn()).map_err(|e| AssetError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| AssetError::io(&path, e))?;
        tracing::debug!("Wrote asset metadata for version {} to {}", self.version, path.display());
        Ok(())
    }

    /// Look up the record for a path.
    pub fn record(&self, path: &str) -> Option<&AssetRecord> {
        self.assets.iter().find(|r| r.path == path)
    }

    /// Parse the EDN form. The version key may also be `aliased-version`.
    pub fn from_edn(src: &str) -> std::result::Result<Self, EdnError> {
        let value = edn::parse(src)?;
        let invalid = |message: &str| EdnError {
            message: message.to_string(),
            offset: 0,
        };
        if !matches!(value, Value::Map(_)) {
            return Err(invalid("asset metadata must be a map"));
        }

        let version = value
            .get("version")
            .or_else(|| value.get("aliased-version"))
            .and_then(version_string)
            .ok_or_else(|| invalid("asset metadata has no version"))?;

        let mut records = Vec::new();
        if let Some(assets) = value.get("assets") {
            let items = assets
                .as_seq()
                .ok_or_else(|| invalid(":assets must be a collection"))?;
            for item in items {
                let path = item.get("path").and_then(Value::as_str);
                let hash = item.get("content-hash").and_then(Value::as_str);
                match (path, hash) {
                    (Some(path), Some(hash)) => records.push(AssetRecord::new(path, hash)),
                    _ => return Err(invalid("asset entry needs :path and :content-hash")),
                }
            }
        }

        Ok(Self::new(version, records))
    }

    /// Serialize to EDN, one asset per line.
    pub fn to_edn(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{{:version {}", Value::String(self.version.clone()));
        if self.assets.is_empty() {
            out.push_str("\n :assets []}\n");
            return out;
        }
        out.push_str("\n :assets\n [");
        for (i, record) in self.assets.iter().enumerate() {
            if i > 0 {
                out.push_str("\n  ");
            }
            let _ = write!(
                out,
                "{{:path {}, :content-hash {}}}",
                Value::String(record.path.clone()),
                Value::String(record.content_hash.clone()),
            );
        }
        out.push_str("]}\n");
        out
    }
}

fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Keyword(k) | Value::Symbol(k) => Some(k.clone()),
        _ => None,
    }
}
