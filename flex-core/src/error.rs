//! Error types for asset synchronization.
//!
//! `ApiError` is what the remote collaborator reports; `AssetError` is the
//! closed set of failures a pull or push surfaces to its caller.

use std::path::{Path, PathBuf};

/// Result type for asset operations
pub type Result<T> = std::result::Result<T, AssetError>;

/// Code the server uses when it refuses the bytes of a staged asset.
pub const INVALID_CONTENT_CODE: &str = "asset-invalid-content";

/// Errors reported by the remote API collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Not logged in. Please provide an API key with `flex-cli login`.")]
    NotLoggedIn,

    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid asset content: {detail}")]
    InvalidContent { detail: String },

    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            ApiError::NotLoggedIn => "not-logged-in",
            ApiError::Api { code, .. } => code,
            ApiError::InvalidContent { .. } => INVALID_CONTENT_CODE,
            ApiError::Transport { .. } => "transport-error",
            ApiError::Decode { .. } => "decode-error",
        }
    }
}

/// Errors that abort a pull or push
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {reason}")]
    Validation { path: String, reason: String },

    #[error("Failed to stage {path}: {detail}. Fix the file and push again.")]
    Staging { path: String, detail: String },

    #[error("Invalid asset bundle: {0}")]
    Bundle(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AssetError {
    /// Build an `Io` error tagged with the path being touched.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AssetError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            AssetError::NotADirectory(_) => "not-a-directory",
            AssetError::Io { .. } => "io-error",
            AssetError::Validation { .. } => "validation-error",
            AssetError::Staging { .. } => "staging-error",
            AssetError::Bundle(_) => "invalid-bundle",
            AssetError::Api(e) => e.code(),
        }
    }
}
