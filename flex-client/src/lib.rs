//! Flex Client Library
//!
//! HTTP implementation of `flex_core::AssetApi` against the Build API:
//! - Bearer authentication with a marketplace API key
//! - JSON envelope decoding and error-body mapping
//! - Multipart encoding of stage and push requests
//! - Streaming of archive pull responses into a blocking reader

pub mod config;
pub mod remote;
pub mod stream;
pub mod wire;

pub use config::{ClientConfig, ConfigError};
pub use remote::AssetClient;
pub use stream::ProgressFn;
