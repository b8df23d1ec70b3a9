//! Pre-flight validation of local assets.

use crate::error::{AssetError, Result};
use crate::scan::LocalAsset;

/// Whether an asset is JSON-like. JSON assets are validated before a push
/// and always sent inline rather than staged.
pub fn is_json_asset(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("json"))
}

/// Fail on the first JSON asset that does not parse.
pub fn validate_json_assets(assets: &[LocalAsset]) -> Result<()> {
    for asset in assets.iter().filter(|a| is_json_asset(&a.path)) {
        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&asset.data) {
            return Err(AssetError::Validation {
                path: asset.path.clone(),
                reason: e.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json_asset() {
        assert!(is_json_asset("content/translations.json"));
        assert!(is_json_asset("A.JSON"));
        assert!(!is_json_asset("images/logo.png"));
        assert!(!is_json_asset("json"));
        assert!(!is_json_asset("dir.json/file"));
    }

    #[test]
    fn test_valid_json_passes() {
        let assets = vec![
            LocalAsset::new("a.json", br#"{"a": [1, 2]}"#.to_vec()),
            LocalAsset::new("b.png", vec![0x89, 0x50]),
        ];
        assert!(validate_json_assets(&assets).is_ok());
    }

    #[test]
    fn test_invalid_json_names_path() {
        let assets = vec![
            LocalAsset::new("ok.json", b"[]".to_vec()),
            LocalAsset::new("content/bad.json", b"{\"a\": ".to_vec()),
        ];
        match validate_json_assets(&assets) {
            Err(AssetError::Validation { path, .. }) => assert_eq!(path, "content/bad.json"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_json_file_is_invalid() {
        let assets = vec![LocalAsset::new("empty.json", Vec::new())];
        assert!(validate_json_assets(&assets).is_err());
    }
}
