//! Nexus API payload types
//!
//! Data structures for the REST search API and the UI RPC (Ext.Direct) endpoint.

use bridge_traits::{Asset, AssetAttributes, AssetHashes, HashAlgorithm, MavenCoordinates};
use serde::{Deserialize, Serialize};

// ============================================================================
// REST
// ============================================================================

/// One page of `GET /service/rest/v1/search/assets`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsPage {
    /// `None` when the server answered `items: null`
    pub items: Option<Vec<AssetItem>>,

    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// Asset as returned by the search API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetItem {
    pub path: String,
    pub id: String,

    #[serde(default)]
    pub download_url: Option<String>,

    #[serde(default)]
    pub repository: Option<String>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub checksum: Option<Checksums>,

    #[serde(default)]
    pub maven2: Option<MavenCoordinates>,
}

impl From<AssetItem> for Asset {
    fn from(item: AssetItem) -> Self {
        let mut asset = Asset::new(item.path).with_id(item.id);
        if let Some(url) = item.download_url.filter(|u| !u.is_empty()) {
            asset = asset.with_download_url(url);
        }
        asset.with_attributes(AssetAttributes {
            hashes: item.checksum.map(AssetHashes::from).unwrap_or_default(),
            maven: item.maven2,
        })
    }
}

/// Digest map shared by REST items and RPC asset attributes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Checksums {
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub sha512: Option<String>,
}

impl From<Checksums> for AssetHashes {
    fn from(checksums: Checksums) -> Self {
        let mut hashes = AssetHashes::new();
        let pairs = [
            (HashAlgorithm::Md5, checksums.md5),
            (HashAlgorithm::Sha1, checksums.sha1),
            (HashAlgorithm::Sha256, checksums.sha256),
            (HashAlgorithm::Sha512, checksums.sha512),
        ];
        for (algorithm, digest) in pairs {
            if let Some(digest) = digest {
                hashes.insert(algorithm, digest);
            }
        }
        hashes
    }
}

// ============================================================================
// RPC
// ============================================================================

/// Ext.Direct request envelope
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<T: Serialize> {
    pub action: String,
    pub method: String,
    pub data: T,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tid: u64,
}

/// Ext.Direct response envelope
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RpcResponse<T> {
    #[serde(default)]
    pub tid: Option<u64>,

    #[serde(default)]
    pub result: Option<RpcResult<T>>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default, rename = "serverException")]
    pub server_exception: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RpcResult<T> {
    #[serde(default)]
    pub success: bool,

    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// `coreui_Browse.read` parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseParams {
    pub node: String,
    pub repository_name: String,
}

/// One child in a browse tree
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseNode {
    pub id: String,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub asset_id: Option<String>,
}

/// `coreui_Component.readAsset` result
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDetail {
    #[serde(default)]
    pub attributes: Option<AssetDetailAttributes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetDetailAttributes {
    #[serde(default)]
    pub checksum: Option<Checksums>,

    #[serde(default)]
    pub maven2: Option<MavenCoordinates>,
}

impl From<AssetDetailAttributes> for AssetAttributes {
    fn from(attributes: AssetDetailAttributes) -> Self {
        AssetAttributes {
            hashes: attributes.checksum.map(AssetHashes::from).unwrap_or_default(),
            maven: attributes.maven2,
        }
    }
}
