//! Artifact Model
//!
//! An [`Asset`] is one file known to one repository server. Assets are built
//! from listing responses, enriched once attributes (checksums, maven
//! coordinates) are fetched, and carried through the download/upload chain
//! by value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// Suffixes of files the server regenerates on its own. They are never
/// copied between repositories.
const METADATA_SUFFIXES: &[&str] = &[
    "maven-metadata.xml",
    ".pom",
    ".md5",
    ".sha1",
    ".sha256",
    ".sha512",
];

/// Returns true if `name` matches `((maven-metadata\.xml)|\.(pom|md5|sha1|sha256|sha512))$`.
pub fn is_metadata_file(name: &str) -> bool {
    METADATA_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Digest algorithms advertised by repository servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known digests of an asset, keyed by algorithm. Empty digests are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHashes(BTreeMap<HashAlgorithm, String>);

impl AssetHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a digest. Blank values are ignored.
    pub fn insert(&mut self, algorithm: HashAlgorithm, digest: impl Into<String>) {
        let digest = digest.into();
        let digest = digest.trim();
        if !digest.is_empty() {
            self.0.insert(algorithm, digest.to_ascii_lowercase());
        }
    }

    pub fn with(mut self, algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        self.insert(algorithm, digest);
        self
    }

    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.0.get(&algorithm).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Maven2 coordinates attached to an asset by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenCoordinates {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub base_version: Option<String>,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
}

/// Attribute set returned by a metadata lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetAttributes {
    pub hashes: AssetHashes,
    pub maven: Option<MavenCoordinates>,
}

/// One artifact on one server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Asset {
    name: String,
    id: Option<String>,
    download_url: Option<String>,
    hashes: AssetHashes,
    maven: Option<MavenCoordinates>,
    attributes_loaded: bool,
    staging_path: Option<PathBuf>,
    downloaded: bool,
}

impl Asset {
    /// Create an asset from its server-relative path. A leading `/` is dropped.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim_start_matches('/').to_string();
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Attach attributes at construction time, as listings that embed
    /// checksums and coordinates do.
    pub fn with_attributes(mut self, attributes: AssetAttributes) -> Self {
        self.attach_attributes(attributes);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Server-assigned identifier, required by attribute lookups
    pub fn require_id(&self) -> Result<&str> {
        self.id().ok_or_else(|| self.attribute_missing("id"))
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    /// Diff key and staging basename: the name with `/` replaced by `_`
    pub fn human_readable_name(&self) -> String {
        self.name.replace('/', "_")
    }

    /// File extension of the asset name, without the dot
    pub fn file_extension(&self) -> Option<&str> {
        let basename = self.name.rsplit('/').next()?;
        let (_, ext) = basename.rsplit_once('.')?;
        (!ext.is_empty()).then_some(ext)
    }

    pub fn is_metadata_file(&self) -> bool {
        is_metadata_file(&self.name)
    }

    pub fn hashes(&self) -> &AssetHashes {
        &self.hashes
    }

    pub fn attributes_loaded(&self) -> bool {
        self.attributes_loaded
    }

    pub fn attach_attributes(&mut self, attributes: AssetAttributes) {
        self.hashes = attributes.hashes;
        self.maven = attributes.maven;
        self.attributes_loaded = true;
    }

    /// Maven2 coordinates, or `AttributeMissing` if none were attached
    pub fn maven(&self) -> Result<&MavenCoordinates> {
        self.maven.as_ref().ok_or_else(|| self.attribute_missing("maven2"))
    }

    pub fn group_id(&self) -> Result<&str> {
        self.required_coordinate("groupId", |m| m.group_id.as_deref())
    }

    pub fn artifact_id(&self) -> Result<&str> {
        self.required_coordinate("artifactId", |m| m.artifact_id.as_deref())
    }

    pub fn version(&self) -> Result<&str> {
        self.required_coordinate("version", |m| m.version.as_deref())
    }

    /// Extension from the coordinates, falling back to the file name
    pub fn extension(&self) -> Result<&str> {
        let maven = self.maven()?;
        maven
            .extension
            .as_deref()
            .filter(|ext| !ext.is_empty())
            .or_else(|| self.file_extension())
            .ok_or_else(|| self.attribute_missing("extension"))
    }

    /// Classifier is optional; absent means empty
    pub fn classifier(&self) -> Result<&str> {
        Ok(self.maven()?.classifier.as_deref().unwrap_or(""))
    }

    /// Staging file location for this asset under `root`
    pub fn staging_file(&self, root: &Path) -> PathBuf {
        root.join(self.human_readable_name())
    }

    pub fn staging_path(&self) -> Option<&Path> {
        self.staging_path.as_deref()
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded
    }

    pub fn mark_downloaded(&mut self, path: PathBuf) {
        self.staging_path = Some(path);
        self.downloaded = true;
    }

    /// Drop transfer state and attributes once the staging file is gone
    pub fn release(&mut self) {
        self.staging_path = None;
        self.downloaded = false;
        self.hashes = AssetHashes::default();
        self.maven = None;
        self.attributes_loaded = false;
    }

    fn required_coordinate<'a>(
        &'a self,
        attribute: &'static str,
        field: impl Fn(&'a MavenCoordinates) -> Option<&'a str>,
    ) -> Result<&'a str> {
        field(self.maven()?)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| self.attribute_missing(attribute))
    }

    fn attribute_missing(&self, attribute: &'static str) -> BridgeError {
        BridgeError::AttributeMissing {
            asset: self.name.clone(),
            attribute,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
