//! Nexus Repository connector implementation
//!
//! Implements the `RepositoryClient` trait for Nexus Repository 3.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, MultipartPart, RetryPolicy};
use bridge_traits::repository::{ListingEntry, RepositoryClient};
use bridge_traits::{Asset, AssetAttributes, AssetHashes};
use bytes::Bytes;
use core_runtime::config::{EndpointConfig, ListingMode, MirrorConfig, DEFAULT_RPC_ENDPOINT};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::endpoint::RepositoryEndpoint;
use crate::error::NexusError;
use crate::rpc::RpcClient;
use crate::types::{AssetDetail, AssetsPage, BrowseNode, BrowseParams};

const STATUS_PATH: &str = "/service/rest/v1/status";
const SEARCH_ASSETS_PATH: &str = "/service/rest/v1/search/assets";
const COMPONENTS_PATH: &str = "/service/rest/v1/components";

/// Nexus Repository connector
///
/// Implements `RepositoryClient` for one repository on one Nexus 3 server.
///
/// # Features
///
/// - Paginated asset search with `continuationToken`
/// - Tree browsing through the UI RPC endpoint
/// - Attribute lookup (checksums, maven2 coordinates) through RPC
/// - Streaming downloads into staging files
/// - Multipart component uploads
///
/// # Example
///
/// ```ignore
/// use provider_nexus::NexusConnector;
/// use bridge_traits::repository::RepositoryClient;
///
/// let connector = NexusConnector::from_config(http_client, &config.source, &config)?;
/// connector.check_status().await?;
/// let entries = connector.list_assets(connector.root_node()).await?;
/// ```
pub struct NexusConnector {
    http_client: Arc<dyn HttpClient>,
    endpoint: RepositoryEndpoint,
    mode: ListingMode,
    rpc: RpcClient,
}

impl NexusConnector {
    /// Connector using REST search listings and the default RPC endpoint
    pub fn new(http_client: Arc<dyn HttpClient>, endpoint: RepositoryEndpoint) -> Self {
        let rpc = RpcClient::new(&endpoint, DEFAULT_RPC_ENDPOINT);
        Self {
            http_client,
            endpoint,
            mode: ListingMode::Search,
            rpc,
        }
    }

    /// Parse `endpoint` and apply the listing settings of `config`
    pub fn from_config(
        http_client: Arc<dyn HttpClient>,
        endpoint: &EndpointConfig,
        config: &MirrorConfig,
    ) -> crate::Result<Self> {
        let endpoint = RepositoryEndpoint::parse(endpoint)?;
        Ok(Self::new(http_client, endpoint)
            .with_listing_mode(config.listing_mode)
            .with_rpc_endpoint(&config.rpc_endpoint))
    }

    pub fn with_listing_mode(mut self, mode: ListingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rpc_endpoint(mut self, path: &str) -> Self {
        self.rpc = RpcClient::new(&self.endpoint, path);
        self
    }

    pub fn endpoint(&self) -> &RepositoryEndpoint {
        &self.endpoint
    }

    /// Ask the server whether it is ready to serve requests
    ///
    /// Startup probes are retried with backoff; per-job calls are retried by
    /// the dispatcher instead.
    #[instrument(skip(self), fields(server = %self.endpoint.base_url()))]
    pub async fn check_status(&self) -> Result<()> {
        let request = self.authorized(HttpRequest::new(HttpMethod::Get, self.endpoint.url(STATUS_PATH)));
        self.http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?
            .error_for_status("status check")?;

        info!("Nexus server is available");
        Ok(())
    }

    /// Attach basic auth when credentials are known
    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        match self.endpoint.credentials() {
            Some((username, password)) => request.basic_auth(username, password),
            None => request,
        }
    }

    fn search_url(&self, continuation_token: Option<&str>) -> String {
        let mut url = format!(
            "{}?repository={}",
            self.endpoint.url(SEARCH_ASSETS_PATH),
            urlencoding::encode(self.endpoint.repository())
        );
        if let Some(token) = continuation_token {
            url.push_str("&continuationToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    /// Walk every page of the search API
    ///
    /// The search API has no notion of nodes: the whole repository comes
    /// back flat, so only the starting node triggers a search.
    async fn search_assets(&self, node: &str) -> Result<Vec<ListingEntry>> {
        if node != self.endpoint.root_node() {
            debug!(node, "Search listing ignores nested nodes");
            return Ok(Vec::new());
        }

        let prefix = match self.endpoint.root_node() {
            "/" => None,
            root => Some(format!("{}/", root.trim_end_matches('/'))),
        };

        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let url = self.search_url(continuation_token.as_deref());
            let request = self.authorized(HttpRequest::new(HttpMethod::Get, url).accept_json());
            let response = self
                .http_client
                .execute(request)
                .await?
                .error_for_status(&format!("search assets in {}", self.endpoint.repository()))?;

            let page: AssetsPage = response.json()?;
            let items = page.items.ok_or_else(|| {
                BridgeError::Malformed(format!(
                    "search page {} of {} has no items",
                    pages + 1,
                    self.endpoint.repository()
                ))
            })?;
            pages += 1;

            let page_len = items.len();
            entries.extend(
                items
                    .into_iter()
                    .filter(|item| {
                        prefix
                            .as_deref()
                            .map_or(true, |p| item.path.trim_start_matches('/').starts_with(p))
                    })
                    .map(|item| ListingEntry::Asset(Asset::from(item))),
            );
            debug!(page = pages, page_len, total = entries.len(), "Parsed search page");

            match page.continuation_token.filter(|t| !t.is_empty()) {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        info!(count = entries.len(), pages, "Listed repository assets");
        Ok(entries)
    }

    /// Read the children of one node of the browse tree
    async fn browse_node(&self, node: &str) -> Result<Vec<ListingEntry>> {
        let params = vec![BrowseParams {
            node: node.to_string(),
            repository_name: self.endpoint.repository().to_string(),
        }];

        let children: Vec<BrowseNode> = self
            .rpc
            .call(self.http_client.as_ref(), &self.endpoint, "coreui_Browse", "read", params)
            .await?
            .unwrap_or_default();

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            match child.kind.as_str() {
                "folder" | "component" => entries.push(ListingEntry::Node { id: child.id }),
                "asset" => {
                    let mut asset = Asset::new(child.id);
                    if let Some(asset_id) = child.asset_id.filter(|id| !id.is_empty()) {
                        asset = asset.with_id(asset_id);
                    }
                    entries.push(ListingEntry::Asset(asset));
                }
                other => warn!(id = %child.id, kind = other, "Skipping unknown browse entry"),
            }
        }

        debug!(node, count = entries.len(), "Browsed node");
        Ok(entries)
    }

    async fn read_asset(&self, asset: &Asset) -> Result<AssetAttributes> {
        let asset_id = asset.require_id()?;
        let detail: Option<AssetDetail> = self
            .rpc
            .call(
                self.http_client.as_ref(),
                &self.endpoint,
                "coreui_Component",
                "readAsset",
                [asset_id, self.endpoint.repository()],
            )
            .await?;

        let attributes = detail
            .and_then(|d| d.attributes)
            .ok_or_else(|| NexusError::UnexpectedResponse(format!("no attributes for {}", asset.name())))?;
        Ok(attributes.into())
    }

    fn download_url(&self, asset: &Asset) -> String {
        match asset.download_url() {
            Some(url) => url.to_string(),
            None => self
                .endpoint
                .url(&format!("repository/{}/{}", self.endpoint.repository(), asset.name())),
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}?repository={}",
            self.endpoint.url(COMPONENTS_PATH),
            urlencoding::encode(self.endpoint.repository())
        )
    }
}

#[async_trait]
impl RepositoryClient for NexusConnector {
    fn repository(&self) -> &str {
        self.endpoint.repository()
    }

    fn root_node(&self) -> &str {
        self.endpoint.root_node()
    }

    #[instrument(skip(self), fields(repository = %self.endpoint.repository()))]
    async fn list_assets(&self, node: &str) -> Result<Vec<ListingEntry>> {
        match self.mode {
            ListingMode::Search => self.search_assets(node).await,
            ListingMode::Browse => self.browse_node(node).await,
        }
    }

    #[instrument(skip(self, asset), fields(asset = %asset.name()))]
    async fn fetch_asset_info(&self, asset: &mut Asset) -> Result<()> {
        let attributes = self.read_asset(asset).await?;
        asset.attach_attributes(attributes);
        debug!(hashes = asset.hashes().len(), "Attached asset attributes");
        Ok(())
    }

    async fn fetch_asset_hashes(&self, asset: &Asset) -> Result<AssetHashes> {
        if asset.attributes_loaded() {
            return Ok(asset.hashes().clone());
        }
        Ok(self.read_asset(asset).await?.hashes)
    }

    #[instrument(skip(self, asset), fields(asset = %asset.name()))]
    async fn download(&self, asset: &Asset, destination: &Path) -> Result<()> {
        let request = self.authorized(HttpRequest::new(HttpMethod::Get, self.download_url(asset)));
        let mut body = self.http_client.download_stream(request).await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let written = tokio::io::copy(&mut body, &mut file).await?;
        file.flush().await?;

        debug!(bytes = written, path = %destination.display(), "Downloaded asset");
        Ok(())
    }

    #[instrument(skip(self, source, asset), fields(asset = %asset.name()))]
    async fn upload(&self, source: &Path, asset: &Asset) -> Result<()> {
        let group_id = asset.group_id()?;
        let artifact_id = asset.artifact_id()?;
        let version = asset.version()?;
        let extension = asset.extension()?;
        let classifier = asset.classifier()?;

        let data = Bytes::from(tokio::fs::read(source).await?);
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| asset.human_readable_name());

        let parts = vec![
            MultipartPart::file("asset0", file_name, data),
            MultipartPart::text("asset0.classifier", classifier),
            MultipartPart::text("asset0.extension", extension),
            MultipartPart::text("groupId", group_id),
            MultipartPart::text("artifactId", artifact_id),
            MultipartPart::text("version", version),
            MultipartPart::text("generate-pom", "on"),
        ];

        let request = self.authorized(
            HttpRequest::new(HttpMethod::Post, self.upload_url())
                .accept_json()
                .multipart(parts),
        );
        self.http_client
            .execute(request)
            .await?
            .error_for_status(&format!("upload {}", asset.name()))?;

        debug!("Uploaded asset");
        Ok(())
    }
}

impl std::fmt::Debug for NexusConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusConnector")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("rpc", &self.rpc.url())
            .finish_non_exhaustive()
    }
}
