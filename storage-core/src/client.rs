use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Client for the storage resources API. Every call is a bearer-authenticated
/// GET that answers with JSON.
#[derive(Clone)]
pub struct StorageClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl StorageClient {
    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, StorageError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Shared HTTP client, reused by transports that stream bodies to links
    /// handed out by this API.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Metadata of the stored object at `path`.
    pub async fn get_resource(&self, path: &str) -> Result<Resource, StorageError> {
        self.get_json("/v1/storage/resources", &[("path", path)])
            .await
    }

    pub async fn get_upload_link(
        &self,
        path: &str,
        overwrite: bool,
    ) -> Result<TransferLink, StorageError> {
        let overwrite = if overwrite { "true" } else { "false" };
        self.get_json(
            "/v1/storage/resources/upload",
            &[("path", path), ("overwrite", overwrite)],
        )
        .await
    }

    pub async fn get_download_link(&self, path: &str) -> Result<TransferLink, StorageError> {
        self.get_json("/v1/storage/resources/download", &[("path", path)])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StorageError> {
        let mut url = self.base_url.join(endpoint)?;
        url.query_pairs_mut().extend_pairs(query);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api { status, body });
        }
        Ok(response.json::<T>().await?)
    }
}

#[derive(Debug, Deserialize)]
pub struct Resource {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferLink {
    pub href: Url,
}
