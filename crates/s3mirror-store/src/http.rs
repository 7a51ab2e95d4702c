//! HTTP adapter for an object-store admin API.
//!
//! Talks to a cluster's admin endpoint over plain REST. Object keys go
//! in a query parameter rather than the path so keys containing `/`
//! need no special encoding.

use crate::api::{ChangeRecord, ObjectEntry, ObjectStat, ObjectStore, StoreError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use url::Url;

/// HTTP store configuration.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the store admin API (e.g. <http://127.0.0.1:9000>)
    pub endpoint: String,
    /// Access key for basic authentication
    pub access_key: String,
    /// Secret key for basic authentication
    pub secret_key: String,
    /// Request timeout for control/data calls
    pub timeout: Duration,
    /// Server-side hold time for the notification long poll
    pub poll_wait: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio".to_string(),
            timeout: Duration::from_secs(30),
            poll_wait: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the store admin API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
    config: HttpStoreConfig,
}

impl HttpStore {
    /// Create a new store client.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.endpoint)
            .map_err(|e| StoreError::Init(format!("{}: {e}", config.endpoint)))?;

        match base.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(StoreError::Init(format!(
                    "{}: unsupported scheme '{scheme}'",
                    config.endpoint
                )));
            }
        }

        // The long poll must outlive the regular request timeout.
        let client = Client::builder()
            .timeout(config.timeout + config.poll_wait)
            .build()
            .map_err(|e| StoreError::Init(e.to_string()))?;

        Ok(Self {
            client,
            base,
            config,
        })
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|e| StoreError::Request(format!("{path}: {e}")))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.access_key, Some(&self.config.secret_key))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(StoreError::Api {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let url = self.url("/v1/buckets")?;
        tracing::debug!(%url, "GET buckets");

        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectEntry>, StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/objects"))?;
        tracing::debug!(bucket, prefix, "GET object listing");

        let response = self
            .authed(self.client.get(url).query(&[("prefix", prefix)]))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectStat>, StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/object/stat"))?;
        tracing::debug!(bucket, key, "GET object stat");

        let response = self
            .authed(self.client.get(url).query(&[("key", key)]))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::check(response)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/object"))?;
        tracing::debug!(bucket, key, "GET object");

        let response = self
            .authed(self.client.get(url).query(&[("key", key)]))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/object"))?;
        tracing::debug!(bucket, key, size = body.len(), "PUT object");

        let response = self
            .authed(
                self.client
                    .put(url)
                    .query(&[("key", key)])
                    .header("Content-Type", "application/octet-stream")
                    .body(body),
            )
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/object"))?;
        tracing::debug!(bucket, key, "DELETE object");

        let response = self
            .authed(self.client.delete(url).query(&[("key", key)]))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        // Deleting an absent object is a no-op.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Self::check(response).await.map(|_| ())
    }

    async fn export_iam(&self) -> Result<Vec<u8>, StoreError> {
        let url = self.url("/v1/iam/export")?;
        tracing::debug!("GET IAM export");

        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn import_iam(&self, blob: &[u8]) -> Result<(), StoreError> {
        let url = self.url("/v1/iam/import")?;
        tracing::debug!(size = blob.len(), "PUT IAM import");

        let response = self
            .authed(self.client.put(url).body(blob.to_vec()))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn export_bucket_metadata(&self, bucket: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/metadata/export"))?;
        tracing::debug!(bucket, "GET bucket metadata export");

        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn import_bucket_metadata(
        &self,
        bucket: &str,
        blob: &[u8],
    ) -> Result<(), StoreError> {
        let url = self.url(&format!("/v1/buckets/{bucket}/metadata/import"))?;
        tracing::debug!(bucket, size = blob.len(), "PUT bucket metadata import");

        let response = self
            .authed(self.client.put(url).body(blob.to_vec()))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn next_events(&self) -> Result<Vec<ChangeRecord>, StoreError> {
        let url = self.url("/v1/events")?;
        let wait = self.config.poll_wait.as_secs().to_string();

        let response = self
            .authed(self.client.get(url).query(&[("wait", wait.as_str())]))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        // An empty batch on long-poll timeout is normal.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }
}
