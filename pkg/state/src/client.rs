use async_trait::async_trait;
use pkg_constants::state::{ETCD_KEY_NOT_FOUND, ETCD_KEYS_PREFIX, STORE_REQUEST_TIMEOUT_MS};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key-value store holding the proxy configuration.
///
/// Keys are `/`-separated paths. Writes overwrite unconditionally; there is
/// no compare-and-swap.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Retrieve the value for a key, or `None` if it does not exist.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Delete `key` (and everything below it when `recursive`).
    /// Returns `false` when nothing existed at `key`.
    async fn delete(&self, key: &str, recursive: bool) -> anyhow::Result<bool>;

    /// Full keys of the immediate children of `dir`. A missing directory is empty.
    async fn list(&self, dir: &str) -> anyhow::Result<Vec<String>>;
}

// --- etcd v2 wire format ---

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    #[serde(default)]
    node: Option<EtcdNode>,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

#[derive(Debug, Deserialize)]
struct EtcdError {
    #[serde(rename = "errorCode")]
    error_code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

impl std::fmt::Display for EtcdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "etcd error {}: {}", self.error_code, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

/// Config store backed by the etcd v2 keys API, the layout vulcand reads.
#[derive(Clone)]
pub struct EtcdStore {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

impl EtcdStore {
    /// Build a client for a comma-separated list of etcd endpoints.
    /// Requests go to the first endpoint that answers.
    pub fn new(endpoints: &str) -> anyhow::Result<Self> {
        let endpoints: Vec<String> = endpoints
            .split(',')
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(anyhow::anyhow!("No etcd endpoints configured"));
        }
        for endpoint in &endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "etcd endpoint '{}' must start with http:// or https://",
                    endpoint
                ));
            }
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(STORE_REQUEST_TIMEOUT_MS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build etcd HTTP client: {}", e))?;

        info!("etcd config store at {}", endpoints.join(","));
        Ok(Self { http, endpoints })
    }

    fn key_url(endpoint: &str, key: &str) -> String {
        format!("{}{}{}", endpoint, ETCD_KEYS_PREFIX, key)
    }

    /// Send a request built per endpoint, failing over on transport errors.
    async fn send<F>(&self, build: F) -> anyhow::Result<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            match build(endpoint).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!("etcd endpoint {} unavailable: {}", endpoint, e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(anyhow::anyhow!("All etcd endpoints failed: {}", e)),
            None => Err(anyhow::anyhow!("No etcd endpoints configured")),
        }
    }

    /// Accept a non-success response only when etcd reports the key as missing.
    async fn expect_not_found(resp: reqwest::Response) -> anyhow::Result<()> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<EtcdError>(&body) {
            Ok(err) if status == StatusCode::NOT_FOUND && err.error_code == ETCD_KEY_NOT_FOUND => {
                Ok(())
            }
            Ok(err) => Err(anyhow::anyhow!("{}", err)),
            Err(_) => Err(anyhow::anyhow!("etcd returned {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl ConfigStore for EtcdStore {
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let resp = self
            .send(|ep| {
                self.http
                    .put(Self::key_url(ep, key))
                    .form(&[("value", value)])
            })
            .await?;
        if resp.status().is_success() {
            debug!("etcd set {}", key);
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<EtcdError>(&body) {
            Ok(err) => Err(anyhow::anyhow!("etcd set {} failed: {}", key, err)),
            Err(_) => Err(anyhow::anyhow!("etcd set {} failed: {} {}", key, status, body)),
        }
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let resp = self.send(|ep| self.http.get(Self::key_url(ep, key))).await?;
        if !resp.status().is_success() {
            Self::expect_not_found(resp).await?;
            return Ok(None);
        }
        let body: EtcdResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Malformed etcd response for {}: {}", key, e))?;
        Ok(body.node.and_then(|n| n.value))
    }

    async fn delete(&self, key: &str, recursive: bool) -> anyhow::Result<bool> {
        let resp = self
            .send(|ep| {
                let mut url = Self::key_url(ep, key);
                if recursive {
                    url.push_str("?recursive=true");
                }
                self.http.delete(url)
            })
            .await?;
        if resp.status().is_success() {
            debug!("etcd delete {}", key);
            return Ok(true);
        }
        Self::expect_not_found(resp).await?;
        Ok(false)
    }

    async fn list(&self, dir: &str) -> anyhow::Result<Vec<String>> {
        let resp = self.send(|ep| self.http.get(Self::key_url(ep, dir))).await?;
        if !resp.status().is_success() {
            Self::expect_not_found(resp).await?;
            return Ok(Vec::new());
        }
        let body: EtcdResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Malformed etcd response for {}: {}", dir, e))?;
        Ok(match body.node {
            Some(node) if node.dir => node.nodes.into_iter().map(|n| n.key).collect(),
            _ => Vec::new(),
        })
    }
}
