use crate::SpendEntry;
use indexmap::IndexMap;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Collection holding every spend record.
pub const COLLECTION: &str = "spends";

/// Key-value store holding spend records under `spends/{key}`.
pub trait SpendStore: Send + Sync {
    /// Writes `entry` under `key`, replacing whatever was there.
    fn put(
        &self,
        key: &str,
        entry: &SpendEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Single snapshot read of the whole collection, in store order.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<SpendEntry>, StoreError>> + Send;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid url: {0}")]
    Url(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote store responded with {status}: {message}")]
    Status { status: StatusCode, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for a Firebase Realtime Database style REST endpoint.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    base_url: Url,
    auth: Option<String>,
    http: reqwest::Client,
}

impl RemoteStore {
    pub fn new(base_url: &str, auth: Option<String>) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url).map_err(|err| StoreError::Url(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Url(format!("{base_url} cannot be a base")));
        }
        // `Url::join` replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            auth,
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|err| StoreError::Url(err.to_string()))?;
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }

    async fn error_for(res: reqwest::Response) -> StoreError {
        let status = res.status();
        let message = match res.text().await {
            Ok(body) => serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error)
                .unwrap_or(body),
            Err(_) => "unknown error".to_string(),
        };
        StoreError::Status { status, message }
    }
}

impl SpendStore for RemoteStore {
    async fn put(&self, key: &str, entry: &SpendEntry) -> Result<(), StoreError> {
        let endpoint = self.endpoint(&format!("{COLLECTION}/{key}.json"))?;
        tracing::debug!(%endpoint, "PUT entry");

        let res = self.http.put(endpoint).json(entry).send().await?;
        if res.status().is_success() {
            return Ok(());
        }
        Err(Self::error_for(res).await)
    }

    async fn fetch_all(&self) -> Result<Vec<SpendEntry>, StoreError> {
        let endpoint = self.endpoint(&format!("{COLLECTION}.json"))?;
        tracing::debug!(%endpoint, "GET collection");

        let res = self.http.get(endpoint).send().await?;
        if !res.status().is_success() {
            return Err(Self::error_for(res).await);
        }

        // An empty collection comes back as `null`.
        let records = res
            .json::<Option<IndexMap<String, SpendEntry>>>()
            .await?
            .unwrap_or_default();
        Ok(records.into_values().collect())
    }
}

/// In-process store with the same overwrite-by-key semantics as the remote one.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<String, SpendEntry>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Number of `put` calls seen so far, including overwrites.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> BTreeMap<String, SpendEntry> {
        self.records.read().await.clone()
    }
}

impl SpendStore for MemoryStore {
    async fn put(&self, key: &str, entry: &SpendEntry) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<SpendEntry>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
