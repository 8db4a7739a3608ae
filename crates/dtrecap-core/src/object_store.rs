//! Key-addressed blob store boundary.
//!
//! The pipeline only ever needs four operations: `get`, `put`, `list`,
//! `exists`. All four surface transient failure through [`StoreError`]
//! instead of panicking, so callers can degrade (skip caching, assume an
//! output needs reprocessing) rather than abort a run.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StoreError;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Async object store contract shared by the cache and the orchestrator.
pub trait ObjectStore: Send + Sync {
    /// Fetch an object body. `Ok(None)` means the key does not exist,
    /// which is not an error for this system.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Write an object, replacing any existing content.
    fn put<'a>(&'a self, key: &'a str, body: String, content_type: &'a str)
        -> StoreFuture<'a, ()>;

    /// List keys under a prefix, up to `max_results` when given.
    fn list<'a>(&'a self, prefix: &'a str, max_results: Option<usize>)
        -> StoreFuture<'a, Vec<String>>;

    /// Probe whether a key exists without fetching its body.
    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;
}

/// Production store speaking plain HTTP to a blob server.
///
/// Layout: `GET {base}/{key}` fetches, `PUT {base}/{key}` writes,
/// `HEAD {base}/{key}` probes, and `GET {base}/?list={prefix}` returns a
/// JSON array of keys.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Arc<reqwest::Client>,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("dtrecap/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn classify(error: &reqwest::Error) -> StoreError {
        if error.is_timeout() {
            StoreError::transport(format!("request timeout: {error}"))
        } else if error.is_connect() {
            StoreError::transport(format!("connection failed: {error}"))
        } else {
            StoreError::transport(format!("request failed: {error}"))
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.object_url(key))
                .send()
                .await
                .map_err(|e| Self::classify(&e))?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(StoreError::Status {
                    status: status.as_u16(),
                    key: key.to_string(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| StoreError::transport(format!("failed to read body: {e}")))?;
            Ok(Some(body))
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        body: String,
        content_type: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let response = self
                .client
                .put(self.object_url(key))
                .header("content-type", content_type)
                .body(body)
                .send()
                .await
                .map_err(|e| Self::classify(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(StoreError::Status {
                    status: status.as_u16(),
                    key: key.to_string(),
                });
            }
            Ok(())
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        max_results: Option<usize>,
    ) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let response = self
                .client
                .get(format!("{}/?list={}", self.base_url, prefix))
                .send()
                .await
                .map_err(|e| Self::classify(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(StoreError::Status {
                    status: status.as_u16(),
                    key: prefix.to_string(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| StoreError::transport(format!("failed to read listing: {e}")))?;
            let mut keys: Vec<String> = serde_json::from_str(&body)
                .map_err(|e| StoreError::BadListing(e.to_string()))?;
            if let Some(max) = max_results {
                keys.truncate(max);
            }
            Ok(keys)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let response = self
                .client
                .head(self.object_url(key))
                .send()
                .await
                .map_err(|e| Self::classify(&e))?;
            Ok(response.status().is_success())
        })
    }
}

/// In-memory store for deterministic offline tests.
///
/// Fault switches let tests exercise the degraded paths: a failing `get`
/// must read as "absent", a failing `exists` must read as "needs
/// processing".
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: tokio::sync::RwLock<HashMap<String, String>>,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    fail_exists: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, body: impl Into<String>) {
        self.objects.write().await.insert(key.into(), body.into());
    }

    pub async fn contents(&self, key: &str) -> Option<String> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn key_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            if self.fail_gets.load(Ordering::SeqCst) {
                return Err(StoreError::transport("injected get failure"));
            }
            Ok(self.objects.read().await.get(key).cloned())
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        body: String,
        _content_type: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(StoreError::transport("injected put failure"));
            }
            self.objects.write().await.insert(key.to_string(), body);
            Ok(())
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        max_results: Option<usize>,
    ) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let objects = self.objects.read().await;
            let mut keys: Vec<String> = objects
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            if let Some(max) = max_results {
                keys.truncate(max);
            }
            Ok(keys)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            if self.fail_exists.load(Ordering::SeqCst) {
                return Err(StoreError::transport("injected exists failure"));
            }
            Ok(self.objects.read().await.contains_key(key))
        })
    }
}
