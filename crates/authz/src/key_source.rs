use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;

use crate::error::KeySourceError;

/// Where the published signing keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeySourceError>;
}

/// Fetches the key set from the identity provider's certs endpoint.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    uri: String,
}

impl HttpKeySource {
    /// Every fetch, connect included, gives up after `timeout`.
    pub fn new(uri: impl Into<String>, timeout: Duration) -> Result<Self, KeySourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            uri: uri.into(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeySourceError> {
        tracing::debug!(uri = %self.uri, "fetching signing keys");

        let keys = self
            .client
            .get(&self.uri)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;

        tracing::info!(uri = %self.uri, keys = keys.keys.len(), "signing keys fetched");
        Ok(keys)
    }
}

/// Serves a fixed key set and counts how often it was asked.
#[derive(Debug)]
pub struct StaticKeySource {
    keys: JwkSet,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeySourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.clone())
    }
}
