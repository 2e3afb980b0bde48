//! `fetch`-backed asset retrieval collaborator.

use async_trait::async_trait;
use starpath_game::AssetFetcher;
use thiserror::Error;

use crate::dom::{fetch_bytes, js_error_message};

/// Errors surfaced by the browser fetch backend.
#[derive(Debug, Error)]
pub enum WebFetchError {
    #[error("network error: {0}")]
    Network(String),
}

/// Asset fetcher over the browser `fetch` API.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebAssetFetcher;

impl WebAssetFetcher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl AssetFetcher for WebAssetFetcher {
    type Error = WebFetchError;

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, Self::Error> {
        fetch_bytes(uri)
            .await
            .map_err(|err| WebFetchError::Network(js_error_message(&err)))
    }
}
