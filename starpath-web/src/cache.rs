//! Cache API-backed generation-keyed bulk storage.
//!
//! Each generation maps to one named browser cache
//! (`starpath-assets-<generation>`), so opening a new generation never
//! disturbs the previous one and dropping a generation is a single
//! `caches.delete`.

use async_trait::async_trait;
use starpath_game::CacheStore;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Cache, CacheStorage, Response};

use crate::dom::{js_error_message, window};

const CACHE_PREFIX: &str = "starpath-assets";

/// Errors surfaced by the browser cache backend.
#[derive(Debug, Error)]
pub enum WebCacheError {
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation failed: {0}")]
    Backend(String),
}

fn backend(err: JsValue) -> WebCacheError {
    WebCacheError::Backend(js_error_message(&err))
}

/// Bulk asset store over the browser Cache API.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebCacheStore;

impl WebCacheStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn caches() -> Result<CacheStorage, WebCacheError> {
        window()
            .caches()
            .map_err(|err| WebCacheError::Unavailable(js_error_message(&err)))
    }

    fn cache_name(generation: &str) -> String {
        format!("{CACHE_PREFIX}-{generation}")
    }

    fn generation_from_name(name: &str) -> Option<String> {
        name.strip_prefix(CACHE_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .map(ToString::to_string)
    }

    #[allow(clippy::future_not_send)] // Wasm futures rely on `JsFuture`, which is not `Send`.
    async fn open(generation: &str) -> Result<Cache, WebCacheError> {
        let caches = Self::caches()?;
        let cache_value = JsFuture::from(caches.open(&Self::cache_name(generation)))
            .await
            .map_err(backend)?;
        cache_value
            .dyn_into::<Cache>()
            .map_err(|err| WebCacheError::Backend(js_error_message(&err)))
    }
}

#[async_trait(?Send)]
impl CacheStore for WebCacheStore {
    type Error = WebCacheError;

    async fn contains(&self, generation: &str, uri: &str) -> Result<bool, Self::Error> {
        let cache = Self::open(generation).await?;
        let matched = JsFuture::from(cache.match_with_str(uri))
            .await
            .map_err(backend)?;
        Ok(!matched.is_undefined())
    }

    async fn put(&self, generation: &str, uri: &str, bytes: &[u8]) -> Result<(), Self::Error> {
        let cache = Self::open(generation).await?;
        let mut body = bytes.to_vec();
        let response = Response::new_with_opt_u8_array(Some(&mut body)).map_err(backend)?;
        JsFuture::from(cache.put_with_str(uri, &response))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn generations(&self) -> Result<Vec<String>, Self::Error> {
        let caches = Self::caches()?;
        let keys_value = JsFuture::from(caches.keys()).await.map_err(backend)?;
        Ok(js_sys::Array::from(&keys_value)
            .iter()
            .filter_map(|name| name.as_string())
            .filter_map(|name| Self::generation_from_name(&name))
            .collect())
    }

    async fn drop_generation(&self, generation: &str) -> Result<(), Self::Error> {
        let caches = Self::caches()?;
        JsFuture::from(caches.delete(&Self::cache_name(generation)))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_names_round_trip() {
        let name = WebCacheStore::cache_name("v42");
        assert_eq!(name, "starpath-assets-v42");
        assert_eq!(
            WebCacheStore::generation_from_name(&name).as_deref(),
            Some("v42")
        );
    }

    #[test]
    fn foreign_cache_names_are_ignored() {
        assert!(WebCacheStore::generation_from_name("other-app-v1").is_none());
        assert!(WebCacheStore::generation_from_name("starpath-assets").is_none());
    }
}
