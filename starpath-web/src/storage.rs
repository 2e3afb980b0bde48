//! localStorage-backed key-value collaborator.

use starpath_game::KeyValueStore;
use thiserror::Error;

use crate::dom::{js_error_message, local_storage};

/// Errors surfaced by the browser storage backend.
#[derive(Debug, Error)]
pub enum WebStorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation failed: {0}")]
    Backend(String),
}

/// Key-value store over the browser origin's `localStorage`.
///
/// The handle is acquired per call; private-browsing modes can revoke it
/// between operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebKeyValueStore;

impl WebKeyValueStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn storage() -> Result<web_sys::Storage, WebStorageError> {
        local_storage().map_err(|err| WebStorageError::Unavailable(js_error_message(&err)))
    }
}

impl KeyValueStore for WebKeyValueStore {
    type Error = WebStorageError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Self::storage()?
            .get_item(key)
            .map_err(|err| WebStorageError::Backend(js_error_message(&err)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| WebStorageError::Backend(js_error_message(&err)))
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        Self::storage()?
            .remove_item(key)
            .map_err(|err| WebStorageError::Backend(js_error_message(&err)))
    }
}
