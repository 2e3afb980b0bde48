//! Browser implementations of the Starpath progression core's collaborator
//! traits: localStorage for durable key-value state, `fetch` for asset
//! bytes, the Cache API for generation-keyed offline storage, and
//! `Date.now`/`setInterval` for the clock.

#![forbid(unsafe_code)]
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod cache;
pub mod clock;
pub mod dom;
pub mod fetch;
pub mod storage;

pub use cache::{WebCacheError, WebCacheStore};
pub use clock::{IntervalHandle, WebClock};
pub use fetch::{WebAssetFetcher, WebFetchError};
pub use storage::{WebKeyValueStore, WebStorageError};

use starpath_game::ProgressionEngine;
use std::rc::Rc;

/// Create a progression engine wired to the browser collaborators.
#[must_use]
pub fn create_web_engine() -> ProgressionEngine<WebKeyValueStore, WebClock> {
    ProgressionEngine::new(Rc::new(WebKeyValueStore::new()), Rc::new(WebClock::new()))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
