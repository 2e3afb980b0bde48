//! Versioned offline cache population and explicit staleness cleanup.
//!
//! Content is keyed by an explicit generation tag. Populating a new
//! generation never touches older ones; eviction is the separate
//! `prune_stale` operation invoked by the update/versioning mechanism, which
//! keeps population and eviction independently testable and avoids racing
//! in-flight reads from an old generation.

use std::rc::Rc;

use crate::{AssetFetcher, CacheStore};

/// Summary of an `ensure_cached` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePopulation {
    pub already_cached: usize,
    pub added: usize,
    pub failed: Vec<String>,
}

/// Content-keyed offline cache addressed by an explicit generation tag.
pub struct OfflineCache<C, F> {
    cache: Rc<C>,
    fetcher: Rc<F>,
}

impl<C: CacheStore, F: AssetFetcher> OfflineCache<C, F> {
    #[must_use]
    pub fn new(cache: Rc<C>, fetcher: Rc<F>) -> Self {
        Self { cache, fetcher }
    }

    /// Make every uri available under `generation`, fetching only the ones
    /// not already cached. Individual failures are recorded, not fatal.
    pub async fn ensure_cached(&self, generation: &str, uris: &[String]) -> CachePopulation {
        let mut summary = CachePopulation::default();
        for uri in uris {
            match self.cache.contains(generation, uri).await {
                Ok(true) => {
                    summary.already_cached += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    log::warn!("cache lookup failed for {uri}@{generation}: {err}");
                    summary.failed.push(uri.clone());
                    continue;
                }
            }
            match self.fetcher.fetch(uri).await {
                Ok(bytes) => match self.cache.put(generation, uri, &bytes).await {
                    Ok(()) => {
                        log::debug!("cached {uri} under generation {generation}");
                        summary.added += 1;
                    }
                    Err(err) => {
                        log::warn!("cache write failed for {uri}@{generation}: {err}");
                        summary.failed.push(uri.clone());
                    }
                },
                Err(err) => {
                    log::warn!("fetch failed for {uri}: {err}");
                    summary.failed.push(uri.clone());
                }
            }
        }
        summary
    }

    /// Drop every generation except `keep`, returning how many were dropped.
    /// Explicit maintenance operation; never runs as a side effect of
    /// population.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the generation listing fails;
    /// individual drop failures are logged and skipped.
    pub async fn prune_stale(&self, keep: &str) -> Result<usize, C::Error> {
        let mut dropped = 0_usize;
        for generation in self.cache.generations().await? {
            if generation == keep {
                continue;
            }
            match self.cache.drop_generation(&generation).await {
                Ok(()) => dropped += 1,
                Err(err) => log::warn!("failed to drop cache generation {generation}: {err}"),
            }
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::convert::Infallible;
    use thiserror::Error;

    #[derive(Default)]
    struct MemoryCache {
        generations: RefCell<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    }

    #[async_trait(?Send)]
    impl CacheStore for MemoryCache {
        type Error = Infallible;

        async fn contains(&self, generation: &str, uri: &str) -> Result<bool, Self::Error> {
            Ok(self
                .generations
                .borrow()
                .get(generation)
                .is_some_and(|entries| entries.contains_key(uri)))
        }

        async fn put(&self, generation: &str, uri: &str, bytes: &[u8]) -> Result<(), Self::Error> {
            self.generations
                .borrow_mut()
                .entry(generation.to_string())
                .or_default()
                .insert(uri.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn generations(&self) -> Result<Vec<String>, Self::Error> {
            Ok(self.generations.borrow().keys().cloned().collect())
        }

        async fn drop_generation(&self, generation: &str) -> Result<(), Self::Error> {
            self.generations.borrow_mut().remove(generation);
            Ok(())
        }
    }

    #[derive(Debug, Error)]
    #[error("fetch refused for {uri}")]
    struct RefusedError {
        uri: String,
    }

    #[derive(Default)]
    struct CountingFetcher {
        refused: RefCell<Vec<String>>,
        calls: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl AssetFetcher for CountingFetcher {
        type Error = RefusedError;

        async fn fetch(&self, uri: &str) -> Result<Vec<u8>, Self::Error> {
            self.calls.borrow_mut().push(uri.to_string());
            if self.refused.borrow().iter().any(|entry| entry == uri) {
                return Err(RefusedError {
                    uri: uri.to_string(),
                });
            }
            Ok(uri.as_bytes().to_vec())
        }
    }

    fn uris(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn population_fetches_only_missing_uris() {
        let cache = Rc::new(MemoryCache::default());
        let fetcher = Rc::new(CountingFetcher::default());
        let offline = OfflineCache::new(Rc::clone(&cache), Rc::clone(&fetcher));

        let first = block_on(offline.ensure_cached("v1", &uris(&["a.png", "b.png"])));
        assert_eq!(first.added, 2);
        assert_eq!(first.already_cached, 0);

        let second = block_on(offline.ensure_cached("v1", &uris(&["a.png", "b.png", "c.png"])));
        assert_eq!(second.added, 1);
        assert_eq!(second.already_cached, 2);
        assert_eq!(fetcher.calls.borrow().len(), 3);
    }

    #[test]
    fn fetch_failures_are_recorded_not_fatal() {
        let cache = Rc::new(MemoryCache::default());
        let fetcher = Rc::new(CountingFetcher::default());
        fetcher.refused.borrow_mut().push("b.png".to_string());
        let offline = OfflineCache::new(Rc::clone(&cache), fetcher);

        let summary = block_on(offline.ensure_cached("v1", &uris(&["a.png", "b.png"])));
        assert_eq!(summary.added, 1);
        assert_eq!(summary.failed, vec!["b.png".to_string()]);
        assert!(block_on(cache.contains("v1", "a.png")).unwrap());
    }

    #[test]
    fn opening_a_new_generation_keeps_the_old_one() {
        let cache = Rc::new(MemoryCache::default());
        let fetcher = Rc::new(CountingFetcher::default());
        let offline = OfflineCache::new(Rc::clone(&cache), fetcher);

        block_on(offline.ensure_cached("v1", &uris(&["a.png"])));
        block_on(offline.ensure_cached("v2", &uris(&["a.png"])));
        assert!(block_on(cache.contains("v1", "a.png")).unwrap());
        assert!(block_on(cache.contains("v2", "a.png")).unwrap());
    }

    #[test]
    fn prune_drops_everything_but_the_kept_generation() {
        let cache = Rc::new(MemoryCache::default());
        let fetcher = Rc::new(CountingFetcher::default());
        let offline = OfflineCache::new(Rc::clone(&cache), fetcher);

        block_on(offline.ensure_cached("v1", &uris(&["a.png"])));
        block_on(offline.ensure_cached("v2", &uris(&["a.png"])));
        block_on(offline.ensure_cached("v3", &uris(&["a.png"])));

        let dropped = block_on(offline.prune_stale("v3")).unwrap();
        assert_eq!(dropped, 2);
        assert!(!block_on(cache.contains("v1", "a.png")).unwrap());
        assert!(block_on(cache.contains("v3", "a.png")).unwrap());
    }
}
