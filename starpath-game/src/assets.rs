//! Asset readiness gating for scene mounts.
//!
//! A scene declares the assets it needs; the pipeline loads them
//! sequentially and emits a progress fraction after each success, so the
//! hosting view can render a meter while the scene stays non-interactive.
//! The pipeline always terminates: per-asset failures are retried a bounded
//! number of times, then recorded, and the run completes Degraded instead of
//! hanging.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

use crate::AssetFetcher;
use crate::constants::ASSET_MAX_ATTEMPTS;

/// Kind of asset named by a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Other,
}

/// One required asset for a scene. Entries live as long as the owning scene;
/// loaded bytes may outlive them in the offline cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifestEntry {
    pub uri: String,
    pub kind: AssetKind,
    #[serde(default)]
    pub loaded: bool,
}

impl AssetManifestEntry {
    #[must_use]
    pub fn new(uri: &str, kind: AssetKind) -> Self {
        Self {
            uri: uri.to_string(),
            kind,
            loaded: false,
        }
    }
}

/// Retry policy for a preload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Attempts per asset before it is marked permanently failed for the
    /// run. Bounded by count, not wall clock.
    #[serde(default = "PreloadConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl PreloadConfig {
    const fn default_max_attempts() -> u32 {
        ASSET_MAX_ATTEMPTS
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
        }
    }
}

/// Cooperative cancellation flag checked between load steps.
///
/// Clones share the flag, so whoever owns the scene's lifetime can cancel a
/// preload it no longer observes without reaching into UI lifecycle hooks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Terminal state of a preload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Every asset loaded.
    Complete,
    /// At least one asset exhausted its retries. The consumer decides
    /// whether that blocks scene entry (fail-closed for click targets,
    /// fail-open for decorative assets).
    Degraded,
    /// Cancelled before completion; partial loads stay cached for reuse.
    Cancelled,
}

/// Result of a preload run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadReport {
    pub outcome: PreloadOutcome,
    pub loaded_count: usize,
    pub failed: Vec<String>,
}

/// Sequential asset loader gating scene readiness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessPipeline {
    config: PreloadConfig,
}

impl ReadinessPipeline {
    #[must_use]
    pub const fn new(config: PreloadConfig) -> Self {
        Self { config }
    }

    /// Load every manifest entry in order, emitting `loaded / total` after
    /// each success and returning the terminal report.
    ///
    /// An empty manifest completes immediately with fraction `1.0`.
    /// Cancellation is honored between load steps: no further fetches are
    /// issued and no further progress fractions are emitted.
    pub async fn preload<F, P>(
        &self,
        fetcher: &F,
        manifest: &mut [AssetManifestEntry],
        cancel: &CancelToken,
        mut on_progress: P,
    ) -> PreloadReport
    where
        F: AssetFetcher,
        P: FnMut(f32),
    {
        let total = manifest.len();
        if total == 0 {
            on_progress(1.0);
            return PreloadReport {
                outcome: PreloadOutcome::Complete,
                loaded_count: 0,
                failed: Vec::new(),
            };
        }

        let mut loaded_count = 0_usize;
        let mut failed = Vec::new();
        for entry in manifest.iter_mut() {
            if cancel.is_cancelled() {
                return PreloadReport {
                    outcome: PreloadOutcome::Cancelled,
                    loaded_count,
                    failed,
                };
            }
            if self.load_entry(fetcher, entry, cancel).await {
                loaded_count += 1;
                #[allow(clippy::cast_precision_loss)]
                on_progress(loaded_count as f32 / total as f32);
            } else if cancel.is_cancelled() {
                return PreloadReport {
                    outcome: PreloadOutcome::Cancelled,
                    loaded_count,
                    failed,
                };
            } else {
                failed.push(entry.uri.clone());
            }
        }

        let outcome = if failed.is_empty() {
            PreloadOutcome::Complete
        } else {
            PreloadOutcome::Degraded
        };
        PreloadReport {
            outcome,
            loaded_count,
            failed,
        }
    }

    async fn load_entry<F: AssetFetcher>(
        &self,
        fetcher: &F,
        entry: &mut AssetManifestEntry,
        cancel: &CancelToken,
    ) -> bool {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return false;
            }
            match fetcher.fetch(&entry.uri).await {
                Ok(_bytes) => {
                    entry.loaded = true;
                    return true;
                }
                Err(err) => {
                    if attempt < attempts {
                        log::debug!(
                            "retrying {} (attempt {attempt}/{attempts}): {err}",
                            entry.uri
                        );
                    } else {
                        log::warn!("asset {} failed after {attempts} attempts: {err}", entry.uri);
                    }
                }
            }
        }
        false
    }
}
