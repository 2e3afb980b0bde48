//! Periodic progress snapshots and startup crash recovery.
//!
//! Two independent concerns share one injected clock: a capture loop that
//! overwrites a per-profile snapshot slot on a fixed interval, and a
//! one-shot recovery check at startup that restores the snapshot only when
//! it is fresh enough to represent an interrupted session. A snapshot older
//! than the freshness window is presumed to belong to a session that exited
//! cleanly long ago and is discarded without being applied.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use thiserror::Error;

use crate::constants::{AUTOSAVE_CAPTURE_INTERVAL_MS, SNAPSHOT_FRESHNESS_WINDOW_MS};
use crate::keys::StorageKeys;
use crate::progress::{ProfileId, ProgressState, ProgressStore};
use crate::{Clock, KeyValueStore};

/// Timestamped serialization of a profile's full progress. At most one
/// snapshot exists per profile at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSaveSnapshot {
    pub state: ProgressState,
    pub captured_at_ms: u64,
}

/// Capture cadence and recovery freshness window, in milliseconds.
///
/// The two values are deliberately independent; nothing in the recovery
/// logic assumes a ratio between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    #[serde(default = "AutoSaveConfig::default_capture_interval_ms")]
    pub capture_interval_ms: u64,
    #[serde(default = "AutoSaveConfig::default_freshness_window_ms")]
    pub freshness_window_ms: u64,
}

impl AutoSaveConfig {
    const fn default_capture_interval_ms() -> u64 {
        AUTOSAVE_CAPTURE_INTERVAL_MS
    }

    const fn default_freshness_window_ms() -> u64 {
        SNAPSHOT_FRESHNESS_WINDOW_MS
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveConfigError` when either interval is zero.
    pub const fn validate(&self) -> Result<(), AutoSaveConfigError> {
        if self.capture_interval_ms == 0 {
            return Err(AutoSaveConfigError::ZeroInterval {
                field: "capture_interval_ms",
            });
        }
        if self.freshness_window_ms == 0 {
            return Err(AutoSaveConfigError::ZeroInterval {
                field: "freshness_window_ms",
            });
        }
        Ok(())
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: Self::default_capture_interval_ms(),
            freshness_window_ms: Self::default_freshness_window_ms(),
        }
    }
}

/// Errors raised when autosave configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AutoSaveConfigError {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
}

/// Outcome of the startup recovery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// A fresh snapshot was applied back into the store.
    Recovered,
    /// A snapshot existed but was older than the freshness window; it was
    /// discarded without being applied.
    Stale,
    /// No usable snapshot (missing, unreadable, or corrupt).
    Absent,
}

/// Snapshot writer and startup reconciler wrapping a `ProgressStore`.
///
/// Owns only the durable copy of the snapshot; the progress data itself
/// stays with the store.
pub struct AutoSave<K: KeyValueStore, C: Clock> {
    store: Rc<ProgressStore>,
    kv: Rc<K>,
    clock: Rc<C>,
    keys: StorageKeys,
    config: AutoSaveConfig,
    capture: Option<C::Handle>,
}

impl<K, C> AutoSave<K, C>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// Build with the default cadence.
    #[must_use]
    pub fn new(store: Rc<ProgressStore>, kv: Rc<K>, clock: Rc<C>, keys: StorageKeys) -> Self {
        Self {
            store,
            kv,
            clock,
            keys,
            config: AutoSaveConfig::default(),
            capture: None,
        }
    }

    /// Build with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveConfigError` when the configuration is invalid.
    pub fn with_config(
        store: Rc<ProgressStore>,
        kv: Rc<K>,
        clock: Rc<C>,
        keys: StorageKeys,
        config: AutoSaveConfig,
    ) -> Result<Self, AutoSaveConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            kv,
            clock,
            keys,
            config,
            capture: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    /// Begin the periodic capture loop for a profile, replacing any loop
    /// already running.
    pub fn start_capture(&mut self, profile: &ProfileId) {
        self.stop_capture();
        let store = Rc::clone(&self.store);
        let kv = Rc::clone(&self.kv);
        let clock = Rc::clone(&self.clock);
        let key = self.keys.snapshot_slot(profile);
        let profile = profile.clone();
        let handle = self.clock.schedule_repeating(
            self.config.capture_interval_ms,
            Box::new(move || {
                write_snapshot(&store, &*kv, &key, &profile, clock.now_millis());
            }),
        );
        self.capture = Some(handle);
    }

    /// Stop the capture loop. Called only on full application teardown.
    pub fn stop_capture(&mut self) {
        if let Some(handle) = self.capture.take() {
            self.clock.cancel(&handle);
        }
    }

    /// Write a snapshot immediately, outside the periodic cadence.
    pub fn capture_now(&self, profile: &ProfileId) {
        let key = self.keys.snapshot_slot(profile);
        write_snapshot(&self.store, &*self.kv, &key, profile, self.clock.now_millis());
    }

    /// Startup reconciliation: restore a fresh snapshot, discard a stale or
    /// corrupt one. The slot is consumed either way; the next capture tick
    /// rewrites it. Never surfaces a failure to the player.
    pub fn recover(&self, profile: &ProfileId) -> RecoveryOutcome {
        let key = self.keys.snapshot_slot(profile);
        let raw = match self.kv.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return RecoveryOutcome::Absent,
            Err(err) => {
                log::warn!("autosave slot {key} unreadable: {err}");
                return RecoveryOutcome::Absent;
            }
        };
        let snapshot: AutoSaveSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("discarding corrupt autosave snapshot {key}: {err}");
                self.discard(&key);
                return RecoveryOutcome::Absent;
            }
        };
        let age_ms = self
            .clock
            .now_millis()
            .saturating_sub(snapshot.captured_at_ms);
        self.discard(&key);
        if age_ms <= self.config.freshness_window_ms {
            self.store.restore(profile, &snapshot.state);
            log::info!("recovered interrupted session for {profile} ({age_ms}ms old)");
            RecoveryOutcome::Recovered
        } else {
            log::info!("ignoring stale autosave for {profile} ({age_ms}ms old)");
            RecoveryOutcome::Stale
        }
    }

    fn discard(&self, key: &str) {
        if let Err(err) = self.kv.remove(key) {
            log::warn!("failed to clear autosave slot {key}: {err}");
        }
    }
}

fn write_snapshot<K: KeyValueStore>(
    store: &ProgressStore,
    kv: &K,
    key: &str,
    profile: &ProfileId,
    now_ms: u64,
) {
    let snapshot = AutoSaveSnapshot {
        state: store.get(profile),
        captured_at_ms: now_ms,
    };
    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            if let Err(err) = kv.set(key, &json) {
                log::warn!("autosave write failed for {key}: {err}");
            }
        }
        Err(err) => log::warn!("autosave encode failed for {key}: {err}"),
    }
}
