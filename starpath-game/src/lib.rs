//! Starpath progression core
//!
//! Platform-agnostic progression and persistence logic for the Starpath
//! children's game. This crate tracks advancement through zones and scenes,
//! gates entry on completion criteria, snapshots state for crash recovery,
//! computes replay baselines, and gates scene mounts on asset readiness —
//! without UI or platform-specific dependencies.

use async_trait::async_trait;
use std::rc::Rc;

pub mod assets;
pub mod autosave;
pub mod cache;
pub mod constants;
pub mod gate;
pub mod keys;
pub mod progress;
pub mod reset;

// Re-export commonly used types
pub use assets::{
    AssetKind, AssetManifestEntry, CancelToken, PreloadConfig, PreloadOutcome, PreloadReport,
    ReadinessPipeline,
};
pub use autosave::{
    AutoSave, AutoSaveConfig, AutoSaveConfigError, AutoSaveSnapshot, RecoveryOutcome,
};
pub use cache::{CachePopulation, OfflineCache};
pub use gate::{StarProgress, UnlockRequirement, can_enter};
pub use keys::StorageKeys;
pub use progress::{
    Profile, ProfileId, ProgressPatch, ProgressState, ProgressStore, SceneProgress, ScenePatch,
    SubscriptionId, ZonePatch, ZoneProgress,
};
pub use reset::{ReplayMarker, ReplayMarkers, ResetConfig, compute_reset_patch};

/// Trait for the durable key-value storage collaborator.
/// Platform-specific implementations should provide this.
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Delete the value stored under `key`. Deleting a missing key is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// Trait for the asset fetch collaborator.
#[async_trait(?Send)]
pub trait AssetFetcher {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the raw bytes for `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error when the asset cannot be retrieved.
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, Self::Error>;
}

/// Trait for generation-keyed bulk cache storage, independent of the
/// key-value store.
#[async_trait(?Send)]
pub trait CacheStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether `uri` is already stored under `generation`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    async fn contains(&self, generation: &str, uri: &str) -> Result<bool, Self::Error>;

    /// Store `bytes` for `uri` under `generation`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    async fn put(&self, generation: &str, uri: &str, bytes: &[u8]) -> Result<(), Self::Error>;

    /// List the generation tags currently present.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    async fn generations(&self) -> Result<Vec<String>, Self::Error>;

    /// Remove a whole generation and everything stored under it.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    async fn drop_generation(&self, generation: &str) -> Result<(), Self::Error>;
}

/// Clock collaborator: current epoch time plus fixed-interval scheduling.
///
/// Injecting the scheduler keeps timer-driven behavior deterministic under a
/// fake clock in tests.
pub trait Clock {
    /// Cancellation handle for a repeating schedule.
    type Handle;

    /// Current wall-clock time in epoch milliseconds.
    fn now_millis(&self) -> u64;

    /// Invoke `callback` every `interval_ms` until cancelled.
    fn schedule_repeating(&self, interval_ms: u64, callback: Box<dyn FnMut()>) -> Self::Handle;

    /// Cancel a previously scheduled repeating callback.
    fn cancel(&self, handle: &Self::Handle);
}

/// Facade binding the progress store, autosave, and replay markers for one
/// application run.
///
/// Constructed once at application start and handed to consumers; no
/// component reaches for implicit global state.
pub struct ProgressionEngine<K: KeyValueStore, C: Clock> {
    store: Rc<ProgressStore>,
    autosave: AutoSave<K, C>,
    replay: ReplayMarkers<K>,
    clock: Rc<C>,
}

impl<K, C> ProgressionEngine<K, C>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// Create an engine over the given collaborators with default tuning.
    #[must_use]
    pub fn new(kv: Rc<K>, clock: Rc<C>) -> Self {
        let store = Rc::new(ProgressStore::new());
        let keys = StorageKeys::default();
        let autosave = AutoSave::new(
            Rc::clone(&store),
            Rc::clone(&kv),
            Rc::clone(&clock),
            keys.clone(),
        );
        let replay = ReplayMarkers::new(kv, keys);
        Self {
            store,
            autosave,
            replay,
            clock,
        }
    }

    /// Create an engine with explicit keys and autosave configuration.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveConfigError` when the autosave configuration is
    /// invalid.
    pub fn with_config(
        kv: Rc<K>,
        clock: Rc<C>,
        keys: StorageKeys,
        config: AutoSaveConfig,
    ) -> Result<Self, AutoSaveConfigError> {
        let store = Rc::new(ProgressStore::new());
        let autosave = AutoSave::with_config(
            Rc::clone(&store),
            Rc::clone(&kv),
            Rc::clone(&clock),
            keys.clone(),
            config,
        )?;
        let replay = ReplayMarkers::new(kv, keys);
        Ok(Self {
            store,
            autosave,
            replay,
            clock,
        })
    }

    /// The canonical progress store.
    #[must_use]
    pub fn store(&self) -> Rc<ProgressStore> {
        Rc::clone(&self.store)
    }

    /// Access to the autosave subsystem for explicit captures.
    #[must_use]
    pub const fn autosave(&self) -> &AutoSave<K, C> {
        &self.autosave
    }

    /// Start a play session: run the one-shot recovery check, then begin the
    /// periodic capture loop for the profile.
    pub fn begin_session(&mut self, profile: &ProfileId) -> RecoveryOutcome {
        let outcome = self.autosave.recover(profile);
        self.autosave.start_capture(profile);
        outcome
    }

    /// Stop the capture loop on application teardown.
    pub fn end_session(&mut self) {
        self.autosave.stop_capture();
    }

    /// Apply a replay reset for a scene and leave the transient marker the
    /// scene controller consumes on next entry.
    pub fn request_replay(
        &self,
        profile: &ProfileId,
        zone_id: &str,
        scene_id: &str,
        config: &ResetConfig,
    ) -> ProgressState {
        let patch = ProgressPatch::for_scene(scene_id, compute_reset_patch(config));
        let state = self.store.update(profile, &patch);
        self.replay
            .mark(profile, zone_id, scene_id, self.clock.now_millis());
        state
    }

    /// Consume the replay marker for a scene, if one is pending.
    pub fn take_replay_marker(
        &self,
        profile: &ProfileId,
        zone_id: &str,
        scene_id: &str,
    ) -> Option<ReplayMarker> {
        self.replay.take(profile, zone_id, scene_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::convert::Infallible;

    #[derive(Clone, Default)]
    struct MemoryKv {
        entries: Rc<RefCell<HashMap<String, String>>>,
    }

    impl KeyValueStore for MemoryKv {
        type Error = Infallible;

        fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
            Ok(self.entries.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
            self.entries
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), Self::Error> {
            self.entries.borrow_mut().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ManualClock {
        now: Cell<u64>,
        active: Cell<usize>,
    }

    impl Clock for ManualClock {
        type Handle = ();

        fn now_millis(&self) -> u64 {
            self.now.get()
        }

        fn schedule_repeating(
            &self,
            _interval_ms: u64,
            _callback: Box<dyn FnMut()>,
        ) -> Self::Handle {
            self.active.set(self.active.get() + 1);
        }

        fn cancel(&self, _handle: &Self::Handle) {
            self.active.set(self.active.get().saturating_sub(1));
        }
    }

    fn ada() -> ProfileId {
        ProfileId::new("ada")
    }

    #[test]
    fn engine_round_trips_a_crash_recovery() {
        let kv = Rc::new(MemoryKv::default());
        let clock = Rc::new(ManualClock::default());

        let mut engine = ProgressionEngine::new(Rc::clone(&kv), Rc::clone(&clock));
        assert_eq!(engine.begin_session(&ada()), RecoveryOutcome::Absent);
        engine.store().award_stars(&ada(), "quiz", 2);
        engine.autosave().capture_now(&ada());

        // relaunch against the same storage, 45s later
        clock.now.set(45_000);
        let mut engine = ProgressionEngine::new(Rc::clone(&kv), Rc::clone(&clock));
        assert_eq!(engine.begin_session(&ada()), RecoveryOutcome::Recovered);
        assert_eq!(engine.store().get(&ada()).scenes["quiz"].stars_earned, 2);
    }

    #[test]
    fn session_lifecycle_starts_and_stops_the_capture_loop() {
        let kv = Rc::new(MemoryKv::default());
        let clock = Rc::new(ManualClock::default());
        let mut engine = ProgressionEngine::new(kv, Rc::clone(&clock));

        engine.begin_session(&ada());
        assert_eq!(clock.active.get(), 1);
        engine.end_session();
        assert_eq!(clock.active.get(), 0);
    }

    #[test]
    fn request_replay_resets_the_scene_and_leaves_a_marker() {
        let kv = Rc::new(MemoryKv::default());
        let clock = Rc::new(ManualClock::default());
        clock.now.set(9_000);
        let engine = ProgressionEngine::new(kv, clock);

        engine.store().award_stars(&ada(), "coloring", 3);
        engine.store().discover_symbol(&ada(), "coloring", "om");

        let mut config = ResetConfig::default();
        config.keep_symbols.insert("om".to_string(), true);
        let state = engine.request_replay(&ada(), "forest", "coloring", &config);

        let scene = &state.scenes["coloring"];
        assert_eq!(scene.stars_earned, 0);
        assert_eq!(scene.discovered_symbols.get("om"), Some(&true));

        let marker = engine
            .take_replay_marker(&ada(), "forest", "coloring")
            .expect("marker pending");
        assert_eq!(marker.requested_at_ms, 9_000);
        assert!(engine.take_replay_marker(&ada(), "forest", "coloring").is_none());
    }

    #[test]
    fn with_config_rejects_invalid_tuning() {
        let kv = Rc::new(MemoryKv::default());
        let clock = Rc::new(ManualClock::default());
        let result = ProgressionEngine::with_config(
            kv,
            clock,
            StorageKeys::default(),
            AutoSaveConfig {
                capture_interval_ms: 0,
                ..AutoSaveConfig::default()
            },
        );
        assert!(result.is_err());
    }
}
