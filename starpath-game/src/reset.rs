//! Scene reset baselines and the ephemeral replay marker.
//!
//! A replay discards session progress but may retain discovered symbols:
//! knowledge should not be un-learned by playing a scene again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::KeyValueStore;
use crate::constants::{SCENE_FOCUS_START, SCENE_PHASE_INITIAL};
use crate::keys::StorageKeys;
use crate::progress::{ProfileId, ScenePatch};

/// Configuration for resetting a scene on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetConfig {
    #[serde(default = "ResetConfig::default_initial_phase")]
    pub initial_phase: String,
    #[serde(default = "ResetConfig::default_initial_focus")]
    pub initial_focus: String,
    /// Symbols to retain through the reset; everything else is discarded.
    #[serde(default)]
    pub keep_symbols: BTreeMap<String, bool>,
    /// Per-scene overrides applied last; fields they set win over the
    /// computed baseline.
    #[serde(default)]
    pub specific_resets: ScenePatch,
}

impl ResetConfig {
    fn default_initial_phase() -> String {
        SCENE_PHASE_INITIAL.to_string()
    }

    fn default_initial_focus() -> String {
        SCENE_FOCUS_START.to_string()
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            initial_phase: Self::default_initial_phase(),
            initial_focus: Self::default_initial_focus(),
            keep_symbols: BTreeMap::new(),
            specific_resets: ScenePatch::default(),
        }
    }
}

/// Baseline patch applied when a scene is replayed.
///
/// Zeroes stars, completion, and progress, clears the transient UI markers,
/// sets phase and focus from the config, and replaces the discovered symbols
/// with the configured carry-over set. `specific_resets` is then merged over
/// the baseline and wins on every field it sets. Pure; persistence is the
/// caller's job via `ProgressStore::update`.
#[must_use]
pub fn compute_reset_patch(config: &ResetConfig) -> ScenePatch {
    let baseline = ScenePatch {
        phase: Some(config.initial_phase.clone()),
        current_focus: Some(config.initial_focus.clone()),
        discovered_symbols: Some(config.keep_symbols.clone()),
        stars_earned: Some(0),
        max_stars: None,
        completed: Some(false),
        progress_percentage: Some(0),
        welcome_shown: Some(false),
        popup_open: Some(false),
        completion_screen: Some(false),
    };
    baseline.overlaid_with(&config.specific_resets)
}

/// Transient "replay requested" marker, consumed once by the scene
/// controller to tell an explicit reset apart from a fresh entry. Not part
/// of durable progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayMarker {
    pub requested_at_ms: u64,
}

/// Writes and consumes replay markers through the key-value collaborator.
pub struct ReplayMarkers<K> {
    kv: Rc<K>,
    keys: StorageKeys,
}

impl<K: KeyValueStore> ReplayMarkers<K> {
    #[must_use]
    pub fn new(kv: Rc<K>, keys: StorageKeys) -> Self {
        Self { kv, keys }
    }

    /// Record a replay request. Marker storage failures are logged and
    /// swallowed; the reset patch itself has already been applied.
    pub fn mark(&self, profile: &ProfileId, zone_id: &str, scene_id: &str, requested_at_ms: u64) {
        let key = self.keys.replay_marker(profile, zone_id, scene_id);
        let marker = ReplayMarker { requested_at_ms };
        match serde_json::to_string(&marker) {
            Ok(json) => {
                if let Err(err) = self.kv.set(&key, &json) {
                    log::warn!("failed to store replay marker {key}: {err}");
                }
            }
            Err(err) => log::warn!("failed to encode replay marker {key}: {err}"),
        }
    }

    /// Read and clear the marker. Returns `None` when no replay was
    /// requested; a corrupt marker is dropped the same way.
    pub fn take(&self, profile: &ProfileId, zone_id: &str, scene_id: &str) -> Option<ReplayMarker> {
        let key = self.keys.replay_marker(profile, zone_id, scene_id);
        let raw = match self.kv.get(&key) {
            Ok(value) => value?,
            Err(err) => {
                log::warn!("failed to read replay marker {key}: {err}");
                return None;
            }
        };
        if let Err(err) = self.kv.remove(&key) {
            log::warn!("failed to clear replay marker {key}: {err}");
        }
        match serde_json::from_str(&raw) {
            Ok(marker) => Some(marker),
            Err(err) => {
                log::warn!("discarding corrupt replay marker {key}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
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

    #[test]
    fn default_reset_zeroes_session_progress() {
        let patch = compute_reset_patch(&ResetConfig::default());
        assert_eq!(patch.stars_earned, Some(0));
        assert_eq!(patch.completed, Some(false));
        assert_eq!(patch.progress_percentage, Some(0));
        assert_eq!(patch.discovered_symbols, Some(BTreeMap::new()));
        assert_eq!(patch.phase.as_deref(), Some("initial"));
        assert_eq!(patch.current_focus.as_deref(), Some("start"));
        assert_eq!(patch.welcome_shown, Some(false));
        assert_eq!(patch.popup_open, Some(false));
        assert_eq!(patch.completion_screen, Some(false));
    }

    #[test]
    fn keep_symbols_carry_over_and_specific_resets_win() {
        let mut keep_symbols = BTreeMap::new();
        keep_symbols.insert("om".to_string(), true);
        let config = ResetConfig {
            keep_symbols,
            specific_resets: ScenePatch {
                phase: Some("custom".into()),
                ..ScenePatch::default()
            },
            ..ResetConfig::default()
        };
        let patch = compute_reset_patch(&config);
        assert_eq!(patch.phase.as_deref(), Some("custom"));
        let symbols = patch.discovered_symbols.expect("symbols set");
        assert_eq!(symbols.get("om"), Some(&true));
        assert_eq!(symbols.len(), 1);
        // the rest of the baseline is untouched by the override
        assert_eq!(patch.stars_earned, Some(0));
        assert_eq!(patch.current_focus.as_deref(), Some("start"));
    }

    #[test]
    fn reset_patch_is_idempotent() {
        let config = ResetConfig {
            specific_resets: ScenePatch {
                max_stars: Some(5),
                ..ScenePatch::default()
            },
            ..ResetConfig::default()
        };
        assert_eq!(compute_reset_patch(&config), compute_reset_patch(&config));
    }

    #[test]
    fn replay_marker_is_consumed_once() {
        let kv = Rc::new(MemoryKv::default());
        let markers = ReplayMarkers::new(Rc::clone(&kv), StorageKeys::default());
        let profile = ProfileId::new("ada");

        assert!(markers.take(&profile, "forest", "coloring").is_none());
        markers.mark(&profile, "forest", "coloring", 1_234);

        let marker = markers
            .take(&profile, "forest", "coloring")
            .expect("marker pending");
        assert_eq!(marker.requested_at_ms, 1_234);
        assert!(markers.take(&profile, "forest", "coloring").is_none());
    }

    #[test]
    fn corrupt_marker_is_dropped() {
        let kv = Rc::new(MemoryKv::default());
        let markers = ReplayMarkers::new(Rc::clone(&kv), StorageKeys::default());
        let profile = ProfileId::new("ada");
        let key = StorageKeys::default().replay_marker(&profile, "forest", "coloring");
        kv.set(&key, "not json").unwrap();

        assert!(markers.take(&profile, "forest", "coloring").is_none());
        assert!(kv.get(&key).unwrap().is_none());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ResetConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ResetConfig::default());
    }
}
