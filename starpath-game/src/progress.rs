//! Canonical progress state and the store that owns it.
//!
//! `ProgressStore` is the single source of truth for a profile's advancement
//! through zones and scenes. All mutation flows through `update`, which
//! applies a patch atomically and notifies subscribers in subscription order
//! with the full new state.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::constants::{
    DEFAULT_MAX_STARS, PROGRESS_COMPLETE_PCT, SCENE_FOCUS_START, SCENE_PHASE_INITIAL,
};

/// Opaque identifier for a player profile; the key for all persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Construct an id from a string slice, trimming whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub display_name: String,
}

/// Per-zone progress for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneProgress {
    /// Latched open: merges never clear this flag once set. Only the
    /// administrative `ProgressStore::reset_profile` does.
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub completed_scene_ids: BTreeSet<String>,
    #[serde(default)]
    pub stars_earned: u32,
}

impl ZoneProgress {
    fn apply(&mut self, patch: &ZonePatch) {
        if let Some(unlocked) = patch.unlocked {
            self.unlocked = self.unlocked || unlocked;
        }
        if let Some(ids) = patch.completed_scene_ids.as_ref() {
            self.completed_scene_ids = ids.clone();
        }
        if let Some(stars) = patch.stars_earned {
            self.stars_earned = stars;
        }
    }
}

/// Per-scene progress for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneProgress {
    /// Scene-defined phase tag.
    #[serde(default = "default_phase")]
    pub phase: String,
    /// Scene-defined focus token.
    #[serde(default = "default_focus")]
    pub current_focus: String,
    /// Discovered symbols carry across resets unless a reset replaces them.
    #[serde(default)]
    pub discovered_symbols: BTreeMap<String, bool>,
    #[serde(default)]
    pub stars_earned: u32,
    #[serde(default = "default_max_stars")]
    pub max_stars: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub progress_percentage: u8,
    /// Transient UI markers below are cleared by a scene reset.
    #[serde(default)]
    pub welcome_shown: bool,
    #[serde(default)]
    pub popup_open: bool,
    #[serde(default)]
    pub completion_screen: bool,
}

fn default_phase() -> String {
    SCENE_PHASE_INITIAL.to_string()
}

fn default_focus() -> String {
    SCENE_FOCUS_START.to_string()
}

const fn default_max_stars() -> u32 {
    DEFAULT_MAX_STARS
}

impl Default for SceneProgress {
    fn default() -> Self {
        Self {
            phase: default_phase(),
            current_focus: default_focus(),
            discovered_symbols: BTreeMap::new(),
            stars_earned: 0,
            max_stars: default_max_stars(),
            completed: false,
            progress_percentage: 0,
            welcome_shown: false,
            popup_open: false,
            completion_screen: false,
        }
    }
}

impl SceneProgress {
    fn apply(&mut self, patch: &ScenePatch) {
        if let Some(phase) = patch.phase.as_ref() {
            self.phase = phase.clone();
        }
        if let Some(focus) = patch.current_focus.as_ref() {
            self.current_focus = focus.clone();
        }
        if let Some(symbols) = patch.discovered_symbols.as_ref() {
            self.discovered_symbols = symbols.clone();
        }
        if let Some(stars) = patch.stars_earned {
            self.stars_earned = stars;
        }
        if let Some(max_stars) = patch.max_stars {
            self.max_stars = max_stars;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(pct) = patch.progress_percentage {
            self.progress_percentage = pct;
        }
        if let Some(welcome) = patch.welcome_shown {
            self.welcome_shown = welcome;
        }
        if let Some(popup) = patch.popup_open {
            self.popup_open = popup;
        }
        if let Some(completion) = patch.completion_screen {
            self.completion_screen = completion;
        }
    }

    /// Enforce record invariants after a merge: completion pins the
    /// percentage at 100 and stars never exceed the scene's maximum.
    fn normalize(&mut self) {
        self.progress_percentage = self.progress_percentage.min(PROGRESS_COMPLETE_PCT);
        if self.completed {
            self.progress_percentage = PROGRESS_COMPLETE_PCT;
        }
        self.stars_earned = self.stars_earned.min(self.max_stars);
    }
}

/// Full progress state for one profile. Zone and scene records are keyed by
/// their ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneProgress>,
    #[serde(default)]
    pub scenes: BTreeMap<String, SceneProgress>,
}

impl ProgressState {
    fn apply(&mut self, patch: &ProgressPatch) {
        for (zone_id, zone_patch) in &patch.zones {
            self.zones.entry(zone_id.clone()).or_default().apply(zone_patch);
        }
        for (scene_id, scene_patch) in &patch.scenes {
            let scene = self.scenes.entry(scene_id.clone()).or_default();
            scene.apply(scene_patch);
            scene.normalize();
        }
    }
}

/// Partial overlay of a zone's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePatch {
    pub unlocked: Option<bool>,
    /// Replaced wholesale when present.
    #[serde(default)]
    pub completed_scene_ids: Option<BTreeSet<String>>,
    pub stars_earned: Option<u32>,
}

/// Partial overlay of a scene's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePatch {
    pub phase: Option<String>,
    pub current_focus: Option<String>,
    /// Replaced wholesale when present; incremental discovery goes through
    /// `ProgressStore::discover_symbol`.
    #[serde(default)]
    pub discovered_symbols: Option<BTreeMap<String, bool>>,
    pub stars_earned: Option<u32>,
    pub max_stars: Option<u32>,
    pub completed: Option<bool>,
    pub progress_percentage: Option<u8>,
    pub welcome_shown: Option<bool>,
    pub popup_open: Option<bool>,
    pub completion_screen: Option<bool>,
}

impl ScenePatch {
    /// Shallow-merge `other` over `self`; fields set in `other` win.
    #[must_use]
    pub fn overlaid_with(&self, other: &Self) -> Self {
        Self {
            phase: other.phase.clone().or_else(|| self.phase.clone()),
            current_focus: other
                .current_focus
                .clone()
                .or_else(|| self.current_focus.clone()),
            discovered_symbols: other
                .discovered_symbols
                .clone()
                .or_else(|| self.discovered_symbols.clone()),
            stars_earned: other.stars_earned.or(self.stars_earned),
            max_stars: other.max_stars.or(self.max_stars),
            completed: other.completed.or(self.completed),
            progress_percentage: other.progress_percentage.or(self.progress_percentage),
            welcome_shown: other.welcome_shown.or(self.welcome_shown),
            popup_open: other.popup_open.or(self.popup_open),
            completion_screen: other.completion_screen.or(self.completion_screen),
        }
    }
}

/// Partial overlay of a profile's full progress state. Per-id entries merge
/// key-by-key into the existing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPatch {
    #[serde(default)]
    pub zones: BTreeMap<String, ZonePatch>,
    #[serde(default)]
    pub scenes: BTreeMap<String, ScenePatch>,
}

impl ProgressPatch {
    /// Patch touching a single zone.
    #[must_use]
    pub fn for_zone(zone_id: &str, patch: ZonePatch) -> Self {
        let mut zones = BTreeMap::new();
        zones.insert(zone_id.to_string(), patch);
        Self {
            zones,
            scenes: BTreeMap::new(),
        }
    }

    /// Patch touching a single scene.
    #[must_use]
    pub fn for_scene(scene_id: &str, patch: ScenePatch) -> Self {
        let mut scenes = BTreeMap::new();
        scenes.insert(scene_id.to_string(), patch);
        Self {
            zones: BTreeMap::new(),
            scenes,
        }
    }

    /// Patch rewriting every field of `state`; the recovery path.
    #[must_use]
    pub fn replacing(state: &ProgressState) -> Self {
        let zones = state
            .zones
            .iter()
            .map(|(zone_id, zone)| {
                (
                    zone_id.clone(),
                    ZonePatch {
                        unlocked: Some(zone.unlocked),
                        completed_scene_ids: Some(zone.completed_scene_ids.clone()),
                        stars_earned: Some(zone.stars_earned),
                    },
                )
            })
            .collect();
        let scenes = state
            .scenes
            .iter()
            .map(|(scene_id, scene)| {
                (
                    scene_id.clone(),
                    ScenePatch {
                        phase: Some(scene.phase.clone()),
                        current_focus: Some(scene.current_focus.clone()),
                        discovered_symbols: Some(scene.discovered_symbols.clone()),
                        stars_earned: Some(scene.stars_earned),
                        max_stars: Some(scene.max_stars),
                        completed: Some(scene.completed),
                        progress_percentage: Some(scene.progress_percentage),
                        welcome_shown: Some(scene.welcome_shown),
                        popup_open: Some(scene.popup_open),
                        completion_screen: Some(scene.completion_screen),
                    },
                )
            })
            .collect();
        Self { zones, scenes }
    }
}

/// Identifier handed back by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&ProgressState)>;

/// Canonical, addressable container for per-profile progress.
#[derive(Default)]
pub struct ProgressStore {
    states: RefCell<HashMap<ProfileId, ProgressState>>,
    listeners: RefCell<HashMap<ProfileId, Vec<(SubscriptionId, Listener)>>>,
    next_subscription: Cell<u64>,
}

impl ProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a profile. Unknown profiles read as the default
    /// state; nothing is inserted until the first `update`.
    #[must_use]
    pub fn get(&self, profile: &ProfileId) -> ProgressState {
        self.states
            .borrow()
            .get(profile)
            .cloned()
            .unwrap_or_default()
    }

    /// Deep-merge `patch` into the profile's state and return the result.
    ///
    /// Unknown profiles are default-initialized first (first-touch). Per-id
    /// zone and scene entries merge key-by-key; set-like fields inside a
    /// patch replace wholesale. Every update notifies subscribers with the
    /// full new state, in subscription order; no partial patch is ever
    /// observable.
    pub fn update(&self, profile: &ProfileId, patch: &ProgressPatch) -> ProgressState {
        let next = {
            let mut states = self.states.borrow_mut();
            let state = states.entry(profile.clone()).or_default();
            state.apply(patch);
            state.clone()
        };
        log::trace!("progress updated for {profile}");
        self.notify(profile, &next);
        next
    }

    /// Apply a full snapshot back into the store (recovery path), routed
    /// through `update` so ordering and notification behave like any other
    /// write.
    pub fn restore(&self, profile: &ProfileId, state: &ProgressState) -> ProgressState {
        self.update(profile, &ProgressPatch::replacing(state))
    }

    /// Administrative reset: wipes the profile back to the default state,
    /// including zone unlock latches. Not part of normal play.
    pub fn reset_profile(&self, profile: &ProfileId) -> ProgressState {
        let next = ProgressState::default();
        self.states
            .borrow_mut()
            .insert(profile.clone(), next.clone());
        self.notify(profile, &next);
        next
    }

    /// Record stars for a scene, keeping the maximum seen so far. Gameplay
    /// events award through this path, which is what makes stars monotonic
    /// within a session; a reset patch writes through `update` instead.
    pub fn award_stars(&self, profile: &ProfileId, scene_id: &str, stars: u32) -> ProgressState {
        let current = self
            .get(profile)
            .scenes
            .get(scene_id)
            .map_or(0, |scene| scene.stars_earned);
        let patch = ScenePatch {
            stars_earned: Some(current.max(stars)),
            ..ScenePatch::default()
        };
        self.update(profile, &ProgressPatch::for_scene(scene_id, patch))
    }

    /// Mark a single symbol discovered (the key-by-key merge path for the
    /// symbol mapping).
    pub fn discover_symbol(
        &self,
        profile: &ProfileId,
        scene_id: &str,
        symbol_id: &str,
    ) -> ProgressState {
        let mut symbols = self
            .get(profile)
            .scenes
            .get(scene_id)
            .map(|scene| scene.discovered_symbols.clone())
            .unwrap_or_default();
        symbols.insert(symbol_id.to_string(), true);
        let patch = ScenePatch {
            discovered_symbols: Some(symbols),
            ..ScenePatch::default()
        };
        self.update(profile, &ProgressPatch::for_scene(scene_id, patch))
    }

    /// Mark a scene completed and record it in its owning zone.
    pub fn complete_scene(
        &self,
        profile: &ProfileId,
        zone_id: &str,
        scene_id: &str,
    ) -> ProgressState {
        let mut completed = self
            .get(profile)
            .zones
            .get(zone_id)
            .map(|zone| zone.completed_scene_ids.clone())
            .unwrap_or_default();
        completed.insert(scene_id.to_string());
        let mut patch = ProgressPatch::for_scene(
            scene_id,
            ScenePatch {
                completed: Some(true),
                progress_percentage: Some(PROGRESS_COMPLETE_PCT),
                ..ScenePatch::default()
            },
        );
        patch.zones.insert(
            zone_id.to_string(),
            ZonePatch {
                completed_scene_ids: Some(completed),
                ..ZonePatch::default()
            },
        );
        self.update(profile, &patch)
    }

    /// Register a listener for a profile's updates. Listeners are invoked in
    /// subscription order with the full post-update state.
    pub fn subscribe(
        &self,
        profile: &ProfileId,
        listener: impl Fn(&ProgressState) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(profile.clone())
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    /// Drop a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        for entries in self.listeners.borrow_mut().values_mut() {
            entries.retain(|(existing, _)| *existing != id);
        }
    }

    fn notify(&self, profile: &ProfileId, state: &ProgressState) {
        // Iterate a cheap clone of the list so a listener may subscribe or
        // unsubscribe without re-entering the borrow; such changes take
        // effect on the next update.
        let current: Vec<Listener> = self
            .listeners
            .borrow()
            .get(profile)
            .map(|entries| entries.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default();
        for listener in current {
            listener(state);
        }
    }
}

impl fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressStore")
            .field("profiles", &self.states.borrow().len())
            .finish_non_exhaustive()
    }
}
