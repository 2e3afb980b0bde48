//! Centralized tuning constants for the Starpath progression core.
//!
//! Keeping these together ensures the persistence cadence and gating
//! behavior can only be adjusted via code changes reviewed in version
//! control.

// Storage key namespace ----------------------------------------------------
pub(crate) const STORAGE_NAMESPACE: &str = "starpath";
pub(crate) const SNAPSHOT_SLOT: &str = "autosave";
pub(crate) const REPLAY_SLOT: &str = "replay";

// Autosave tuning ----------------------------------------------------------
// The capture cadence and the recovery freshness window are independent
// parameters; recovery makes no assumption about their ratio.
pub(crate) const AUTOSAVE_CAPTURE_INTERVAL_MS: u64 = 30_000;
pub(crate) const SNAPSHOT_FRESHNESS_WINDOW_MS: u64 = 60_000;

// Asset pipeline tuning ----------------------------------------------------
pub(crate) const ASSET_MAX_ATTEMPTS: u32 = 3;

// Progress defaults --------------------------------------------------------
pub(crate) const DEFAULT_MAX_STARS: u32 = 3;
pub(crate) const SCENE_PHASE_INITIAL: &str = "initial";
pub(crate) const SCENE_FOCUS_START: &str = "start";
pub(crate) const PROGRESS_COMPLETE_PCT: u8 = 100;
