//! Entry gating for zones and scenes.
//!
//! `can_enter` is a pure decision function; marking the target unlocked
//! afterwards is the caller's job via `ProgressStore::update`. The split
//! keeps the gating rule testable independent of the mutation that follows
//! it.

use serde::{Deserialize, Serialize};

use crate::progress::{SceneProgress, ZoneProgress};

/// Progress records that expose an earned-star count.
pub trait StarProgress {
    fn stars_earned(&self) -> u32;
}

impl StarProgress for ZoneProgress {
    fn stars_earned(&self) -> u32 {
        self.stars_earned
    }
}

impl StarProgress for SceneProgress {
    fn stars_earned(&self) -> u32 {
        self.stars_earned
    }
}

/// Entry requirement for a zone or scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRequirement {
    /// Minimum stars earned on the prerequisite. Zero or negative means the
    /// target has no prerequisite (the first scene of a zone).
    #[serde(default)]
    pub min_stars: i32,
}

/// Whether `progress` satisfies `requirement`. The boundary is inclusive.
#[must_use]
pub fn can_enter<P: StarProgress>(progress: &P, requirement: &UnlockRequirement) -> bool {
    if requirement.min_stars <= 0 {
        return true;
    }
    i64::from(progress.stars_earned()) >= i64::from(requirement.min_stars)
}
