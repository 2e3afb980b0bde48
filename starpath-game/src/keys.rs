//! Typed builders for the storage keys used by the persistence layer.
//!
//! Every key string the core hands to the key-value collaborator is
//! formatted here, so the layout stays testable independent of the backing
//! store and call sites never concatenate key fragments by hand.

use crate::constants::{REPLAY_SLOT, SNAPSHOT_SLOT, STORAGE_NAMESPACE};
use crate::progress::ProfileId;

/// Canonical key builder scoped to a storage namespace.
///
/// Identifiers are treated as opaque but must not contain the `.` separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    namespace: String,
}

impl StorageKeys {
    /// Build a key set under an explicit namespace.
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.trim().to_string(),
        }
    }

    /// Autosave snapshot slot for a profile. One slot per profile; every
    /// capture overwrites it.
    #[must_use]
    pub fn snapshot_slot(&self, profile: &ProfileId) -> String {
        format!("{}.{SNAPSHOT_SLOT}.{}", self.namespace, profile.as_str())
    }

    /// Ephemeral replay marker key for a profile + zone + scene triple.
    #[must_use]
    pub fn replay_marker(&self, profile: &ProfileId, zone_id: &str, scene_id: &str) -> String {
        format!(
            "{}.{REPLAY_SLOT}.{}.{zone_id}.{scene_id}",
            self.namespace,
            profile.as_str()
        )
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::new(STORAGE_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_slot_is_scoped_per_profile() {
        let keys = StorageKeys::default();
        let ada = ProfileId::new("ada");
        let ben = ProfileId::new("ben");
        assert_eq!(keys.snapshot_slot(&ada), "starpath.autosave.ada");
        assert_ne!(keys.snapshot_slot(&ada), keys.snapshot_slot(&ben));
    }

    #[test]
    fn replay_marker_keys_zone_and_scene() {
        let keys = StorageKeys::new("custom");
        let profile = ProfileId::new("ada");
        assert_eq!(
            keys.replay_marker(&profile, "forest", "coloring"),
            "custom.replay.ada.forest.coloring"
        );
    }

    #[test]
    fn namespace_is_trimmed() {
        let keys = StorageKeys::new("  spaced  ");
        let profile = ProfileId::new("ada");
        assert_eq!(keys.snapshot_slot(&profile), "spaced.autosave.ada");
    }
}
