//! The multi-instance manager: a keyed collection of independently
//! steppable simulations and the per-tick fan-out over them.
//!
//! The manager owns zero or more [`SimulationInstance`]s keyed by their id.
//! Each external tick calls [`step_all`](SimulationManager::step_all), which
//! first reconciles the registry against the externally owned list (pruning
//! ids the host dropped, e.g. after an undo) and then steps every active
//! instance sequentially. Inactive instances are skipped but retained, so
//! reactivating one resumes exactly where it left off.

use hashbrown::HashMap;
use scenesim_types::{InstanceId, SimError};

use crate::host::SceneView;
use crate::instance::SimulationInstance;

/// Owns and steps a keyed collection of simulation instances.
#[derive(Default)]
pub struct SimulationManager {
    /// Instances by id. Insertion order is irrelevant.
    registry: HashMap<InstanceId, SimulationInstance>,
    /// Externally toggleable activity flags. An id missing from the external
    /// list view is pruned from both maps at the next tick.
    active: HashMap<InstanceId, bool>,
    /// The instance targeted by selection-based operations.
    selected: Option<InstanceId>,
}

impl SimulationManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no instances are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Iterate over registered ids.
    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.registry.keys().copied()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register an instance under its own id and return that id.
    ///
    /// The instance starts active per its config and becomes the selected
    /// instance. Always succeeds for a well-formed instance.
    pub fn add(&mut self, instance: SimulationInstance) -> InstanceId {
        let id = instance.id();
        let is_active = instance.config().is_active;
        self.registry.insert(id, instance);
        self.active.insert(id, is_active);
        self.selected = Some(id);
        id
    }

    /// Remove an instance and its activity flag.
    ///
    /// Removing an id that is not registered is a no-op, not an error: the
    /// external list and this registry are allowed to diverge transiently.
    pub fn remove(&mut self, id: InstanceId) {
        self.registry.remove(&id);
        self.active.remove(&id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Look up an instance by id.
    pub fn get(&self, id: InstanceId) -> scenesim_types::Result<&SimulationInstance> {
        self.registry.get(&id).ok_or(SimError::NotFound(id))
    }

    /// Look up an instance by id, mutably.
    pub fn get_mut(&mut self, id: InstanceId) -> scenesim_types::Result<&mut SimulationInstance> {
        self.registry.get_mut(&id).ok_or(SimError::NotFound(id))
    }

    /// The currently selected instance.
    ///
    /// Fails with a not-found condition when nothing was ever selected or
    /// the selection was removed; never returns a default instance.
    pub fn active_instance(&self) -> scenesim_types::Result<&SimulationInstance> {
        let id = self.selected.ok_or(SimError::NothingSelected)?;
        self.get(id)
    }

    /// Select the instance targeted by [`active_instance`](Self::active_instance).
    pub fn select(&mut self, id: InstanceId) -> scenesim_types::Result<()> {
        if !self.registry.contains_key(&id) {
            return Err(SimError::NotFound(id));
        }
        self.selected = Some(id);
        Ok(())
    }

    // =========================================================================
    // Activity
    // =========================================================================

    /// Toggle whether an instance steps during [`step_all`](Self::step_all).
    ///
    /// Deactivating does not reset the instance; its clock resumes on
    /// reactivation.
    pub fn set_active(&mut self, id: InstanceId, active: bool) -> scenesim_types::Result<()> {
        if !self.registry.contains_key(&id) {
            return Err(SimError::NotFound(id));
        }
        self.active.insert(id, active);
        Ok(())
    }

    /// Whether an instance is currently active. Unknown ids are inactive.
    #[must_use]
    pub fn is_active(&self, id: InstanceId) -> bool {
        self.active.get(&id).copied().unwrap_or(false)
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Step every active instance once, in one tick.
    ///
    /// Runs the reconciliation pass first: any registered id the external
    /// view no longer knows is pruned with a warning. Then the active
    /// instances step sequentially against their host scenes. The first
    /// stepping failure aborts the tick and is returned to the caller.
    pub fn step_all(&mut self, view: &mut dyn SceneView) -> scenesim_types::Result<()> {
        // Reconciliation: tolerate the external list diverging from the
        // registry, e.g. after a host-side undo removed an object.
        let stale: Vec<InstanceId> = self
            .active
            .keys()
            .copied()
            .filter(|&id| !view.is_live(id))
            .collect();
        for id in stale {
            tracing::warn!(instance = %id, "pruning instance no longer present in the host list");
            self.remove(id);
        }

        let ids: Vec<InstanceId> = self.registry.keys().copied().collect();
        for id in ids {
            if !self.is_active(id) {
                continue;
            }
            let Some(scene) = view.scene_mut(id) else {
                tracing::warn!(instance = %id, "host view has no scene for a live instance; skipping");
                continue;
            };
            if let Some(instance) = self.registry.get_mut(&id) {
                instance.step(scene)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use scenesim_types::InstanceConfig;

    fn instance() -> SimulationInstance {
        SimulationInstance::new(InstanceConfig::default())
    }

    #[test]
    fn test_add_and_get() {
        let mut manager = SimulationManager::new();
        let id = manager.add(instance());

        assert_eq!(manager.len(), 1);
        assert!(manager.get(id).is_ok());
        assert!(manager.is_active(id));
        assert_eq!(manager.active_instance().unwrap().id(), id);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let manager = SimulationManager::new();
        let err = manager.get(InstanceId::fresh()).unwrap_err();
        assert!(err.is_not_found());

        let err = manager.active_instance().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut manager = SimulationManager::new();
        let id = manager.add(instance());
        assert_eq!(manager.len(), 1);

        manager.remove(id);
        assert_eq!(manager.len(), 0);

        // Second removal of the same id: no error, no size change.
        manager.remove(id);
        assert_eq!(manager.len(), 0);
        assert!(!manager.is_active(id));
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut manager = SimulationManager::new();
        let id = manager.add(instance());
        manager.remove(id);
        assert!(manager.active_instance().unwrap_err().is_not_found());
    }

    #[test]
    fn test_select_unknown_fails() {
        let mut manager = SimulationManager::new();
        let a = manager.add(instance());
        let b = manager.add(instance());
        assert_eq!(manager.active_instance().unwrap().id(), b);

        manager.select(a).unwrap();
        assert_eq!(manager.active_instance().unwrap().id(), a);

        assert!(manager.select(InstanceId::fresh()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_set_active_unknown_fails() {
        let mut manager = SimulationManager::new();
        assert!(manager
            .set_active(InstanceId::fresh(), true)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_inactive_config_starts_inactive() {
        let mut manager = SimulationManager::new();
        let mut config = InstanceConfig::default();
        config.is_active = false;
        let id = manager.add(SimulationInstance::new(config));
        assert!(!manager.is_active(id));
    }
}
