//! Module Registry: who is supervised, in what state, depending on whom
//!
//! The registry is generic over the handle type `H` the supervisor keeps for
//! each module, so it stays free of any runtime or trait-object concerns.
//! Registration order is preserved; iteration, dependents lookup and health
//! passes all follow it.

use crate::policy::RestartTracking;
use crate::state::ModuleState;
use std::collections::HashMap;

/// Everything tracked for one registered module
#[derive(Debug, Clone)]
pub struct ModuleEntry<H> {
    /// Handle used to reach the module
    pub handle: H,

    /// Current lifecycle state
    pub state: ModuleState,

    /// Restart attempts and last restart timestamp
    pub tracking: RestartTracking,

    /// Ids of modules this module depends on
    pub dependencies: Vec<String>,

    /// Bumped on every (re-)registration of the same id
    pub generation: u64,
}

/// Registered modules keyed by id, in registration order
#[derive(Debug)]
pub struct ModuleRegistry<H> {
    entries: HashMap<String, ModuleEntry<H>>,
    order: Vec<String>,
    next_generation: u64,
}

impl<H> ModuleRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            next_generation: 1,
        }
    }

    /// Register a module as `Healthy` with fresh restart tracking.
    ///
    /// Re-registering an id replaces its entry (keeping its position in the
    /// registration order) and returns the previous one.
    pub fn insert(
        &mut self,
        module_id: &str,
        handle: H,
        dependencies: Vec<String>,
    ) -> Option<ModuleEntry<H>> {
        let generation = self.next_generation;
        self.next_generation += 1;

        let entry = ModuleEntry {
            handle,
            state: ModuleState::Healthy,
            tracking: RestartTracking::default(),
            dependencies,
            generation,
        };

        let previous = self.entries.insert(module_id.to_string(), entry);
        if previous.is_none() {
            self.order.push(module_id.to_string());
        }
        previous
    }

    /// Remove a module and everything tracked for it
    pub fn remove(&mut self, module_id: &str) -> Option<ModuleEntry<H>> {
        let removed = self.entries.remove(module_id)?;
        self.order.retain(|id| id != module_id);
        Some(removed)
    }

    pub fn get(&self, module_id: &str) -> Option<&ModuleEntry<H>> {
        self.entries.get(module_id)
    }

    pub fn get_mut(&mut self, module_id: &str) -> Option<&mut ModuleEntry<H>> {
        self.entries.get_mut(module_id)
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.entries.contains_key(module_id)
    }

    pub fn state(&self, module_id: &str) -> Option<ModuleState> {
        self.entries.get(module_id).map(|e| e.state)
    }

    /// Set a module's state, returning the previous one
    pub fn set_state(&mut self, module_id: &str, state: ModuleState) -> Option<ModuleState> {
        self.entries
            .get_mut(module_id)
            .map(|e| std::mem::replace(&mut e.state, state))
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleEntry<H>)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (id.as_str(), e)))
    }

    /// Modules that declared a dependency on `module_id`, in registration order
    pub fn dependents_of(&self, module_id: &str) -> Vec<String> {
        self.iter()
            .filter(|(_, e)| e.dependencies.iter().any(|d| d == module_id))
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Dependency edges of every module that declared at least one
    pub fn dependency_map(&self) -> HashMap<String, Vec<String>> {
        self.iter()
            .filter(|(_, e)| !e.dependencies.is_empty())
            .map(|(id, e)| (id.to_string(), e.dependencies.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H> Default for ModuleRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn deps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_starts_healthy() {
        let mut registry = ModuleRegistry::new();
        assert!(registry.insert("db", (), vec![]).is_none());

        let entry = registry.get("db").unwrap();
        assert_eq!(entry.state, ModuleState::Healthy);
        assert_eq!(entry.tracking.attempt_count, 0);
        assert!(entry.tracking.last_restart.is_none());
    }

    #[test]
    fn test_reregistration_resets_state_and_keeps_order() {
        let mut registry = ModuleRegistry::new();
        registry.insert("a", 1, vec![]);
        registry.insert("b", 2, vec![]);

        {
            let entry = registry.get_mut("a").unwrap();
            entry.state = ModuleState::Failed;
            entry.tracking.record_attempt(Utc::now());
        }
        let first_generation = registry.get("a").unwrap().generation;

        let previous = registry.insert("a", 3, deps(&["b"])).unwrap();
        assert_eq!(previous.handle, 1);
        assert_eq!(previous.state, ModuleState::Failed);

        let entry = registry.get("a").unwrap();
        assert_eq!(entry.handle, 3);
        assert_eq!(entry.state, ModuleState::Healthy);
        assert_eq!(entry.tracking.attempt_count, 0);
        assert_ne!(entry.generation, first_generation);
        assert_eq!(registry.ids(), &["a".to_string(), "b".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_discards_everything() {
        let mut registry = ModuleRegistry::new();
        registry.insert("a", (), vec![]);
        registry.insert("b", (), deps(&["a"]));

        assert!(registry.remove("b").is_some());
        assert!(!registry.contains("b"));
        assert!(registry.state("b").is_none());
        assert!(registry.dependency_map().is_empty());
        assert_eq!(registry.ids(), &["a".to_string()]);

        assert!(registry.remove("b").is_none());
    }

    #[test]
    fn test_dependents_of() {
        let mut registry = ModuleRegistry::new();
        registry.insert("storage", (), vec![]);
        registry.insert("calendar", (), deps(&["storage", "network"]));
        registry.insert("network", (), vec![]);
        registry.insert("tasks", (), deps(&["storage"]));

        assert_eq!(
            registry.dependents_of("storage"),
            vec!["calendar".to_string(), "tasks".to_string()]
        );
        assert_eq!(registry.dependents_of("network"), vec!["calendar".to_string()]);
        assert!(registry.dependents_of("tasks").is_empty());

        let map = registry.dependency_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["calendar"], deps(&["storage", "network"]));
    }

    #[test]
    fn test_set_state_returns_previous() {
        let mut registry = ModuleRegistry::new();
        registry.insert("a", (), vec![]);

        assert_eq!(
            registry.set_state("a", ModuleState::Degraded),
            Some(ModuleState::Healthy)
        );
        assert_eq!(registry.state("a"), Some(ModuleState::Degraded));
        assert_eq!(registry.set_state("missing", ModuleState::Failed), None);
    }
}
