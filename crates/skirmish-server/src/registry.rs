use std::collections::HashMap;
use std::sync::Arc;

use skirmish_core::instance::{Instance, InstanceId, InstanceSnapshot};
use skirmish_core::lifecycle::PhaseKind;
use skirmish_core::player::PlayerId;
use skirmish_core::template::Template;

/// In-memory collections of templates, open Lobby instances, and running
/// (Active or End) instances.
///
/// Pure data holder. It answers lookups and moves instances between buckets
/// on request; admission rules and the single-membership invariant are
/// enforced by the orchestrator that owns it.
#[derive(Default)]
pub struct InstanceRegistry {
    templates: HashMap<String, Arc<Template>>,
    lobby: HashMap<InstanceId, Instance>,
    active: HashMap<InstanceId, Instance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut registry = Self::new();
        for template in templates {
            registry.insert_template(template);
        }
        registry
    }

    /// Insert or replace a template. Running instances keep the version they
    /// were created from.
    pub fn insert_template(&mut self, template: Template) -> Option<Arc<Template>> {
        self.templates
            .insert(template.name.clone(), Arc::new(template))
    }

    pub fn remove_template(&mut self, name: &str) -> Option<Arc<Template>> {
        self.templates.remove(name)
    }

    pub fn template(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).map(Arc::clone)
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    /// Templates usable for instance creation, sorted by name.
    pub fn complete_templates(&self) -> Vec<Arc<Template>> {
        let mut complete: Vec<_> = self
            .templates
            .values()
            .filter(|t| t.is_complete())
            .map(Arc::clone)
            .collect();
        complete.sort_by(|a, b| a.name.cmp(&b.name));
        complete
    }

    pub fn insert_lobby(&mut self, instance: Instance) {
        debug_assert_eq!(instance.phase_kind(), PhaseKind::Lobby);
        self.lobby.insert(instance.id(), instance);
    }

    /// Move an instance from the lobby bucket to the active bucket.
    pub fn promote(&mut self, id: InstanceId) -> bool {
        match self.lobby.remove(&id) {
            Some(instance) => {
                self.active.insert(id, instance);
                true
            },
            None => false,
        }
    }

    /// Remove an instance from whichever bucket holds it.
    pub fn take(&mut self, id: InstanceId) -> Option<Instance> {
        self.lobby.remove(&id).or_else(|| self.active.remove(&id))
    }

    pub fn drain(&mut self) -> Vec<Instance> {
        self.lobby
            .drain()
            .chain(self.active.drain())
            .map(|(_, instance)| instance)
            .collect()
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.lobby.get(&id).or_else(|| self.active.get(&id))
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        match self.lobby.get_mut(&id) {
            Some(instance) => Some(instance),
            None => self.active.get_mut(&id),
        }
    }

    pub fn by_name(&self, display_name: &str) -> Option<&Instance> {
        self.all().find(|i| i.display_name() == display_name)
    }

    /// The instance in which `player` is living or spectating, if any.
    pub fn instance_containing(&self, player: PlayerId) -> Option<&Instance> {
        self.all().find(|i| i.is_member(player))
    }

    pub fn lobby_instances(&self) -> impl Iterator<Item = &Instance> {
        self.lobby.values()
    }

    pub fn active_instances(&self) -> impl Iterator<Item = &Instance> {
        self.active.values()
    }

    pub fn all(&self) -> impl Iterator<Item = &Instance> {
        self.lobby.values().chain(self.active.values())
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.lobby.keys().chain(self.active.keys()).copied().collect()
    }

    pub fn lobby_is_empty(&self) -> bool {
        self.lobby.is_empty()
    }

    /// (instances, members) across both buckets.
    pub fn stats(&self) -> (usize, usize) {
        let members = self.all().map(|i| i.members().count()).sum();
        (self.lobby.len() + self.active.len(), members)
    }

    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        let mut snaps: Vec<_> = self.all().map(Instance::snapshot).collect();
        snaps.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        snaps
    }
}
