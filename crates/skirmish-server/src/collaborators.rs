//! In-process collaborator implementations so the server runs standalone.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError, RwLock};

use skirmish_core::error::ProvisioningError;
use skirmish_core::instance::InstanceId;
use skirmish_core::location::{ConcreteLocation, LocationDescriptor, PlayspaceHandle};
use skirmish_core::notice::Notice;
use skirmish_core::player::{PlayerId, PriorityTier};
use skirmish_core::ports::{Notifier, RankSource, SessionHooks, TemplateStore, WorldProvisioner};
use skirmish_core::template::Template;

/// Resolves descriptors against a fixed set of world names and hands out
/// play-space handles named `{map_ref}_{short id}`.
pub struct LocalWorlds {
    /// Empty means every world resolves.
    available: HashSet<String>,
    live: Mutex<HashSet<PlayspaceHandle>>,
}

impl LocalWorlds {
    pub fn new(available: impl IntoIterator<Item = String>) -> Self {
        Self {
            available: available.into_iter().collect(),
            live: Mutex::new(HashSet::new()),
        }
    }

    pub fn live_playspaces(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn knows(&self, world: &str) -> bool {
        self.available.is_empty() || self.available.contains(world)
    }
}

impl WorldProvisioner for LocalWorlds {
    fn resolve_location(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<ConcreteLocation, ProvisioningError> {
        if !self.knows(&descriptor.world) {
            return Err(ProvisioningError::WorldUnavailable(descriptor.world.clone()));
        }
        Ok(ConcreteLocation {
            world_id: descriptor.world.clone(),
            x: descriptor.x,
            y: descriptor.y,
            z: descriptor.z,
        })
    }

    fn provision_playspace(
        &self,
        instance: InstanceId,
        map_ref: &str,
    ) -> Result<PlayspaceHandle, ProvisioningError> {
        if map_ref.is_empty() {
            return Err(ProvisioningError::PlayspaceAllocation(
                "template has no map reference".to_string(),
            ));
        }
        let handle = PlayspaceHandle {
            instance,
            world_name: format!("{map_ref}_{}", instance.short()),
        };
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone());
        Ok(handle)
    }

    fn release_playspace(&self, handle: &PlayspaceHandle) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        if removed {
            tracing::debug!(world = %handle.world_name, "play-space released");
        } else {
            tracing::warn!(world = %handle.world_name, "Release of unknown play-space");
        }
    }
}

/// Rank table editable at runtime. Unknown players are `Default`.
#[derive(Default)]
pub struct TableRanks {
    tiers: RwLock<HashMap<PlayerId, PriorityTier>>,
}

impl TableRanks {
    pub fn set(&self, player: PlayerId, tier: PriorityTier) {
        let mut tiers = self.tiers.write().unwrap_or_else(PoisonError::into_inner);
        if tier == PriorityTier::Default {
            tiers.remove(&player);
        } else {
            tiers.insert(player, tier);
        }
    }
}

impl RankSource for TableRanks {
    fn tier_of(&self, player: PlayerId) -> PriorityTier {
        self.tiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player)
            .copied()
            .unwrap_or_default()
    }
}

/// Keeps admin-saved templates for the lifetime of the process.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<BTreeMap<String, Template>>,
}

impl MemoryTemplateStore {
    pub fn with_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: Mutex::new(
                templates
                    .into_iter()
                    .map(|t| (t.name.clone(), t))
                    .collect(),
            ),
        }
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self) -> Vec<Template> {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn save(&self, template: &Template) {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.name.clone(), template.clone());
    }

    fn delete(&self, name: &str) {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

/// Emits every notice as a structured `tracing` event.
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, player: PlayerId, notice: Notice) {
        match serde_json::to_string(&notice) {
            Ok(body) => tracing::info!(player = %player, notice = %body, "notice"),
            Err(e) => tracing::warn!(player = %player, error = %e, "Unserialisable notice"),
        }
    }
}

pub struct LoggingSessionHooks;

impl SessionHooks for LoggingSessionHooks {
    fn on_join(&self, player: PlayerId, instance: InstanceId) {
        tracing::debug!(player = %player, instance = %instance, "session attached");
    }

    fn on_leave(&self, player: PlayerId) {
        tracing::debug!(player = %player, "session detached");
    }

    fn on_match_start(&self, player: PlayerId) {
        tracing::debug!(player = %player, "match stats opened");
    }

    fn on_match_stop(&self, player: PlayerId) {
        tracing::debug!(player = %player, "match effects cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn local_worlds_resolve_only_known_worlds() {
        let worlds = LocalWorlds::new(["hub".to_string()]);
        let hub = LocationDescriptor::new("hub", 1.0, 2.0, 3.0);
        let resolved = worlds.resolve_location(&hub).unwrap();
        assert_eq!(resolved.world_id, "hub");
        assert_eq!(resolved.y, 2.0);

        let nether = LocationDescriptor::new("nether", 0.0, 0.0, 0.0);
        assert_eq!(
            worlds.resolve_location(&nether),
            Err(ProvisioningError::WorldUnavailable("nether".into()))
        );
    }

    #[test]
    fn empty_world_list_resolves_everything() {
        let worlds = LocalWorlds::new(Vec::new());
        let anywhere = LocationDescriptor::new("anywhere", 0.0, 0.0, 0.0);
        assert!(worlds.resolve_location(&anywhere).is_ok());
    }

    #[test]
    fn playspaces_are_tracked_until_released() {
        let worlds = LocalWorlds::new(Vec::new());
        let id = InstanceId::new();
        let handle = worlds.provision_playspace(id, "skywars").unwrap();
        assert_eq!(handle.world_name, format!("skywars_{}", id.short()));
        assert_eq!(worlds.live_playspaces(), 1);
        worlds.release_playspace(&handle);
        worlds.release_playspace(&handle);
        assert_eq!(worlds.live_playspaces(), 0);

        assert!(worlds.provision_playspace(id, "").is_err());
    }

    #[test]
    fn table_ranks_default_to_lowest_tier() {
        let ranks = TableRanks::default();
        let p = Uuid::new_v4();
        assert_eq!(ranks.tier_of(p), PriorityTier::Default);
        ranks.set(p, PriorityTier::VipPlus);
        assert_eq!(ranks.tier_of(p), PriorityTier::VipPlus);
        ranks.set(p, PriorityTier::Default);
        assert_eq!(ranks.tier_of(p), PriorityTier::Default);
    }

    #[test]
    fn memory_store_saves_and_deletes() {
        let store = MemoryTemplateStore::with_templates([Template::new("duel", 2, 2)]);
        store.save(&Template::new("skywars", 2, 8));
        store.save(&Template::new("duel", 2, 4));
        let names: Vec<_> = store.load().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["duel", "skywars"]);
        assert_eq!(store.load()[0].max_players, 4);

        store.delete("duel");
        assert_eq!(store.load().len(), 1);
    }
}
