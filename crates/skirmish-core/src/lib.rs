pub mod countdown;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod location;
pub mod notice;
pub mod player;
pub mod ports;
pub mod template;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use uuid::Uuid;

    use crate::error::ProvisioningError;
    use crate::instance::InstanceId;
    use crate::location::{ConcreteLocation, LocationDescriptor, PlayspaceHandle};
    use crate::notice::Notice;
    use crate::player::{PlayerId, PriorityTier};
    use crate::ports::{AdmissionPolicy, Notifier, RankSource, SessionHooks, WorldProvisioner};
    use crate::template::Template;

    /// A complete template whose lobby lives in `hub` and whose arena lives
    /// in a world named after the template.
    pub fn make_template(
        name: &str,
        min_players: usize,
        max_players: usize,
        min_players_to_start: usize,
    ) -> Template {
        let arena = LocationDescriptor::new(name, 0.0, 64.0, 0.0);
        Template {
            name: name.to_string(),
            map_ref: format!("{name}_map"),
            min_players,
            max_players,
            min_players_to_start,
            lobby_location: Some(LocationDescriptor::new("hub", 0.0, 70.0, 0.0)),
            spectator_location: Some(LocationDescriptor::new(name, 0.0, 90.0, 0.0)),
            main_location: Some(arena.clone()),
            spawn_points: vec![arena],
        }
    }

    /// Create `n` fresh player ids.
    pub fn make_players(n: usize) -> Vec<PlayerId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    /// Records every notice delivered, in order.
    #[derive(Default)]
    pub struct RecordingNotifier {
        notices: Mutex<Vec<(PlayerId, Notice)>>,
    }

    impl RecordingNotifier {
        pub fn all(&self) -> Vec<(PlayerId, Notice)> {
            self.notices.lock().unwrap().clone()
        }

        pub fn for_player(&self, player: PlayerId) -> Vec<Notice> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| *p == player)
                .map(|(_, n)| n.clone())
                .collect()
        }

        pub fn clear(&self) {
            self.notices.lock().unwrap().clear();
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, player: PlayerId, notice: Notice) {
            self.notices.lock().unwrap().push((player, notice));
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HookCall {
        Join(PlayerId, InstanceId),
        Leave(PlayerId),
        MatchStart(PlayerId),
        MatchStop(PlayerId),
    }

    /// Records every session hook invocation, in order.
    #[derive(Default)]
    pub struct RecordingSessionHooks {
        calls: Mutex<Vec<HookCall>>,
    }

    impl RecordingSessionHooks {
        pub fn calls(&self) -> Vec<HookCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SessionHooks for RecordingSessionHooks {
        fn on_join(&self, player: PlayerId, instance: InstanceId) {
            self.calls.lock().unwrap().push(HookCall::Join(player, instance));
        }

        fn on_leave(&self, player: PlayerId) {
            self.calls.lock().unwrap().push(HookCall::Leave(player));
        }

        fn on_match_start(&self, player: PlayerId) {
            self.calls.lock().unwrap().push(HookCall::MatchStart(player));
        }

        fn on_match_stop(&self, player: PlayerId) {
            self.calls.lock().unwrap().push(HookCall::MatchStop(player));
        }
    }

    /// Provisioner with scriptable failures. Every world resolves unless
    /// marked missing; play-space allocation can be switched off.
    #[derive(Default)]
    pub struct FakeWorlds {
        missing: Mutex<HashSet<String>>,
        fail_playspace: Mutex<bool>,
        live: Mutex<HashSet<PlayspaceHandle>>,
        provisioned: AtomicUsize,
    }

    impl FakeWorlds {
        pub fn mark_missing(&self, world: &str) {
            self.missing.lock().unwrap().insert(world.to_string());
        }

        pub fn restore(&self, world: &str) {
            self.missing.lock().unwrap().remove(world);
        }

        pub fn fail_playspaces(&self, fail: bool) {
            *self.fail_playspace.lock().unwrap() = fail;
        }

        /// Play-spaces allocated and not yet released.
        pub fn live_playspaces(&self) -> usize {
            self.live.lock().unwrap().len()
        }

        pub fn provisioned_total(&self) -> usize {
            self.provisioned.load(Ordering::Relaxed)
        }
    }

    impl WorldProvisioner for FakeWorlds {
        fn resolve_location(
            &self,
            descriptor: &LocationDescriptor,
        ) -> Result<ConcreteLocation, ProvisioningError> {
            if self.missing.lock().unwrap().contains(&descriptor.world) {
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
            if *self.fail_playspace.lock().unwrap() {
                return Err(ProvisioningError::PlayspaceAllocation(format!(
                    "no capacity for {map_ref}"
                )));
            }
            let handle = PlayspaceHandle {
                instance,
                world_name: format!("{map_ref}_{}", instance.short()),
            };
            self.live.lock().unwrap().insert(handle.clone());
            self.provisioned.fetch_add(1, Ordering::Relaxed);
            Ok(handle)
        }

        fn release_playspace(&self, handle: &PlayspaceHandle) {
            self.live.lock().unwrap().remove(handle);
        }
    }

    /// Rank table; unknown players are `Default`.
    #[derive(Default)]
    pub struct FixedRanks {
        tiers: Mutex<HashMap<PlayerId, PriorityTier>>,
    }

    impl FixedRanks {
        pub fn set(&self, player: PlayerId, tier: PriorityTier) {
            self.tiers.lock().unwrap().insert(player, tier);
        }
    }

    impl RankSource for FixedRanks {
        fn tier_of(&self, player: PlayerId) -> PriorityTier {
            self.tiers
                .lock()
                .unwrap()
                .get(&player)
                .copied()
                .unwrap_or_default()
        }
    }

    /// Enables priority admission for exactly the listed tiers.
    pub struct TierPolicy(pub Vec<PriorityTier>);

    impl Default for TierPolicy {
        fn default() -> Self {
            Self(vec![
                PriorityTier::Vip,
                PriorityTier::VipPlus,
                PriorityTier::Staff,
            ])
        }
    }

    impl AdmissionPolicy for TierPolicy {
        fn priority_admission_enabled(&self, tier: PriorityTier) -> bool {
            self.0.contains(&tier)
        }
    }
}
