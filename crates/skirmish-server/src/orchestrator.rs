//! Admission, removal and lifecycle driving for every match instance.
//!
//! All registry reads and writes happen under one registry lock. Work that
//! leaves the process boundary (notices, session hooks, play-space release
//! and provisioning) is collected in an [`Outbox`] while the lock is held and
//! performed after it is released, so a slow collaborator never stalls
//! admissions and a collaborator can never observe a half-applied change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use rand::seq::{IndexedRandom, SliceRandom};
use serde::Serialize;

use skirmish_core::error::ProvisioningError;
use skirmish_core::instance::{Instance, InstanceId, InstanceSnapshot};
use skirmish_core::lifecycle::{Effect, LifecycleSettings, PhaseEvent, PhaseKind};
use skirmish_core::notice::{Notice, RejectReason};
use skirmish_core::player::PlayerId;
use skirmish_core::ports::{AdmissionPolicy, Notifier, RankSource, SessionHooks, WorldProvisioner};
use skirmish_core::template::Template;

use crate::error::AdminError;
use crate::factory::InstanceFactory;
use crate::priority::PriorityResolver;
use crate::registry::InstanceRegistry;

/// External services the orchestrator is wired to at construction.
pub struct Collaborators {
    pub worlds: Arc<dyn WorldProvisioner>,
    pub sessions: Arc<dyn SessionHooks>,
    pub notifier: Arc<dyn Notifier>,
    pub ranks: Arc<dyn RankSource>,
    pub policy: Arc<dyn AdmissionPolicy>,
}

/// Successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub instance: InstanceId,
    /// Lower-tier member bumped to make room, if any.
    pub evicted: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub templates: usize,
    pub lobby_instances: usize,
    pub active_instances: usize,
    pub members: usize,
}

enum Deferred {
    Notify(PlayerId, Notice),
    Join(PlayerId, InstanceId),
    Leave(PlayerId),
    MatchStart(PlayerId),
    MatchStop(PlayerId),
}

/// Side effects recorded under the registry lock, replayed after it drops.
#[derive(Default)]
struct Outbox {
    calls: Vec<Deferred>,
    recycle: Vec<InstanceId>,
}

impl Outbox {
    fn push(&mut self, call: Deferred) {
        self.calls.push(call);
    }

    fn notify(&mut self, player: PlayerId, notice: Notice) {
        self.calls.push(Deferred::Notify(player, notice));
    }

    fn broadcast(&mut self, instance: &Instance, notice: &Notice) {
        for player in instance.members() {
            self.notify(player, notice.clone());
        }
    }
}

pub struct Orchestrator {
    registry: Mutex<InstanceRegistry>,
    /// Held while refilling an empty lobby pool so concurrent callers don't
    /// each provision an instance. Never taken while `registry` is held.
    replenish: Mutex<()>,
    factory: InstanceFactory,
    resolver: PriorityResolver,
    sessions: Arc<dyn SessionHooks>,
    notifier: Arc<dyn Notifier>,
    policy: Arc<dyn AdmissionPolicy>,
    settings: LifecycleSettings,
}

impl Orchestrator {
    pub fn new(
        templates: impl IntoIterator<Item = Template>,
        collaborators: Collaborators,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            registry: Mutex::new(InstanceRegistry::with_templates(templates)),
            replenish: Mutex::new(()),
            factory: InstanceFactory::new(collaborators.worlds),
            resolver: PriorityResolver::new(collaborators.ranks),
            sessions: collaborators.sessions,
            notifier: collaborators.notifier,
            policy: collaborators.policy,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, InstanceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create one Lobby instance per complete template. Returns how many were created.
    pub fn warm_up(&self) -> usize {
        let templates = self.lock().complete_templates();
        let mut created = 0;
        for template in &templates {
            match self.factory.create_from_template(template) {
                Ok(instance) => {
                    self.lock().insert_lobby(instance);
                    created += 1;
                },
                Err(e) => {
                    tracing::warn!(
                        template = %template.name,
                        error = %e,
                        "Startup instance creation failed"
                    );
                },
            }
        }
        created
    }

    // ------------------------------------------------------------------
    // Admission and removal
    // ------------------------------------------------------------------

    /// Add `player` to the living set of a Lobby instance, evicting a lower
    /// tier member when the instance is full and the joiner's tier allows it.
    ///
    /// Rejections are also delivered to the player as [`Notice::Rejected`].
    pub fn admit(&self, player: PlayerId, instance: InstanceId) -> Result<Admission, RejectReason> {
        let mut out = Outbox::default();
        let result = {
            let mut registry = self.lock();
            self.admit_locked(&mut registry, player, instance, &mut out)
        };
        match &result {
            Ok(admission) => {
                tracing::debug!(
                    player = %player,
                    instance = %instance,
                    evicted = ?admission.evicted,
                    "player admitted"
                );
            },
            Err(reason) => {
                tracing::debug!(
                    player = %player,
                    instance = %instance,
                    reason = %reason,
                    "admission rejected"
                );
                out.notify(player, Notice::Rejected { reason: *reason });
            },
        }
        self.flush(out);
        result
    }

    fn admit_locked(
        &self,
        registry: &mut InstanceRegistry,
        player: PlayerId,
        id: InstanceId,
        out: &mut Outbox,
    ) -> Result<Admission, RejectReason> {
        if let Some(current) = registry.instance_containing(player) {
            return Err(RejectReason::AlreadyMember {
                instance: current.id(),
            });
        }
        let target = registry.get(id).ok_or(RejectReason::UnknownInstance)?;
        if target.phase_kind() != PhaseKind::Lobby {
            return Err(RejectReason::NotJoinable {
                phase: target.phase_kind(),
            });
        }

        let mut evicted = None;
        if !target.has_capacity() {
            let tier = self.resolver.priority_of(player);
            if !self.policy.priority_admission_enabled(tier) {
                return Err(RejectReason::Full);
            }
            let victim = self
                .resolver
                .find_eviction_candidate(target.living(), player)
                .ok_or(RejectReason::PrioritySlotsFull)?;
            // The joiner takes the slot in the same critical section, so the
            // lobby countdown is re-evaluated once, after the join.
            Self::detach_locked(registry, victim, out);
            out.notify(victim, Notice::Evicted { instance: id });
            tracing::info!(
                player = %victim,
                joining = %player,
                tier = %tier,
                instance = %id,
                "Evicted for priority admission"
            );
            evicted = Some(victim);
        }

        let target = registry.get_mut(id).ok_or(RejectReason::UnknownInstance)?;
        target.add_living(player);
        out.push(Deferred::Join(player, id));
        out.notify(
            player,
            Notice::Joined {
                instance: id,
                living: target.living().len(),
                max_players: target.max_players(),
            },
        );
        let effects = target.advance(PhaseEvent::MembershipChanged, &self.settings);
        self.apply_effects(registry, id, effects, out);
        Ok(Admission {
            instance: id,
            evicted,
        })
    }

    /// Add `player` as a spectator of a running (Active or End) instance.
    pub fn spectate(&self, player: PlayerId, instance: InstanceId) -> Result<(), RejectReason> {
        let mut out = Outbox::default();
        let result = {
            let mut registry = self.lock();
            Self::spectate_locked(&mut registry, player, instance, &mut out)
        };
        if let Err(reason) = &result {
            out.notify(player, Notice::Rejected { reason: *reason });
        }
        self.flush(out);
        result
    }

    fn spectate_locked(
        registry: &mut InstanceRegistry,
        player: PlayerId,
        id: InstanceId,
        out: &mut Outbox,
    ) -> Result<(), RejectReason> {
        if let Some(current) = registry.instance_containing(player) {
            return Err(RejectReason::AlreadyMember {
                instance: current.id(),
            });
        }
        let target = registry.get_mut(id).ok_or(RejectReason::UnknownInstance)?;
        if target.phase_kind() == PhaseKind::Lobby {
            return Err(RejectReason::NotJoinable {
                phase: PhaseKind::Lobby,
            });
        }
        target.add_spectator(player);
        out.push(Deferred::Join(player, id));
        out.notify(player, Notice::Spectating { instance: id });
        tracing::debug!(player = %player, instance = %id, "spectator added");
        Ok(())
    }

    /// Remove `player` from whatever instance holds them. Returns false when
    /// they were in none; calling it again is harmless.
    pub fn remove(&self, player: PlayerId) -> bool {
        let mut out = Outbox::default();
        let removed = {
            let mut registry = self.lock();
            self.remove_locked(&mut registry, player, &mut out)
        };
        self.flush(out);
        removed.is_some()
    }

    fn remove_locked(
        &self,
        registry: &mut InstanceRegistry,
        player: PlayerId,
        out: &mut Outbox,
    ) -> Option<InstanceId> {
        let id = Self::detach_locked(registry, player, out)?;
        out.notify(player, Notice::Left { instance: id });
        if let Some(instance) = registry.get_mut(id) {
            let effects = instance.advance(PhaseEvent::MembershipChanged, &self.settings);
            self.apply_effects(registry, id, effects, out);
        }
        Some(id)
    }

    /// Membership removal plus session detach, without lifecycle re-evaluation.
    fn detach_locked(
        registry: &mut InstanceRegistry,
        player: PlayerId,
        out: &mut Outbox,
    ) -> Option<InstanceId> {
        let id = registry.instance_containing(player)?.id();
        let instance = registry.get_mut(id)?;
        instance.remove_member(player);
        out.push(Deferred::Leave(player));
        tracing::debug!(player = %player, instance = %id, "player removed");
        Some(id)
    }

    /// Move a living member of an Active instance to its spectators and
    /// credit the killer. Runs the same win check as a removal.
    pub fn eliminate(&self, victim: PlayerId, killer: Option<PlayerId>) -> bool {
        let mut out = Outbox::default();
        let eliminated = {
            let mut registry = self.lock();
            self.eliminate_locked(&mut registry, victim, killer, &mut out)
        };
        self.flush(out);
        eliminated
    }

    fn eliminate_locked(
        &self,
        registry: &mut InstanceRegistry,
        victim: PlayerId,
        killer: Option<PlayerId>,
        out: &mut Outbox,
    ) -> bool {
        let Some(id) = registry.instance_containing(victim).map(Instance::id) else {
            return false;
        };
        let Some(instance) = registry.get_mut(id) else {
            return false;
        };
        if instance.phase_kind() != PhaseKind::Active || !instance.eliminate(victim) {
            return false;
        }
        let killer = killer.filter(|k| *k != victim && instance.is_member(*k));
        if let Some(k) = killer {
            let total = instance.record_kill(k);
            tracing::debug!(player = %k, instance = %id, kills = total, "kill recorded");
        }
        out.broadcast(
            instance,
            &Notice::Eliminated {
                player: victim,
                killer,
            },
        );
        let effects = instance.advance(PhaseEvent::MembershipChanged, &self.settings);
        self.apply_effects(registry, id, effects, out);
        true
    }

    /// Kills credited to `player` in the given instance.
    pub fn kills(&self, instance: InstanceId, player: PlayerId) -> Option<u32> {
        self.lock().get(instance).map(|i| i.kills(player))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Move a Lobby instance to Active regardless of how many players it
    /// has. Anything else is reported and ignored.
    pub fn start_match(&self, instance: InstanceId) -> bool {
        let mut out = Outbox::default();
        let started = {
            let mut registry = self.lock();
            self.start_locked(&mut registry, instance, &mut out)
        };
        self.flush(out);
        started
    }

    fn start_locked(
        &self,
        registry: &mut InstanceRegistry,
        id: InstanceId,
        out: &mut Outbox,
    ) -> bool {
        if !registry.promote(id) {
            tracing::warn!(
                instance = %id,
                "start_match on an instance that is not in the lobby pool"
            );
            return false;
        }
        let Some(instance) = registry.get_mut(id) else {
            return false;
        };
        let effects = instance.advance(
            PhaseEvent::Start {
                at: SystemTime::now(),
            },
            &self.settings,
        );
        for player in instance.participants() {
            out.push(Deferred::MatchStart(*player));
        }
        tracing::info!(
            instance = %id,
            name = instance.display_name(),
            players = instance.living().len(),
            "Match started"
        );
        self.apply_effects(registry, id, effects, out);
        true
    }

    fn finish_locked(&self, registry: &mut InstanceRegistry, id: InstanceId, out: &mut Outbox) {
        let Some(instance) = registry.get_mut(id) else {
            return;
        };
        if instance.phase_kind() != PhaseKind::Active {
            return;
        }
        let effects = instance.advance(PhaseEvent::Finish, &self.settings);
        tracing::info!(
            instance = %id,
            name = instance.display_name(),
            survivors = instance.living().len(),
            "Match ended"
        );
        self.apply_effects(registry, id, effects, out);
    }

    fn apply_effects(
        &self,
        registry: &mut InstanceRegistry,
        id: InstanceId,
        effects: Vec<Effect>,
        out: &mut Outbox,
    ) {
        for effect in effects {
            let notice = match effect {
                Effect::CountdownStarted { seconds } => {
                    tracing::debug!(instance = %id, seconds, "lobby countdown started");
                    Notice::CountdownStarted { seconds }
                },
                Effect::CountdownShortened { seconds } => {
                    tracing::debug!(instance = %id, seconds, "lobby countdown shortened");
                    Notice::CountdownShortened { seconds }
                },
                Effect::CountdownCancelled => {
                    tracing::debug!(instance = %id, "lobby countdown cancelled");
                    Notice::CountdownCancelled
                },
                Effect::CountdownTick { seconds } => Notice::CountdownTick { seconds },
                Effect::MatchStarted => Notice::MatchStarted { instance: id },
                Effect::ProtectionEnded => Notice::ProtectionEnded,
                Effect::MatchEnded => {
                    let winner = registry.get(id).and_then(|i| match i.living() {
                        [only] => Some(*only),
                        _ => None,
                    });
                    Notice::MatchEnded { winner }
                },
                Effect::StartMatch => {
                    self.start_locked(registry, id, out);
                    continue;
                },
                Effect::EndMatch => {
                    self.finish_locked(registry, id, out);
                    continue;
                },
                Effect::Recycle => {
                    out.recycle.push(id);
                    continue;
                },
            };
            if let Some(instance) = registry.get(id) {
                out.broadcast(instance, &notice);
            }
        }
    }

    /// Advance every instance by one second.
    pub fn tick(&self) {
        let mut out = Outbox::default();
        {
            let mut registry = self.lock();
            for id in registry.ids() {
                if let Some(instance) = registry.get_mut(id) {
                    let effects = instance.advance(PhaseEvent::Tick, &self.settings);
                    self.apply_effects(&mut registry, id, effects, &mut out);
                }
            }
        }
        self.flush(out);
    }

    /// Retire an instance from any phase and replace it with a fresh Lobby
    /// instance of the same template.
    ///
    /// Returns the replacement's id, or `None` when no replacement could be
    /// made (template unregistered, incomplete, or provisioning failed). The
    /// pool is then one short until the next replenishment.
    pub fn stop(&self, instance: InstanceId) -> Result<Option<InstanceId>, AdminError> {
        let mut out = Outbox::default();
        let (mut retired, template) = {
            let mut registry = self.lock();
            let mut retired = registry.take(instance).ok_or(AdminError::UnknownInstance)?;
            Self::retire(&mut retired, &mut out);
            let template = registry.template(&retired.template().name);
            (retired, template)
        };
        self.flush(out);
        self.factory.release(&mut retired);
        tracing::info!(instance = %instance, name = retired.display_name(), "Instance retired");

        let name = &retired.template().name;
        let Some(template) = template else {
            tracing::warn!(
                template = %name,
                "Template no longer registered, not replacing instance"
            );
            return Ok(None);
        };
        if !template.is_complete() {
            tracing::warn!(template = %name, "Template is incomplete, not replacing instance");
            return Ok(None);
        }
        match self.factory.create_from_template(&template) {
            Ok(replacement) => {
                let id = replacement.id();
                self.lock().insert_lobby(replacement);
                Ok(Some(id))
            },
            Err(e) => {
                tracing::warn!(
                    template = %name,
                    error = %e,
                    "Replacement creation failed, lobby pool is one short"
                );
                Ok(None)
            },
        }
    }

    /// Clear membership, queueing a closing notice per member. Only match
    /// participants get the match-stop hook.
    fn retire(instance: &mut Instance, out: &mut Outbox) {
        let id = instance.id();
        let participants = instance.participants().to_vec();
        for player in instance.clear_membership() {
            if participants.contains(&player) {
                out.push(Deferred::MatchStop(player));
            }
            out.push(Deferred::Leave(player));
            out.notify(player, Notice::InstanceClosed { instance: id });
        }
    }

    /// Retire every instance without replacement. Returns how many were retired.
    pub fn shutdown(&self) -> usize {
        let mut out = Outbox::default();
        let mut retired = self.lock().drain();
        for instance in &mut retired {
            Self::retire(instance, &mut out);
        }
        self.flush(out);
        for instance in &mut retired {
            self.factory.release(instance);
        }
        tracing::info!(instances = retired.len(), "Orchestrator shut down");
        retired.len()
    }

    // ------------------------------------------------------------------
    // Pool
    // ------------------------------------------------------------------

    /// A Lobby instance with a free slot, creating one from a random complete
    /// template when none exists.
    ///
    /// `None` when no complete template exists, or every one of them failed
    /// to provision.
    pub fn find_random_available(&self) -> Option<InstanceId> {
        if let Some(id) = self.pick_open_lobby() {
            return Some(id);
        }
        let _guard = self.replenish.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have refilled the pool while we waited.
        if let Some(id) = self.pick_open_lobby() {
            return Some(id);
        }
        self.replenish()
    }

    /// Make sure at least one Lobby instance exists. Returns false only when
    /// the pool is empty and could not be refilled.
    pub fn ensure_lobby_pool_non_empty(&self) -> bool {
        if !self.lock().lobby_is_empty() {
            return true;
        }
        let _guard = self.replenish.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.lock().lobby_is_empty() {
            return true;
        }
        self.replenish().is_some()
    }

    fn pick_open_lobby(&self) -> Option<InstanceId> {
        let registry = self.lock();
        let open: Vec<InstanceId> = registry
            .lobby_instances()
            .filter(|i| i.has_capacity())
            .map(Instance::id)
            .collect();
        open.choose(&mut rand::rng()).copied()
    }

    /// Create one Lobby instance, trying complete templates in random order
    /// until one provisions.
    fn replenish(&self) -> Option<InstanceId> {
        let mut candidates = self.lock().complete_templates();
        if candidates.is_empty() {
            tracing::debug!("no complete template to refill the lobby pool from");
            return None;
        }
        candidates.shuffle(&mut rand::rng());
        for template in &candidates {
            match self.factory.create_from_template(template) {
                Ok(instance) => {
                    let id = instance.id();
                    self.lock().insert_lobby(instance);
                    return Some(id);
                },
                Err(e) => {
                    tracing::warn!(
                        template = %template.name,
                        error = %e,
                        "Pool replenishment failed, trying another template"
                    );
                },
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    /// Explicitly create a Lobby instance, surfacing provisioning failures.
    pub fn create_instance(&self, template: &str) -> Result<InstanceId, AdminError> {
        let found = self
            .lock()
            .template(template)
            .ok_or_else(|| AdminError::UnknownTemplate(template.to_string()))?;
        if !found.is_complete() {
            return Err(ProvisioningError::TemplateIncomplete(template.to_string()).into());
        }
        let instance = self.factory.create_from_template(&found)?;
        let id = instance.id();
        self.lock().insert_lobby(instance);
        Ok(id)
    }

    /// Change one instance's player bounds. A Lobby instance re-evaluates its
    /// countdown against the new maximum.
    pub fn set_player_bounds(
        &self,
        instance: InstanceId,
        min_players: usize,
        max_players: usize,
    ) -> Result<(), AdminError> {
        let mut out = Outbox::default();
        let result = {
            let mut registry = self.lock();
            self.set_bounds_locked(&mut registry, instance, min_players, max_players, &mut out)
        };
        self.flush(out);
        result
    }

    fn set_bounds_locked(
        &self,
        registry: &mut InstanceRegistry,
        id: InstanceId,
        min_players: usize,
        max_players: usize,
        out: &mut Outbox,
    ) -> Result<(), AdminError> {
        let instance = registry.get_mut(id).ok_or(AdminError::UnknownInstance)?;
        instance.set_bounds(min_players, max_players)?;
        tracing::info!(instance = %id, min_players, max_players, "Player bounds changed");
        if instance.phase_kind() == PhaseKind::Lobby {
            let effects = instance.advance(PhaseEvent::MembershipChanged, &self.settings);
            self.apply_effects(registry, id, effects, out);
        }
        Ok(())
    }

    /// Add or replace a template. Returns true when one was replaced.
    /// Existing instances keep the version they were created from.
    pub fn register_template(&self, template: Template) -> Result<bool, AdminError> {
        template.validate()?;
        let name = template.name.clone();
        let replaced = self.lock().insert_template(template).is_some();
        tracing::info!(template = %name, replaced, "Template registered");
        Ok(replaced)
    }

    /// Forget a template. Its running instances finish but are not replaced.
    pub fn unregister_template(&self, name: &str) -> bool {
        let removed = self.lock().remove_template(name).is_some();
        if removed {
            tracing::info!(template = %name, "Template unregistered");
        }
        removed
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn templates(&self) -> Vec<Template> {
        let mut templates: Vec<Template> =
            self.lock().templates().map(|t| t.as_ref().clone()).collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        self.lock().snapshot()
    }

    pub fn instance(&self, id: InstanceId) -> Option<InstanceSnapshot> {
        self.lock().get(id).map(Instance::snapshot)
    }

    pub fn instance_by_name(&self, display_name: &str) -> Option<InstanceSnapshot> {
        self.lock().by_name(display_name).map(Instance::snapshot)
    }

    /// The instance `player` is living or spectating in.
    pub fn instance_of(&self, player: PlayerId) -> Option<InstanceId> {
        self.lock().instance_containing(player).map(Instance::id)
    }

    pub fn stats(&self) -> OrchestratorStats {
        let registry = self.lock();
        let (_, members) = registry.stats();
        OrchestratorStats {
            templates: registry.templates().count(),
            lobby_instances: registry.lobby_instances().count(),
            active_instances: registry.active_instances().count(),
            members,
        }
    }

    fn flush(&self, out: Outbox) {
        for call in out.calls {
            match call {
                Deferred::Notify(player, notice) => self.notifier.notify(player, notice),
                Deferred::Join(player, instance) => self.sessions.on_join(player, instance),
                Deferred::Leave(player) => self.sessions.on_leave(player),
                Deferred::MatchStart(player) => self.sessions.on_match_start(player),
                Deferred::MatchStop(player) => self.sessions.on_match_stop(player),
            }
        }
        for id in out.recycle {
            if let Err(e) = self.stop(id) {
                tracing::debug!(instance = %id, error = %e, "recycle skipped");
            }
        }
    }
}
