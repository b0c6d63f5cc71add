use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::{
    Effect, LifecyclePhase, LifecycleSettings, PhaseContext, PhaseEvent, PhaseKind, advance,
};
use crate::location::{ConcreteLocation, PlayspaceHandle};
use crate::player::PlayerId;
use crate::template::Template;

/// Opaque identity of one play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used for display names and world names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Rejected per-instance capacity edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundsError {
    MinPlayersZero,
    MaxBelowMin { min: usize, max: usize },
    MaxBelowLiving { living: usize, max: usize },
}

impl std::fmt::Display for BoundsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinPlayersZero => write!(f, "min_players must be at least 1"),
            Self::MaxBelowMin { min, max } => {
                write!(f, "max_players ({max}) is below min_players ({min})")
            },
            Self::MaxBelowLiving { living, max } => {
                write!(f, "max_players ({max}) is below the current living count ({living})")
            },
        }
    }
}

impl std::error::Error for BoundsError {}

/// One ephemeral, stateful play-through created from a [`Template`].
///
/// Membership is kept in join order. Nothing here enforces the cluster-wide
/// single-membership rule; that is the orchestrator's job.
#[derive(Debug, Clone)]
pub struct Instance {
    id: InstanceId,
    display_name: String,
    template: Arc<Template>,
    phase: LifecyclePhase,
    living: Vec<PlayerId>,
    spectating: Vec<PlayerId>,
    kills: HashMap<PlayerId, u32>,
    /// Living members at the moment the match started.
    participants: Vec<PlayerId>,
    min_players: usize,
    max_players: usize,
    lobby_location: ConcreteLocation,
    main_location: ConcreteLocation,
    playspace: Option<PlayspaceHandle>,
}

impl Instance {
    /// Fresh Lobby instance with empty membership and bounds copied from the template.
    pub fn new(
        id: InstanceId,
        template: Arc<Template>,
        lobby_location: ConcreteLocation,
        main_location: ConcreteLocation,
    ) -> Self {
        Self {
            display_name: format!("{}-{}", template.name, id.short()),
            min_players: template.min_players,
            max_players: template.max_players,
            id,
            template,
            phase: LifecyclePhase::default(),
            living: Vec::new(),
            spectating: Vec::new(),
            kills: HashMap::new(),
            participants: Vec::new(),
            lobby_location,
            main_location,
            playspace: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn phase(&self) -> &LifecyclePhase {
        &self.phase
    }

    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn living(&self) -> &[PlayerId] {
        &self.living
    }

    /// Players that were living when the match started, including those
    /// eliminated since. Empty while in Lobby.
    pub fn participants(&self) -> &[PlayerId] {
        &self.participants
    }

    pub fn spectating(&self) -> &[PlayerId] {
        &self.spectating
    }

    /// Living members followed by spectators.
    pub fn members(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.living.iter().chain(self.spectating.iter()).copied()
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn lobby_location(&self) -> &ConcreteLocation {
        &self.lobby_location
    }

    pub fn main_location(&self) -> &ConcreteLocation {
        &self.main_location
    }

    pub fn playspace(&self) -> Option<&PlayspaceHandle> {
        self.playspace.as_ref()
    }

    pub fn set_playspace(&mut self, handle: PlayspaceHandle) {
        self.playspace = Some(handle);
    }

    /// Hand the play-space back to the caller for release.
    pub fn take_playspace(&mut self) -> Option<PlayspaceHandle> {
        self.playspace.take()
    }

    pub fn has_capacity(&self) -> bool {
        self.living.len() < self.max_players
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.living.contains(&player) || self.spectating.contains(&player)
    }

    pub fn is_living(&self, player: PlayerId) -> bool {
        self.living.contains(&player)
    }

    /// Returns false if the player is already a member.
    pub fn add_living(&mut self, player: PlayerId) -> bool {
        if self.is_member(player) {
            return false;
        }
        self.living.push(player);
        true
    }

    /// Returns false if the player is already a member.
    pub fn add_spectator(&mut self, player: PlayerId) -> bool {
        if self.is_member(player) {
            return false;
        }
        self.spectating.push(player);
        true
    }

    /// Drop the player from both sets. Returns true if they were a member.
    pub fn remove_member(&mut self, player: PlayerId) -> bool {
        let before = self.living.len() + self.spectating.len();
        self.living.retain(|p| *p != player);
        self.spectating.retain(|p| *p != player);
        before != self.living.len() + self.spectating.len()
    }

    /// Move a living member to the spectating set.
    pub fn eliminate(&mut self, player: PlayerId) -> bool {
        let Some(pos) = self.living.iter().position(|p| *p == player) else {
            return false;
        };
        self.living.remove(pos);
        self.spectating.push(player);
        true
    }

    pub fn record_kill(&mut self, killer: PlayerId) -> u32 {
        let count = self.kills.entry(killer).or_insert(0);
        *count += 1;
        *count
    }

    pub fn kills(&self, player: PlayerId) -> u32 {
        self.kills.get(&player).copied().unwrap_or(0)
    }

    /// Empty both sets and the kill table, returning every former member.
    pub fn clear_membership(&mut self) -> Vec<PlayerId> {
        let mut members = std::mem::take(&mut self.living);
        members.append(&mut self.spectating);
        self.kills.clear();
        members
    }

    /// Adjust this instance's bounds independently of its template.
    pub fn set_bounds(
        &mut self,
        min_players: usize,
        max_players: usize,
    ) -> Result<(), BoundsError> {
        if min_players == 0 {
            return Err(BoundsError::MinPlayersZero);
        }
        if max_players < min_players {
            return Err(BoundsError::MaxBelowMin {
                min: min_players,
                max: max_players,
            });
        }
        if max_players < self.living.len() {
            return Err(BoundsError::MaxBelowLiving {
                living: self.living.len(),
                max: max_players,
            });
        }
        self.min_players = min_players;
        self.max_players = max_players;
        Ok(())
    }

    /// Feed an event through the lifecycle rules, storing the next phase.
    pub fn advance(&mut self, event: PhaseEvent, settings: &LifecycleSettings) -> Vec<Effect> {
        let ctx = PhaseContext {
            living: self.living.len(),
            min_players_to_start: self.template.min_players_to_start.min(self.max_players),
            max_players: self.max_players,
            settings,
        };
        let phase = std::mem::take(&mut self.phase);
        let from = phase.kind();
        let (next, effects) = advance(phase, &ctx, event);
        if from == PhaseKind::Lobby && next.kind() == PhaseKind::Active {
            self.participants = self.living.clone();
        }
        if next.kind() != from {
            tracing::debug!(instance = %self.id, from = %from, to = %next.kind(), "phase changed");
        }
        self.phase = next;
        effects
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id,
            display_name: self.display_name.clone(),
            template: self.template.name.clone(),
            phase: self.phase.kind(),
            countdown: self
                .phase
                .countdown()
                .filter(|c| c.is_running())
                .map(|c| c.seconds_remaining()),
            living: self.living.clone(),
            spectating: self.spectating.clone(),
            min_players: self.min_players,
            max_players: self.max_players,
            degraded: self.playspace.is_none(),
        }
    }
}

/// Read-only, serialisable view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: InstanceId,
    pub display_name: String,
    pub template: String,
    pub phase: PhaseKind,
    pub countdown: Option<u32>,
    pub living: Vec<PlayerId>,
    pub spectating: Vec<PlayerId>,
    pub min_players: usize,
    pub max_players: usize,
    /// True when no play-space could be allocated.
    pub degraded: bool,
}
