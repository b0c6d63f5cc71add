//! Collaborators the orchestrator consumes but does not implement.
//!
//! Implementations must be cheap to call and must not call back into the
//! orchestrator synchronously. The orchestrator never holds its registry
//! lock while calling [`SessionHooks`], [`Notifier`] or [`WorldProvisioner`].

use crate::error::ProvisioningError;
use crate::instance::InstanceId;
use crate::location::{ConcreteLocation, LocationDescriptor, PlayspaceHandle};
use crate::notice::Notice;
use crate::player::{PlayerId, PriorityTier};
use crate::template::Template;

/// World/asset provisioning: turns descriptors into places and hands out
/// per-instance play-spaces.
pub trait WorldProvisioner: Send + Sync {
    fn resolve_location(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<ConcreteLocation, ProvisioningError>;

    /// May be slow; called without any orchestrator lock held.
    fn provision_playspace(
        &self,
        instance: InstanceId,
        map_ref: &str,
    ) -> Result<PlayspaceHandle, ProvisioningError>;

    fn release_playspace(&self, handle: &PlayspaceHandle);
}

/// Statistics, transient-ability cleanup and display state attached to a session.
pub trait SessionHooks: Send + Sync {
    fn on_join(&self, player: PlayerId, instance: InstanceId);
    fn on_leave(&self, player: PlayerId);
    /// Once per match for every living member at start.
    fn on_match_start(&self, player: PlayerId);
    fn on_match_stop(&self, player: PlayerId);
}

/// Delivery of structured notices to players.
pub trait Notifier: Send + Sync {
    fn notify(&self, player: PlayerId, notice: Notice);
}

/// External rank/permission lookup. Called at high frequency; no caching
/// is expected from callers.
pub trait RankSource: Send + Sync {
    fn tier_of(&self, player: PlayerId) -> PriorityTier;
}

/// Whether a tier may preempt lower tiers when an instance is full.
pub trait AdmissionPolicy: Send + Sync {
    fn priority_admission_enabled(&self, tier: PriorityTier) -> bool;
}

/// Template persistence driven by admin tooling, never by the orchestrator.
pub trait TemplateStore: Send + Sync {
    fn load(&self) -> Vec<Template>;
    fn save(&self, template: &Template);
    fn delete(&self, name: &str);
}
