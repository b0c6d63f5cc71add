use std::sync::Arc;

use skirmish_core::error::ProvisioningError;
use skirmish_core::instance::{Instance, InstanceId};
use skirmish_core::location::{ConcreteLocation, LocationDescriptor};
use skirmish_core::ports::WorldProvisioner;
use skirmish_core::template::Template;

/// Builds runnable Lobby instances from templates.
///
/// Location resolution failures abort creation. A failed play-space
/// allocation does not: the instance is returned without one and a warning is
/// logged, so registry bookkeeping never waits on asset availability.
pub struct InstanceFactory {
    worlds: Arc<dyn WorldProvisioner>,
}

impl InstanceFactory {
    pub fn new(worlds: Arc<dyn WorldProvisioner>) -> Self {
        Self { worlds }
    }

    pub fn create_from_template(
        &self,
        template: &Arc<Template>,
    ) -> Result<Instance, ProvisioningError> {
        let lobby = self.resolve(template, template.lobby_location.as_ref())?;
        let main = self.resolve(template, template.main_location.as_ref())?;

        let id = InstanceId::new();
        let mut instance = Instance::new(id, Arc::clone(template), lobby, main);

        match self.worlds.provision_playspace(id, &template.map_ref) {
            Ok(handle) => {
                tracing::debug!(instance = %id, world = %handle.world_name, "play-space allocated");
                instance.set_playspace(handle);
            },
            Err(e) => {
                tracing::warn!(
                    instance = %id,
                    template = %template.name,
                    error = %e,
                    "Play-space allocation failed, instance is degraded"
                );
            },
        }

        tracing::info!(
            instance = %id,
            name = instance.display_name(),
            template = %template.name,
            "Instance created"
        );
        Ok(instance)
    }

    /// Give an instance's play-space back to the provisioner, if it has one.
    pub fn release(&self, instance: &mut Instance) {
        if let Some(handle) = instance.take_playspace() {
            self.worlds.release_playspace(&handle);
        }
    }

    fn resolve(
        &self,
        template: &Template,
        descriptor: Option<&LocationDescriptor>,
    ) -> Result<ConcreteLocation, ProvisioningError> {
        let descriptor =
            descriptor.ok_or_else(|| ProvisioningError::TemplateIncomplete(template.name.clone()))?;
        self.worlds.resolve_location(descriptor).map_err(|e| {
            tracing::warn!(
                template = %template.name,
                location = %descriptor,
                error = %e,
                "Location unresolved"
            );
            ProvisioningError::UnresolvedLocation {
                template: template.name.clone(),
                descriptor: descriptor.to_string(),
            }
        })
    }
}
