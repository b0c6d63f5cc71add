/// Failure to turn a template into a runnable instance.
///
/// Always recoverable: a failed replenishment leaves the lobby pool one
/// instance short and the next pool query retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    TemplateIncomplete(String),
    UnresolvedLocation { template: String, descriptor: String },
    WorldUnavailable(String),
    PlayspaceAllocation(String),
}

impl std::fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateIncomplete(name) => write!(f, "template is incomplete: {name}"),
            Self::UnresolvedLocation {
                template,
                descriptor,
            } => write!(f, "template {template}: cannot resolve location {descriptor}"),
            Self::WorldUnavailable(world) => write!(f, "world not available: {world}"),
            Self::PlayspaceAllocation(reason) => {
                write!(f, "play-space allocation failed: {reason}")
            },
        }
    }
}

impl std::error::Error for ProvisioningError {}
