use std::sync::Arc;

use skirmish_core::ports::{RankSource, TemplateStore};

use crate::auth::AuthConfig;
use crate::collaborators::{
    LocalWorlds, LoggingNotifier, LoggingSessionHooks, MemoryTemplateStore, TableRanks,
};
use crate::config::ServerConfig;
use crate::orchestrator::{Collaborators, Orchestrator};

pub type SharedOrchestrator = Arc<Orchestrator>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SharedOrchestrator,
    /// Runtime-editable rank table the orchestrator reads tiers from.
    pub ranks: Arc<TableRanks>,
    pub templates: Arc<dyn TemplateStore>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire the orchestrator to the in-process collaborators and seed one
    /// Lobby instance per complete template.
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryTemplateStore::with_templates(config.valid_templates()));
        let ranks = Arc::new(TableRanks::default());
        let collaborators = Collaborators {
            worlds: Arc::new(LocalWorlds::new(config.worlds.available.clone())),
            sessions: Arc::new(LoggingSessionHooks),
            notifier: Arc::new(LoggingNotifier),
            ranks: Arc::clone(&ranks) as Arc<dyn RankSource>,
            policy: Arc::new(config.priority.clone()),
        };
        let orchestrator = Orchestrator::new(store.load(), collaborators, config.lifecycle.clone());
        let created = orchestrator.warm_up();
        tracing::info!(instances = created, "Lobby pool seeded");

        Self {
            orchestrator: Arc::new(orchestrator),
            ranks,
            templates: store,
            auth: AuthConfig {
                bearer_token: config.api_token,
            },
        }
    }
}
