use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use skirmish_core::instance::InstanceSnapshot;
use skirmish_core::lifecycle::LifecycleSettings;
use skirmish_core::player::PlayerId;
use skirmish_core::ports::{Notifier, RankSource, SessionHooks, WorldProvisioner};
use skirmish_core::template::Template;
use skirmish_core::test_helpers::{
    FakeWorlds, FixedRanks, RecordingNotifier, RecordingSessionHooks, TierPolicy, make_template,
};
use skirmish_server::build_app;
use skirmish_server::config::ServerConfig;
use skirmish_server::orchestrator::{Collaborators, Orchestrator};
use skirmish_server::state::AppState;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

/// Two complete templates: `skywars` (2..4, starts at 2) and `duel` (2..2).
pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        templates: vec![
            make_template("skywars", 2, 4, 2),
            make_template("duel", 2, 2, 2),
        ],
        ..ServerConfig::default()
    }
}

impl TestServer {
    /// Start a test server with no auth and no tick loop.
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    /// Start a test server whose admin routes require `token`.
    pub async fn with_auth(token: &str) -> Self {
        let config = ServerConfig {
            api_token: Some(token.to_string()),
            ..test_config()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    pub async fn instances(&self, client: &reqwest::Client) -> Vec<InstanceSnapshot> {
        client
            .get(self.api("/instances"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Display name of some Lobby instance of `template`.
    pub async fn lobby_of(&self, client: &reqwest::Client, template: &str) -> String {
        self.instances(client)
            .await
            .into_iter()
            .find(|s| s.template == template && s.phase.to_string() == "lobby")
            .map(|s| s.display_name)
            .unwrap_or_else(|| panic!("no lobby instance of {template}"))
    }

    pub async fn join(
        &self,
        client: &reqwest::Client,
        player: PlayerId,
        instance: Option<&str>,
    ) -> reqwest::Response {
        let mut body = serde_json::json!({ "player": player });
        if let Some(name) = instance {
            body["instance"] = Value::String(name.to_string());
        }
        client
            .post(self.api("/join"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

/// An orchestrator wired to recording fakes, for driving it directly.
pub struct Harness {
    pub orch: Arc<Orchestrator>,
    pub worlds: Arc<FakeWorlds>,
    pub sessions: Arc<RecordingSessionHooks>,
    pub notifier: Arc<RecordingNotifier>,
    pub ranks: Arc<FixedRanks>,
}

impl Harness {
    pub fn new(templates: Vec<Template>, settings: LifecycleSettings) -> Self {
        let worlds = Arc::new(FakeWorlds::default());
        let sessions = Arc::new(RecordingSessionHooks::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let ranks = Arc::new(FixedRanks::default());
        let orch = Orchestrator::new(
            templates,
            Collaborators {
                worlds: Arc::clone(&worlds) as Arc<dyn WorldProvisioner>,
                sessions: Arc::clone(&sessions) as Arc<dyn SessionHooks>,
                notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
                ranks: Arc::clone(&ranks) as Arc<dyn RankSource>,
                policy: Arc::new(TierPolicy::default()),
            },
            settings,
        );
        Self {
            orch: Arc::new(orch),
            worlds,
            sessions,
            notifier,
            ranks,
        }
    }
}

/// Panics unless every player is in at most one instance and no instance
/// holds more living members than its maximum.
pub fn assert_registry_invariants(snapshots: &[InstanceSnapshot]) {
    let mut seen: HashMap<PlayerId, String> = HashMap::new();
    for snap in snapshots {
        assert!(
            snap.living.len() <= snap.max_players,
            "{} has {} living members, max {}",
            snap.display_name,
            snap.living.len(),
            snap.max_players
        );
        for player in snap.living.iter().chain(&snap.spectating) {
            if let Some(other) = seen.insert(*player, snap.display_name.clone()) {
                panic!(
                    "player {player} is a member of both {other} and {}",
                    snap.display_name
                );
            }
        }
    }
}
