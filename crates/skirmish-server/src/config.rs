use serde::Deserialize;

use skirmish_core::lifecycle::LifecycleSettings;
use skirmish_core::player::PriorityTier;
use skirmish_core::ports::AdmissionPolicy;
use skirmish_core::template::Template;

/// Top-level server configuration, loaded from `skirmish.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Period of the lifecycle tick. One tick is one countdown second.
    pub tick_interval_ms: u64,
    /// Bearer token guarding admin routes. `None` leaves them open.
    pub api_token: Option<String>,
    pub lifecycle: LifecycleSettings,
    pub priority: PriorityConfig,
    pub worlds: WorldsConfig,
    /// Startup template list.
    pub templates: Vec<Template>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            tick_interval_ms: 1000,
            api_token: None,
            lifecycle: LifecycleSettings::default(),
            priority: PriorityConfig::default(),
            worlds: WorldsConfig::default(),
            templates: Vec::new(),
        }
    }
}

/// Which tiers may bump lower tiers out of a full lobby.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub enabled_tiers: Vec<PriorityTier>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            enabled_tiers: vec![
                PriorityTier::Vip,
                PriorityTier::VipPlus,
                PriorityTier::Staff,
            ],
        }
    }
}

impl AdmissionPolicy for PriorityConfig {
    fn priority_admission_enabled(&self, tier: PriorityTier) -> bool {
        self.enabled_tiers.contains(&tier)
    }
}

/// Worlds the in-process provisioner knows about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorldsConfig {
    /// Resolvable world names. Empty means every world resolves.
    pub available: Vec<String>,
}

impl ServerConfig {
    /// Validate configuration, logging warnings for issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.tick_interval_ms == 0 {
            tracing::error!("tick_interval_ms must be > 0");
            std::process::exit(1);
        }

        if self.api_token.is_some() {
            tracing::warn!(
                "api_token is set in config file, use SKIRMISH_API_TOKEN env var in production"
            );
        }

        if self.lifecycle.lobby_countdown_secs == 0 {
            tracing::error!("lifecycle.lobby_countdown_secs must be > 0");
            std::process::exit(1);
        }
        if self.lifecycle.end_countdown_secs == 0 {
            tracing::error!("lifecycle.end_countdown_secs must be > 0");
            std::process::exit(1);
        }
        if self.lifecycle.full_lobby_countdown_secs > self.lifecycle.lobby_countdown_secs {
            tracing::warn!(
                full = self.lifecycle.full_lobby_countdown_secs,
                lobby = self.lifecycle.lobby_countdown_secs,
                "full_lobby_countdown_secs exceeds lobby_countdown_secs and never shortens"
            );
        }

        for template in &self.templates {
            if let Err(e) = template.validate() {
                tracing::warn!(
                    template = %template.name,
                    error = %e,
                    "Template is invalid and will be skipped"
                );
            } else if !template.is_complete() {
                tracing::warn!(
                    template = %template.name,
                    "Template is incomplete, no instances will be created from it"
                );
            }
        }
        if self.templates.is_empty() {
            tracing::warn!("No templates configured, the lobby pool will stay empty");
        }
    }

    /// Templates that pass validation.
    pub fn valid_templates(&self) -> Vec<Template> {
        self.templates
            .iter()
            .filter(|t| t.validate().is_ok())
            .cloned()
            .collect()
    }

    /// Load config from `skirmish.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("skirmish.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from skirmish.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse skirmish.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No skirmish.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("SKIRMISH_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(token) = std::env::var("SKIRMISH_API_TOKEN")
            && !token.is_empty()
        {
            config.api_token = Some(token);
        }
        if let Ok(val) = std::env::var("SKIRMISH_LOBBY_COUNTDOWN")
            && let Ok(n) = val.parse::<u32>()
        {
            config.lifecycle.lobby_countdown_secs = n;
        }
        if let Ok(val) = std::env::var("SKIRMISH_TICK_MILLIS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.tick_interval_ms = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.tick_interval_ms, 1000);
        assert!(cfg.api_token.is_none());
        assert_eq!(cfg.lifecycle.lobby_countdown_secs, 60);
        assert!(cfg.templates.is_empty());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"
api_token = "secret123"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.api_token.as_deref(), Some("secret123"));
        assert_eq!(cfg.lifecycle, LifecycleSettings::default());
    }

    #[test]
    fn validate_rejects_invalid_addr() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        // validate() calls process::exit, so we test the underlying check
        assert!(cfg.listen_addr.parse::<std::net::SocketAddr>().is_err());
    }

    #[test]
    fn default_priority_tiers() {
        let cfg = PriorityConfig::default();
        assert!(!cfg.priority_admission_enabled(PriorityTier::Default));
        assert!(cfg.priority_admission_enabled(PriorityTier::Vip));
        assert!(cfg.priority_admission_enabled(PriorityTier::Staff));
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "0.0.0.0:3000"
tick_interval_ms = 250

[lifecycle]
lobby_countdown_secs = 30
full_lobby_countdown_secs = 5
announce_at = [10, 3, 2, 1]

[priority]
enabled_tiers = ["staff"]

[worlds]
available = ["hub", "skywars"]

[[templates]]
name = "skywars"
map_ref = "skywars_v2"
min_players = 2
max_players = 8
min_players_to_start = 4
lobby_location = { world = "hub", x = 0.0, y = 70.0, z = 0.0, yaw = 0.0, pitch = 0.0 }
spectator_location = { world = "skywars", x = 0.0, y = 90.0, z = 0.0, yaw = 0.0, pitch = 0.0 }
main_location = { world = "skywars", x = 0.0, y = 64.0, z = 0.0, yaw = 0.0, pitch = 0.0 }
spawn_points = [{ world = "skywars", x = 10.0, y = 64.0, z = 0.0, yaw = 0.0, pitch = 0.0 }]

[[templates]]
name = "unfinished"
map_ref = "unfinished"
min_players = 2
max_players = 1
min_players_to_start = 2
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.tick_interval_ms, 250);
        assert_eq!(cfg.lifecycle.lobby_countdown_secs, 30);
        assert_eq!(cfg.lifecycle.full_lobby_countdown_secs, 5);
        // Unset lifecycle keys fall back to defaults
        assert_eq!(cfg.lifecycle.end_countdown_secs, 10);
        assert_eq!(cfg.lifecycle.announce_at, vec![10, 3, 2, 1]);
        assert!(!cfg.priority.priority_admission_enabled(PriorityTier::Vip));
        assert!(cfg.priority.priority_admission_enabled(PriorityTier::Staff));
        assert_eq!(cfg.worlds.available, vec!["hub", "skywars"]);
        assert_eq!(cfg.templates.len(), 2);
        assert!(cfg.templates[0].is_complete());

        let valid = cfg.valid_templates();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "skywars");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let toml_str = r#"
listen_addr = "0.0.0.0:8080"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.priority.enabled_tiers.len(), 3);
        assert!(cfg.worlds.available.is_empty());
        assert_eq!(cfg.lifecycle.max_active_secs, 1800);
    }
}
