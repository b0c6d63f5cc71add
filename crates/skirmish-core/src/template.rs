use serde::{Deserialize, Serialize};

use crate::location::LocationDescriptor;

/// Durable description of a playable map/mode. Instances are stamped out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    /// Map asset the play-space is provisioned from.
    pub map_ref: String,
    pub min_players: usize,
    pub max_players: usize,
    pub min_players_to_start: usize,
    #[serde(default)]
    pub lobby_location: Option<LocationDescriptor>,
    #[serde(default)]
    pub spectator_location: Option<LocationDescriptor>,
    #[serde(default)]
    pub main_location: Option<LocationDescriptor>,
    #[serde(default)]
    pub spawn_points: Vec<LocationDescriptor>,
}

/// Reasons a template's bounds are unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    EmptyName,
    MinPlayersZero,
    MaxBelowMin { min: usize, max: usize },
    StartThresholdOutOfRange { min_to_start: usize, max: usize },
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "template name is empty"),
            Self::MinPlayersZero => write!(f, "min_players must be at least 1"),
            Self::MaxBelowMin { min, max } => {
                write!(f, "max_players ({max}) is below min_players ({min})")
            },
            Self::StartThresholdOutOfRange { min_to_start, max } => write!(
                f,
                "min_players_to_start ({min_to_start}) must be between 1 and max_players ({max})"
            ),
        }
    }
}

impl std::error::Error for TemplateError {}

impl Template {
    pub fn new(name: impl Into<String>, min_players: usize, max_players: usize) -> Self {
        let name = name.into();
        Self {
            map_ref: name.clone(),
            name,
            min_players,
            max_players,
            min_players_to_start: min_players,
            lobby_location: None,
            spectator_location: None,
            main_location: None,
            spawn_points: Vec::new(),
        }
    }

    /// Check `max_players >= min_players >= 1` and that the start threshold fits.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if self.min_players == 0 {
            return Err(TemplateError::MinPlayersZero);
        }
        if self.max_players < self.min_players {
            return Err(TemplateError::MaxBelowMin {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if self.min_players_to_start == 0 || self.min_players_to_start > self.max_players {
            return Err(TemplateError::StartThresholdOutOfRange {
                min_to_start: self.min_players_to_start,
                max: self.max_players,
            });
        }
        Ok(())
    }

    /// A template is usable for instance creation only when every required
    /// location is set, at least one spawn point exists and the bounds are sane.
    pub fn is_complete(&self) -> bool {
        self.lobby_location.is_some()
            && self.spectator_location.is_some()
            && self.main_location.is_some()
            && !self.spawn_points.is_empty()
            && self.validate().is_ok()
    }
}
