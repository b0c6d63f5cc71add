use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

/// Unresolved location as stored in a template: a world name plus a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl LocationDescriptor {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

impl std::fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:.1},{:.1},{:.1}", self.world, self.x, self.y, self.z)
    }
}

/// A descriptor resolved by the provisioning collaborator into a usable place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteLocation {
    pub world_id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Handle to a play-space allocated for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayspaceHandle {
    pub instance: InstanceId,
    pub world_name: String,
}
