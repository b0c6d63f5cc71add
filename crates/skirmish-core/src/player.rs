use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a player across the whole cluster.
pub type PlayerId = Uuid;

/// Privilege tier used for priority admission into full instances.
///
/// Ordering matters: a joiner may only preempt members whose tier compares
/// strictly lower than their own.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    #[default]
    Default,
    Vip,
    VipPlus,
    Staff,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 4] = [
        PriorityTier::Default,
        PriorityTier::Vip,
        PriorityTier::VipPlus,
        PriorityTier::Staff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Vip => "vip",
            Self::VipPlus => "vip_plus",
            Self::Staff => "staff",
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(PriorityTier::Default < PriorityTier::Vip);
        assert!(PriorityTier::Vip < PriorityTier::VipPlus);
        assert!(PriorityTier::VipPlus < PriorityTier::Staff);
    }

    #[test]
    fn display_matches_serde_name() {
        for tier in PriorityTier::ALL {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{tier}\""));
        }
    }

    #[test]
    fn tier_serde_uses_snake_case() {
        let json = serde_json::to_string(&PriorityTier::VipPlus).unwrap();
        assert_eq!(json, "\"vip_plus\"");
    }
}
