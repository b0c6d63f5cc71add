use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;
use crate::lifecycle::PhaseKind;
use crate::player::PlayerId;

/// Why an admission (or spectate request) was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    UnknownInstance,
    /// The player is already living or spectating in some instance.
    AlreadyMember { instance: InstanceId },
    NotJoinable { phase: PhaseKind },
    /// Full, and the joiner's tier may not use priority admission.
    Full,
    /// Full, and nobody with a lower tier can be evicted.
    PrioritySlotsFull,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownInstance => write!(f, "unknown instance"),
            Self::AlreadyMember { instance } => write!(f, "already a member of {instance}"),
            Self::NotJoinable { phase } => write!(f, "instance is in {phase} phase"),
            Self::Full => write!(f, "instance is full"),
            Self::PrioritySlotsFull => write!(f, "instance is full, priority slots also full"),
        }
    }
}

impl std::error::Error for RejectReason {}

/// Structured event delivered to a player through the messaging collaborator.
///
/// The core never formats user-facing text; the notifier decides how each
/// kind is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Joined {
        instance: InstanceId,
        living: usize,
        max_players: usize,
    },
    Spectating {
        instance: InstanceId,
    },
    Rejected {
        reason: RejectReason,
    },
    /// Removed to make room for a higher-priority player.
    Evicted {
        instance: InstanceId,
    },
    Left {
        instance: InstanceId,
    },
    CountdownStarted {
        seconds: u32,
    },
    CountdownShortened {
        seconds: u32,
    },
    CountdownCancelled,
    CountdownTick {
        seconds: u32,
    },
    MatchStarted {
        instance: InstanceId,
    },
    ProtectionEnded,
    Eliminated {
        player: PlayerId,
        killer: Option<PlayerId>,
    },
    MatchEnded {
        winner: Option<PlayerId>,
    },
    /// The instance was retired; the player is no longer a member.
    InstanceClosed {
        instance: InstanceId,
    },
}
