//! Per-instance lifecycle: `Lobby -> Active -> End`, then the instance is
//! recycled by the orchestrator.
//!
//! [`advance`] is a total function over `(phase, event)`. It never fails and
//! never touches players; it returns the next phase plus a list of
//! [`Effect`]s for the orchestrator to apply. Events that make no sense for
//! the current phase leave it untouched and produce no effects.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::countdown::{Countdown, TickOutcome};

/// Numeric lifecycle defaults injected from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub lobby_countdown_secs: u32,
    /// Remaining lobby time once an instance fills up.
    pub full_lobby_countdown_secs: u32,
    pub end_countdown_secs: u32,
    pub protection_secs: u32,
    /// Hard cap on the active phase (0 disables it).
    pub max_active_secs: u32,
    /// Remaining-seconds values that are announced to members.
    pub announce_at: Vec<u32>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            lobby_countdown_secs: 60,
            full_lobby_countdown_secs: 10,
            end_countdown_secs: 10,
            protection_secs: 30,
            max_active_secs: 1800,
            announce_at: vec![60, 30, 15, 10, 5, 4, 3, 2, 1],
        }
    }
}

impl LifecycleSettings {
    fn announces(&self, seconds: u32) -> bool {
        self.announce_at.contains(&seconds)
    }
}

/// Discriminant of [`LifecyclePhase`], cheap to copy into snapshots and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Lobby,
    Active,
    End,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Active => write!(f, "active"),
            Self::End => write!(f, "end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecyclePhase {
    Lobby {
        countdown: Countdown,
    },
    Active {
        elapsed_secs: u32,
        protection_elapsed: bool,
        started_at: SystemTime,
    },
    End {
        countdown: Countdown,
    },
}

impl Default for LifecyclePhase {
    fn default() -> Self {
        Self::Lobby {
            countdown: Countdown::new(),
        }
    }
}

impl LifecyclePhase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Lobby { .. } => PhaseKind::Lobby,
            Self::Active { .. } => PhaseKind::Active,
            Self::End { .. } => PhaseKind::End,
        }
    }

    /// The running countdown of the Lobby or End phase, if any.
    pub fn countdown(&self) -> Option<&Countdown> {
        match self {
            Self::Lobby { countdown } | Self::End { countdown } => Some(countdown),
            Self::Active { .. } => None,
        }
    }
}

/// Membership facts the transition rules need, read from the instance.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub living: usize,
    pub min_players_to_start: usize,
    pub max_players: usize,
    pub settings: &'a LifecycleSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A member was added, removed or eliminated.
    MembershipChanged,
    /// One second of wall time elapsed.
    Tick,
    /// Orchestrator is moving the instance from Lobby to Active.
    Start { at: SystemTime },
    /// Orchestrator is moving the instance from Active to End.
    Finish,
}

/// Side effects requested by a transition. Applied by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    CountdownStarted { seconds: u32 },
    CountdownShortened { seconds: u32 },
    CountdownCancelled,
    /// An announced remaining-seconds value was reached.
    CountdownTick { seconds: u32 },
    /// Lobby countdown completed; the instance should start.
    StartMatch,
    /// Instance entered Active.
    MatchStarted,
    ProtectionEnded,
    /// Win condition or time limit reached; the instance should end.
    EndMatch,
    /// Instance entered End.
    MatchEnded,
    /// End cooldown completed; the instance should be recycled.
    Recycle,
}

pub fn advance(
    phase: LifecyclePhase,
    ctx: &PhaseContext<'_>,
    event: PhaseEvent,
) -> (LifecyclePhase, Vec<Effect>) {
    let mut effects = Vec::new();
    let next = match (phase, event) {
        (LifecyclePhase::Lobby { mut countdown }, PhaseEvent::MembershipChanged) => {
            lobby_membership(&mut countdown, ctx, &mut effects);
            LifecyclePhase::Lobby { countdown }
        },
        (LifecyclePhase::Lobby { mut countdown }, PhaseEvent::Tick) => {
            match countdown.tick() {
                TickOutcome::Idle => {},
                TickOutcome::Ticked { remaining } => {
                    if ctx.settings.announces(remaining) {
                        effects.push(Effect::CountdownTick { seconds: remaining });
                    }
                },
                TickOutcome::Completed => effects.push(Effect::StartMatch),
            }
            LifecyclePhase::Lobby { countdown }
        },
        (LifecyclePhase::Lobby { mut countdown }, PhaseEvent::Start { at }) => {
            countdown.stop();
            effects.push(Effect::MatchStarted);
            // A forced or single-player start is already decided.
            if ctx.living <= 1 {
                effects.push(Effect::EndMatch);
            }
            LifecyclePhase::Active {
                elapsed_secs: 0,
                protection_elapsed: ctx.settings.protection_secs == 0,
                started_at: at,
            }
        },
        (
            LifecyclePhase::Active {
                elapsed_secs,
                protection_elapsed,
                started_at,
            },
            PhaseEvent::MembershipChanged,
        ) => {
            if ctx.living <= 1 {
                effects.push(Effect::EndMatch);
            }
            LifecyclePhase::Active {
                elapsed_secs,
                protection_elapsed,
                started_at,
            }
        },
        (
            LifecyclePhase::Active {
                elapsed_secs,
                mut protection_elapsed,
                started_at,
            },
            PhaseEvent::Tick,
        ) => {
            let elapsed_secs = elapsed_secs.saturating_add(1);
            if !protection_elapsed && elapsed_secs >= ctx.settings.protection_secs {
                protection_elapsed = true;
                effects.push(Effect::ProtectionEnded);
            }
            let limit = ctx.settings.max_active_secs;
            if limit != 0 && elapsed_secs >= limit {
                effects.push(Effect::EndMatch);
            }
            LifecyclePhase::Active {
                elapsed_secs,
                protection_elapsed,
                started_at,
            }
        },
        (LifecyclePhase::Active { .. }, PhaseEvent::Finish) => {
            let mut countdown = Countdown::new();
            countdown.start(ctx.settings.end_countdown_secs);
            effects.push(Effect::MatchEnded);
            LifecyclePhase::End { countdown }
        },
        (LifecyclePhase::End { mut countdown }, PhaseEvent::Tick) => {
            if countdown.tick() == TickOutcome::Completed {
                effects.push(Effect::Recycle);
            }
            LifecyclePhase::End { countdown }
        },
        // Everything else is not a transition: Lobby+Finish, Active+Start,
        // End+{Start, Finish, MembershipChanged}.
        (phase, _) => phase,
    };
    (next, effects)
}

fn lobby_membership(countdown: &mut Countdown, ctx: &PhaseContext<'_>, effects: &mut Vec<Effect>) {
    if ctx.living < ctx.min_players_to_start {
        if countdown.stop() {
            effects.push(Effect::CountdownCancelled);
        }
        return;
    }

    let started = countdown.start(ctx.settings.lobby_countdown_secs);
    let shortened = ctx.living >= ctx.max_players
        && countdown.reduce_to(ctx.settings.full_lobby_countdown_secs);
    let seconds = countdown.seconds_remaining();
    if started {
        effects.push(Effect::CountdownStarted { seconds });
    } else if shortened {
        effects.push(Effect::CountdownShortened { seconds });
    }
}
