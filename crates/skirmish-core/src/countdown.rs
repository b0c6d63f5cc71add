use serde::{Deserialize, Serialize};

/// What a single [`Countdown::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown was not running; nothing changed.
    Idle,
    /// One second elapsed and time remains.
    Ticked { remaining: u32 },
    /// The countdown reached zero and stopped itself.
    Completed,
}

/// Cancellable, shortenable one-second-resolution timer.
///
/// The countdown holds no reference to players or instances. Callers either
/// inspect the [`TickOutcome`] returned by [`Countdown::tick`] or pass
/// callbacks to [`Countdown::tick_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    seconds_remaining: u32,
    running: bool,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start at `initial_seconds`. Returns false (and changes nothing) when
    /// already running.
    pub fn start(&mut self, initial_seconds: u32) -> bool {
        if self.running {
            return false;
        }
        self.seconds_remaining = initial_seconds;
        self.running = true;
        true
    }

    /// Advance by one second.
    ///
    /// A countdown started at zero completes on its first tick.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.running = false;
            TickOutcome::Completed
        } else {
            TickOutcome::Ticked {
                remaining: self.seconds_remaining,
            }
        }
    }

    /// Callback flavour of [`Countdown::tick`]: `on_tick` receives the
    /// remaining seconds after every decrement that leaves time on the clock,
    /// `on_complete` fires exactly once when zero is reached.
    pub fn tick_with(&mut self, on_tick: impl FnOnce(u32), on_complete: impl FnOnce()) {
        match self.tick() {
            TickOutcome::Idle => {},
            TickOutcome::Ticked { remaining } => on_tick(remaining),
            TickOutcome::Completed => on_complete(),
        }
    }

    /// Idempotent. Returns true if this call actually stopped a running countdown.
    pub fn stop(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        was_running
    }

    /// Shorten the countdown to `seconds`. Never lengthens it and does nothing
    /// while stopped. Returns true when the remaining time changed.
    pub fn reduce_to(&mut self, seconds: u32) -> bool {
        if !self.running || seconds >= self.seconds_remaining {
            return false;
        }
        self.seconds_remaining = seconds;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_noop_when_running() {
        let mut c = Countdown::new();
        assert!(c.start(60));
        assert!(!c.start(10));
        assert_eq!(c.seconds_remaining(), 60);
    }

    #[test]
    fn reduce_then_run_to_completion() {
        let mut c = Countdown::new();
        c.start(60);

        assert!(!c.reduce_to(70));
        assert_eq!(c.seconds_remaining(), 60);

        assert!(c.reduce_to(5));
        assert_eq!(c.seconds_remaining(), 5);

        for _ in 0..4 {
            c.tick();
        }
        assert_eq!(c.seconds_remaining(), 1);
        assert!(c.is_running());

        let mut completions = 0;
        c.tick_with(|_| panic!("no tick callback on completion"), || completions += 1);
        assert_eq!(c.seconds_remaining(), 0);
        assert!(!c.is_running());
        assert_eq!(completions, 1);

        // Further ticks never complete again.
        c.tick_with(|_| panic!("stopped"), || completions += 1);
        assert_eq!(completions, 1);
    }

    #[test]
    fn on_tick_sees_remaining_seconds() {
        let mut c = Countdown::new();
        c.start(3);
        let mut seen = Vec::new();
        c.tick_with(|s| seen.push(s), || {});
        c.tick_with(|s| seen.push(s), || {});
        assert_eq!(seen, vec![2, 1]);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut c = Countdown::new();
        assert!(!c.stop());
        c.start(10);
        assert!(c.stop());
        assert!(!c.stop());
        assert_eq!(c.tick(), TickOutcome::Idle);
    }

    #[test]
    fn reduce_to_ignored_when_stopped() {
        let mut c = Countdown::new();
        assert!(!c.reduce_to(1));
        c.start(10);
        c.stop();
        assert!(!c.reduce_to(1));
        assert_eq!(c.seconds_remaining(), 10);
    }

    #[test]
    fn zero_start_completes_on_first_tick() {
        let mut c = Countdown::new();
        c.start(0);
        assert_eq!(c.tick(), TickOutcome::Completed);
        assert!(!c.is_running());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Tick,
            Reduce(u32),
            Stop,
            Start(u32),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => Just(Op::Tick),
                2 => (0u32..120).prop_map(Op::Reduce),
                1 => Just(Op::Stop),
                1 => (0u32..120).prop_map(Op::Start),
            ]
        }

        proptest! {
            #[test]
            fn remaining_only_decreases_while_running(
                initial in 1u32..120,
                ops in proptest::collection::vec(op(), 1..80)
            ) {
                let mut c = Countdown::new();
                c.start(initial);
                for op in ops {
                    let before = c.seconds_remaining();
                    let was_running = c.is_running();
                    match op {
                        Op::Tick => {
                            let outcome = c.tick();
                            if was_running && before > 0 {
                                prop_assert!(c.seconds_remaining() < before);
                            } else if was_running {
                                prop_assert_eq!(outcome, TickOutcome::Completed);
                            } else {
                                prop_assert_eq!(c.seconds_remaining(), before);
                            }
                        },
                        Op::Reduce(n) => {
                            c.reduce_to(n);
                            prop_assert!(c.seconds_remaining() <= before);
                            if n >= before {
                                prop_assert_eq!(c.seconds_remaining(), before);
                            }
                        },
                        Op::Stop => {
                            c.stop();
                            prop_assert!(!c.is_running());
                            prop_assert_eq!(c.seconds_remaining(), before);
                        },
                        Op::Start(n) => {
                            c.start(n);
                            if was_running {
                                prop_assert_eq!(c.seconds_remaining(), before);
                            }
                        },
                    }
                }
            }
        }
    }
}
