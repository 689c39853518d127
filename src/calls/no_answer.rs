//! Countdown bounding how long a call may wait for pickup or reconnection.

use std::time::Duration;

use log::debug;

use super::timer::{TickPoster, TimerHandle, TimerRole};

/// Work performed on every tick before expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Publish the call `request` again under a fresh id.
    ReannounceRequest,
}

/// Work performed once the countdown lapses, after the call was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// Tell the user the peer could not be reached.
    NotifyPeerUnavailable,
}

/// Outcome of feeding a tick to the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoAnswerStep {
    /// Tick of a cancelled or replaced countdown.
    Stale,
    Tick(Vec<TickAction>),
    /// The countdown lapsed; the call must be ended as initiator before the
    /// expiry action runs.
    Expired(Option<ExpiryAction>),
}

struct Countdown {
    remaining: u32,
    on_expire: Option<ExpiryAction>,
    per_tick: Vec<TickAction>,
    handle: TimerHandle,
}

pub struct NoAnswerTimer {
    ticks: u32,
    period: Duration,
    post: TickPoster,
    generation: u64,
    active: Option<Countdown>,
}

impl NoAnswerTimer {
    pub fn new(ticks: u32, period: Duration, post: TickPoster) -> Self {
        Self {
            ticks: ticks.max(1),
            period,
            post,
            generation: 0,
            active: None,
        }
    }

    /// Starts a fresh countdown, replacing any running one.
    pub fn start(&mut self, on_expire: Option<ExpiryAction>, per_tick: Vec<TickAction>) {
        self.generation += 1;
        let handle = TimerHandle::spawn(
            TimerRole::NoAnswer,
            self.generation,
            self.period,
            self.post.clone(),
        );
        self.active = Some(Countdown {
            remaining: self.ticks,
            on_expire,
            per_tick,
            handle,
        });
        debug!(target: "Call/NoAnswer", "Countdown of {} ticks started", self.ticks);
    }

    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            debug!(target: "Call/NoAnswer", "Countdown cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn remaining(&self) -> Option<u32> {
        self.active.as_ref().map(|countdown| countdown.remaining)
    }

    pub fn on_tick(&mut self, generation: u64) -> NoAnswerStep {
        let Some(countdown) = self.active.as_mut() else {
            return NoAnswerStep::Stale;
        };
        if countdown.handle.generation() != generation {
            return NoAnswerStep::Stale;
        }
        countdown.remaining = countdown.remaining.saturating_sub(1);
        if countdown.remaining > 0 {
            return NoAnswerStep::Tick(countdown.per_tick.clone());
        }
        let on_expire = countdown.on_expire;
        self.active = None;
        debug!(target: "Call/NoAnswer", "Countdown expired");
        NoAnswerStep::Expired(on_expire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn timer() -> NoAnswerTimer {
        let post: TickPoster = Arc::new(|_| true);
        NoAnswerTimer::new(30, Duration::from_secs(1), post)
    }

    #[tokio::test]
    async fn test_per_tick_actions_run_29_times_then_expire_once() {
        let mut timer = timer();
        timer.start(
            Some(ExpiryAction::NotifyPeerUnavailable),
            vec![TickAction::ReannounceRequest],
        );

        let mut per_tick = 0;
        let mut expired = Vec::new();
        for _ in 0..40 {
            match timer.on_tick(1) {
                NoAnswerStep::Tick(actions) => per_tick += actions.len(),
                NoAnswerStep::Expired(action) => expired.push(action),
                NoAnswerStep::Stale => {}
            }
        }

        assert_eq!(per_tick, 29);
        assert_eq!(expired, vec![Some(ExpiryAction::NotifyPeerUnavailable)]);
        assert!(!timer.is_running());
    }

    #[tokio::test]
    async fn test_restart_replaces_countdown() {
        let mut timer = timer();
        timer.start(None, Vec::new());
        for _ in 0..10 {
            timer.on_tick(1);
        }
        assert_eq!(timer.remaining(), Some(20));

        timer.start(None, Vec::new());
        assert_eq!(timer.on_tick(1), NoAnswerStep::Stale);
        assert_eq!(timer.on_tick(2), NoAnswerStep::Tick(Vec::new()));
        assert_eq!(timer.remaining(), Some(29));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut timer = timer();
        timer.stop();
        timer.start(None, Vec::new());
        timer.stop();
        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.on_tick(1), NoAnswerStep::Stale);
    }
}
