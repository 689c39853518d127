//! Periodic tick sources for the call state machine.
//!
//! A [`TimerHandle`] owns a tokio task that posts [`TimerTick`]s back to the
//! controller queue. Dropping the handle aborts the task. Ticks that were
//! already queued when a handle was replaced still arrive, so every tick
//! carries the generation it was started with and consumers discard ticks
//! whose generation is no longer current.

use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// The four independent timer roles of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerRole {
    OutgoingRinger,
    IncomingRinger,
    NoAnswer,
    CallDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub role: TimerRole,
    pub generation: u64,
}

/// Posts a tick to the event queue; returns `false` once the queue is gone.
pub type TickPoster = Arc<dyn Fn(TimerTick) -> bool + Send + Sync>;

#[derive(Debug)]
pub struct TimerHandle {
    role: TimerRole,
    generation: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Starts ticking every `period`, first tick one period from now.
    pub fn spawn(role: TimerRole, generation: u64, period: Duration, post: TickPoster) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                trace!(target: "Call/Timer", "{role:?} tick (generation {generation})");
                if !post(TimerTick { role, generation }) {
                    break;
                }
            }
        });
        Self {
            role,
            generation,
            task,
        }
    }

    pub fn role(&self) -> TimerRole {
        self.role
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn poster() -> (TickPoster, mpsc::UnboundedReceiver<TimerTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let post: TickPoster = Arc::new(move |tick| tx.send(tick).is_ok());
        (post, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period_with_generation() {
        let (post, mut rx) = poster();
        let handle = TimerHandle::spawn(TimerRole::NoAnswer, 7, Duration::from_secs(1), post);
        assert_eq!(handle.role(), TimerRole::NoAnswer);
        assert_eq!(handle.generation(), 7);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let mut ticks = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            ticks.push(tick);
        }
        assert_eq!(ticks.len(), 3);
        assert!(ticks.iter().all(|tick| tick.generation == 7));
        assert!(ticks.iter().all(|tick| tick.role == TimerRole::NoAnswer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (post, mut rx) = poster();
        let handle = TimerHandle::spawn(TimerRole::CallDuration, 1, Duration::from_secs(1), post);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
