use std::time::Duration;

use super::timer::{TickPoster, TimerHandle, TimerRole};

/// Counts connected seconds of a call. Pausing keeps the elapsed value so a
/// reconnected call resumes where it left off.
pub struct CallTimer {
    elapsed: u64,
    period: Duration,
    post: TickPoster,
    generation: u64,
    handle: Option<TimerHandle>,
}

impl CallTimer {
    pub fn new(period: Duration, post: TickPoster) -> Self {
        Self {
            elapsed: 0,
            period,
            post,
            generation: 0,
            handle: None,
        }
    }

    /// Starts or resumes counting. Any previous handle is cancelled first.
    pub fn start(&mut self) {
        self.generation += 1;
        self.handle = Some(TimerHandle::spawn(
            TimerRole::CallDuration,
            self.generation,
            self.period,
            self.post.clone(),
        ));
    }

    /// Pauses counting; the elapsed value is kept.
    pub fn stop(&mut self) {
        self.handle = None;
    }

    pub fn reset(&mut self) {
        self.stop();
        self.elapsed = 0;
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Returns the new elapsed value, or `None` for a stale tick.
    pub fn on_tick(&mut self, generation: u64) -> Option<u64> {
        let handle = self.handle.as_ref()?;
        if handle.generation() != generation {
            return None;
        }
        self.elapsed += 1;
        Some(self.elapsed)
    }
}
