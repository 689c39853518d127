//! Outgoing and incoming ring tone scheduling.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use super::timer::{TickPoster, TimerHandle, TimerRole};
use crate::config::CallConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingerKind {
    /// Ring-back heard by the caller while the peer is ringing.
    Outgoing,
    /// Ring tone of an incoming call.
    Incoming,
}

impl RingerKind {
    pub fn timer_role(self) -> TimerRole {
        match self {
            Self::Outgoing => TimerRole::OutgoingRinger,
            Self::Incoming => TimerRole::IncomingRinger,
        }
    }
}

/// Audio side of the ringer. Implementations only trigger playback.
pub trait Ringtone: Send + Sync {
    fn play(&self, kind: RingerKind);
    fn silence(&self, kind: RingerKind);
}

#[derive(Default)]
struct Ringer {
    rings: u32,
    generation: u64,
    handle: Option<TimerHandle>,
}

impl Ringer {
    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

/// Drives both ringer roles; each plays at most `max_rings` times per start.
pub struct RingerScheduler {
    ringtone: Arc<dyn Ringtone>,
    post: TickPoster,
    outgoing_period: Duration,
    incoming_period: Duration,
    max_rings: u32,
    outgoing: Ringer,
    incoming: Ringer,
}

impl RingerScheduler {
    pub fn new(ringtone: Arc<dyn Ringtone>, post: TickPoster, config: &CallConfig) -> Self {
        Self {
            ringtone,
            post,
            outgoing_period: config.outgoing_ring_period,
            incoming_period: config.incoming_ring_period,
            max_rings: config.max_rings.max(1),
            outgoing: Ringer::default(),
            incoming: Ringer::default(),
        }
    }

    fn ringer_mut(&mut self, kind: RingerKind) -> &mut Ringer {
        match kind {
            RingerKind::Outgoing => &mut self.outgoing,
            RingerKind::Incoming => &mut self.incoming,
        }
    }

    pub fn is_running(&self, kind: RingerKind) -> bool {
        match kind {
            RingerKind::Outgoing => self.outgoing.is_running(),
            RingerKind::Incoming => self.incoming.is_running(),
        }
    }

    /// Restarts `kind`: plays once now, then once per period.
    pub fn start(&mut self, kind: RingerKind) {
        let period = match kind {
            RingerKind::Outgoing => self.outgoing_period,
            RingerKind::Incoming => self.incoming_period,
        };
        let post = self.post.clone();
        let max_rings = self.max_rings;

        let ringer = self.ringer_mut(kind);
        ringer.handle = None;
        ringer.generation += 1;
        ringer.rings = 1;
        let generation = ringer.generation;
        if max_rings > 1 {
            ringer.handle = Some(TimerHandle::spawn(
                kind.timer_role(),
                generation,
                period,
                post,
            ));
        }

        debug!(target: "Call/Ringer", "{kind:?} ringer started");
        self.ringtone.play(kind);
    }

    pub fn on_tick(&mut self, kind: RingerKind, generation: u64) {
        let max_rings = self.max_rings;
        let ringer = self.ringer_mut(kind);
        if !ringer.is_running() || ringer.generation != generation {
            return;
        }
        if ringer.rings < max_rings {
            ringer.rings += 1;
            self.ringtone.play(kind);
        } else {
            debug!(target: "Call/Ringer", "{kind:?} ringer reached {max_rings} rings");
            self.stop(kind);
        }
    }

    /// Cancels `kind` and silences it, whether or not it was running.
    pub fn stop(&mut self, kind: RingerKind) {
        let ringer = self.ringer_mut(kind);
        ringer.handle = None;
        ringer.generation += 1;
        self.ringtone.silence(kind);
    }

    pub fn stop_all(&mut self) {
        self.stop(RingerKind::Outgoing);
        self.stop(RingerKind::Incoming);
    }
}
