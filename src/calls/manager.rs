//! Call session state machine.
//!
//! [`CallSessionMachine`] owns the single [`Session`] together with its
//! timers, the dedup ledger and the media resources of the call. It is driven
//! exclusively by the controller event loop, one [`CallEvent`] at a time, so
//! no session field is ever mutated concurrently. Work that may take a while
//! (media acquisition, local description generation) runs in spawned tasks
//! that post their result back to the queue tagged with the session epoch and
//! peer-connection generation they were started for; results whose tags no
//! longer match are discarded.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::call_timer::CallTimer;
use super::callbacks::{CallCallbacks, CallNotice};
use super::controller::CallEvent;
use super::dedup::DedupLedger;
use super::error::CallError;
use super::no_answer::{ExpiryAction, NoAnswerStep, NoAnswerTimer, TickAction};
use super::ringer::{RingerKind, RingerScheduler, Ringtone};
use super::signaling::{LocalIdentity, PeerProfile, Signal, SignalingMessage};
use super::state::{CallKind, CallStatus, ConnectionState, NegotiationState, Role, Session};
use super::timer::{TickPoster, TimerRole, TimerTick};
use crate::config::CallConfig;
use crate::media::{
    IceCandidate, MediaCapability, MediaStream, PeerConnection, PeerConnectionState, PeerEvent,
    PeerEventSink, SdpKind, SessionDescription, TrackKind,
};
use crate::transport::MessageTransport;

const LOG_TARGET: &str = "Call/Session";

#[derive(Default)]
enum LocalMedia {
    #[default]
    Idle,
    Pending,
    Ready(Arc<dyn MediaStream>),
    Unavailable,
}

struct ActivePeer {
    generation: u64,
    connection: Arc<dyn PeerConnection>,
    tracks_attached: bool,
    remote_description_set: bool,
    /// Remote candidates received before any remote description was applied.
    pending_candidates: Vec<IceCandidate>,
}

#[derive(Default)]
struct MediaSlot {
    local: LocalMedia,
    remote: Option<Arc<dyn MediaStream>>,
    peer: Option<ActivePeer>,
}

pub struct CallSessionMachine {
    identity: LocalIdentity,
    config: CallConfig,
    transport: Arc<dyn MessageTransport>,
    media: Arc<dyn MediaCapability>,
    callbacks: CallCallbacks,
    events: mpsc::UnboundedSender<CallEvent>,
    session: Session,
    slot: MediaSlot,
    ledger: DedupLedger,
    ringers: RingerScheduler,
    no_answer: NoAnswerTimer,
    call_timer: CallTimer,
    next_peer_generation: u64,
}

impl CallSessionMachine {
    pub(crate) fn new(
        identity: LocalIdentity,
        config: CallConfig,
        transport: Arc<dyn MessageTransport>,
        media: Arc<dyn MediaCapability>,
        ringtone: Arc<dyn Ringtone>,
        callbacks: CallCallbacks,
        events: mpsc::UnboundedSender<CallEvent>,
    ) -> Self {
        let tick_tx = events.clone();
        let post: TickPoster = Arc::new(move |tick| tick_tx.send(CallEvent::Tick(tick)).is_ok());

        Self {
            ledger: DedupLedger::new(config.dedup_capacity),
            ringers: RingerScheduler::new(ringtone, post.clone(), &config),
            no_answer: NoAnswerTimer::new(config.no_answer_ticks, config.no_answer_tick, post.clone()),
            call_timer: CallTimer::new(config.call_timer_period, post),
            identity,
            config,
            transport,
            media,
            callbacks,
            events,
            session: Session::idle(1),
            slot: MediaSlot::default(),
            next_peer_generation: 0,
        }
    }

    pub(crate) async fn dispatch(&mut self, event: CallEvent) {
        match event {
            CallEvent::StartCall { peer, kind, reply } => {
                let result = self.start_call(peer, kind).await;
                let _ = reply.send(result);
            }
            CallEvent::AcceptCall { reply } => {
                let result = self.accept_call().await;
                let _ = reply.send(result);
            }
            CallEvent::DeclineCall { reply } => {
                let result = self.decline_call().await;
                let _ = reply.send(result);
            }
            CallEvent::EndCall {
                self_initiated,
                reply,
            } => {
                self.end_call(self_initiated).await;
                let _ = reply.send(());
            }
            CallEvent::ToggleAudio { reply } => {
                let _ = reply.send(self.toggle_audio());
            }
            CallEvent::ToggleVideo { reply } => {
                let _ = reply.send(self.toggle_video());
            }
            CallEvent::Initialize { callbacks, reply } => {
                self.callbacks = callbacks;
                let _ = reply.send(());
            }
            CallEvent::Snapshot { reply } => {
                let _ = reply.send(self.session.clone());
            }
            CallEvent::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
            }
            CallEvent::Inbound { message, reply } => {
                self.handle_signaling_message(*message).await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            CallEvent::Tick(tick) => self.on_tick(tick).await,
            CallEvent::LocalMedia { epoch, result } => self.on_local_media(epoch, result).await,
            CallEvent::LocalDescription {
                epoch,
                generation,
                result,
            } => self.on_local_description(epoch, generation, result).await,
            CallEvent::Peer {
                epoch,
                generation,
                event,
            } => self.on_peer_event(epoch, generation, event).await,
        }
    }

    pub async fn start_call(&mut self, peer: PeerProfile, kind: CallKind) -> Result<(), CallError> {
        self.session.begin(Role::Caller, peer.clone(), kind, None)?;
        info!(target: LOG_TARGET, "Calling {} ({kind:?})", peer.display_name());

        self.callbacks.caller_details_set(peer);
        self.callbacks.call_view_changed(true, Some(kind));
        self.set_status(CallStatus::ReachingOut);
        self.acquire_local_media();
        self.send(Signal::Request { call_kind: kind }).await;

        let per_tick = if self.config.reannounce_request {
            vec![TickAction::ReannounceRequest]
        } else {
            Vec::new()
        };
        self.no_answer
            .start(Some(ExpiryAction::NotifyPeerUnavailable), per_tick);
        Ok(())
    }

    pub async fn accept_call(&mut self) -> Result<(), CallError> {
        if !self.session.has_unanswered_incoming() {
            return Err(CallError::NoIncomingCall);
        }
        info!(target: LOG_TARGET, "Accepting incoming call");
        let kind = self.session.call_kind;
        self.session.answered = true;

        self.ringers.stop(RingerKind::Incoming);
        self.callbacks.call_view_changed(true, Some(kind));
        self.callbacks.incoming_call_status_changed(false, kind);
        self.acquire_local_media();
        self.send(Signal::Accept).await;
        self.set_status(CallStatus::Connecting);
        self.no_answer.start(None, Vec::new());
        Ok(())
    }

    pub async fn decline_call(&mut self) -> Result<(), CallError> {
        if !self.session.has_unanswered_incoming() {
            return Err(CallError::NoIncomingCall);
        }
        info!(target: LOG_TARGET, "Declining incoming call");
        let kind = self.session.call_kind;

        self.send(Signal::Decline).await;
        self.close_session().await;
        self.callbacks.incoming_call_status_changed(false, kind);
        Ok(())
    }

    /// Tears the call down. Safe to call at any time, including when Idle.
    pub async fn end_call(&mut self, self_initiated: bool) {
        let was_active = self.session.is_active();
        if self_initiated && was_active {
            self.send(Signal::End).await;
        }
        if was_active {
            info!(target: LOG_TARGET, "Call ended (self initiated: {self_initiated})");
        }
        let kind = self.session.call_kind;

        self.close_session().await;
        self.callbacks.call_view_changed(false, None);
        self.callbacks.incoming_call_status_changed(false, kind);
        self.callbacks.call_time_updated(0);
        self.set_status(CallStatus::Idle);
    }

    pub fn toggle_audio(&mut self) -> Result<bool, CallError> {
        let muted = !self.session.audio_muted;
        self.set_tracks_enabled(TrackKind::Audio, !muted)?;
        self.session.audio_muted = muted;
        self.callbacks.audio_mute_changed(muted);
        Ok(muted)
    }

    pub fn toggle_video(&mut self) -> Result<bool, CallError> {
        let muted = !self.session.video_muted;
        self.set_tracks_enabled(TrackKind::Video, !muted)?;
        self.session.video_muted = muted;
        self.callbacks.video_mute_changed(muted);
        Ok(muted)
    }

    pub async fn shutdown(&mut self) {
        if self.session.is_active() {
            self.end_call(false).await;
        } else {
            self.close_session().await;
        }
    }

    fn set_tracks_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), CallError> {
        if !self.session.is_active() {
            return Err(CallError::NoActiveCall);
        }
        let LocalMedia::Ready(stream) = &self.slot.local else {
            return Err(CallError::LocalMediaUnavailable);
        };
        for track in stream.tracks_of(kind) {
            track.set_enabled(enabled);
        }
        Ok(())
    }

    pub async fn handle_signaling_message(&mut self, message: SignalingMessage) {
        let kind = message.kind();
        if !self.ledger.record(&message.id) {
            debug!(target: LOG_TARGET, "Dropping duplicate {kind} {}", message.id);
            return;
        }
        if let Some(reason) = self.foreign_reason(&message) {
            debug!(target: LOG_TARGET, "Ignoring {kind} {}: {reason}", message.id);
            return;
        }
        debug!(target: LOG_TARGET, "Handling {kind} {}", message.id);

        match message.signal {
            Signal::Request { call_kind } => {
                self.on_request(message.sender, message.sender_device, call_kind)
                    .await
            }
            _ if !self.session.is_active() => {
                debug!(target: LOG_TARGET, "No active call for {kind}");
            }
            Signal::Ring => self.on_ring(),
            Signal::Accept => self.on_accepted(message.sender_device).await,
            Signal::Decline => self.on_declined().await,
            Signal::End => self.end_call(false).await,
            Signal::Offer { description } | Signal::Answer { description } => {
                self.on_remote_description(description).await
            }
            Signal::IceCandidate { candidate } => self.on_remote_candidate(candidate).await,
        }
    }

    /// Why a message is not meant for this leg, if it is not.
    fn foreign_reason(&self, message: &SignalingMessage) -> Option<&'static str> {
        if message.sender.id == self.identity.profile.id {
            return Some("sent by this user");
        }
        if let Some(target) = &message.target_device {
            if *target != self.identity.device_id {
                return Some("addressed to another device");
            }
        }
        if let (Some(pinned), Some(sender_device)) =
            (&self.session.target_device, &message.sender_device)
        {
            if pinned != sender_device {
                return Some("sent by a device other than the pinned one");
            }
        }
        let is_request = matches!(message.signal, Signal::Request { .. });
        if self.session.is_active() && !is_request && !self.session.is_peer(&message.sender) {
            return Some("sent by someone outside the call");
        }
        None
    }

    async fn on_request(
        &mut self,
        sender: PeerProfile,
        sender_device: Option<String>,
        call_kind: CallKind,
    ) {
        if self.session.initiation_seen || self.session.is_active() {
            debug!(target: LOG_TARGET, "Busy, ignoring call request from {}", sender.id);
            return;
        }
        if let Err(e) = self
            .session
            .begin(Role::Callee, sender.clone(), call_kind, sender_device)
        {
            warn!(target: LOG_TARGET, "Could not open incoming session: {e}");
            return;
        }
        info!(target: LOG_TARGET, "Incoming {call_kind:?} call from {}", sender.display_name());

        self.ringers.start(RingerKind::Incoming);
        self.callbacks.caller_details_set(sender);
        self.callbacks.incoming_call_status_changed(true, call_kind);
        self.send(Signal::Ring).await;
        // Bounds an incoming call that is never picked up on this device.
        self.no_answer.start(None, Vec::new());
    }

    fn on_ring(&mut self) {
        if !self.session.is_awaiting_pickup() {
            return;
        }
        self.ringers.start(RingerKind::Outgoing);
        self.set_status(CallStatus::Ringing);
        self.no_answer.start(None, Vec::new());
    }

    async fn on_accepted(&mut self, sender_device: Option<String>) {
        if !self.session.is_awaiting_pickup() {
            return;
        }
        info!(target: LOG_TARGET, "Call accepted on device {sender_device:?}");
        self.session.answered = true;
        self.session.target_device = sender_device;

        self.ringers.stop(RingerKind::Outgoing);
        self.create_peer_connection().await;
        self.set_status(CallStatus::Connecting);
        self.no_answer.start(None, Vec::new());
    }

    async fn on_declined(&mut self) {
        if !self.session.is_caller() {
            return;
        }
        let peer = self.session.peer.clone();
        info!(target: LOG_TARGET, "Call declined by peer");

        self.close_session().await;
        self.callbacks.call_view_changed(false, None);
        self.set_status(CallStatus::Idle);
        if let Some(peer) = peer {
            self.callbacks.notice(CallNotice::Declined { peer });
        }
    }

    async fn on_remote_description(&mut self, description: SessionDescription) {
        if self.slot.peer.is_none() {
            if !(self.session.is_callee() && self.session.answered) {
                debug!(target: LOG_TARGET, "No peer connection for remote {:?}", description.kind);
                return;
            }
            self.create_peer_connection().await;
        }
        let Some(peer) = self.slot.peer.as_mut() else {
            return;
        };

        let is_offer = description.kind == SdpKind::Offer;
        if let Err(e) = peer.connection.set_remote_description(description).await {
            warn!(target: LOG_TARGET, "Failed to apply remote description: {e}");
            return;
        }
        peer.remote_description_set = true;
        let pending = std::mem::take(&mut peer.pending_candidates);
        for candidate in pending {
            if let Err(e) = peer.connection.add_ice_candidate(candidate).await {
                warn!(target: LOG_TARGET, "Failed to apply buffered ICE candidate: {e}");
            }
        }

        if is_offer {
            self.generate_local_description(SdpKind::Answer);
        } else {
            self.session.negotiation = NegotiationState::Stable;
        }
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.slot.peer.is_none() && self.session.is_callee() && self.session.answered {
            self.create_peer_connection().await;
        }
        let Some(peer) = self.slot.peer.as_mut() else {
            debug!(target: LOG_TARGET, "No peer connection for remote ICE candidate");
            return;
        };
        if !peer.remote_description_set {
            peer.pending_candidates.push(candidate);
            return;
        }
        if let Err(e) = peer.connection.add_ice_candidate(candidate).await {
            warn!(target: LOG_TARGET, "Failed to apply remote ICE candidate: {e}");
        }
    }

    async fn on_tick(&mut self, tick: TimerTick) {
        match tick.role {
            TimerRole::OutgoingRinger => self.ringers.on_tick(RingerKind::Outgoing, tick.generation),
            TimerRole::IncomingRinger => self.ringers.on_tick(RingerKind::Incoming, tick.generation),
            TimerRole::CallDuration => {
                if let Some(elapsed) = self.call_timer.on_tick(tick.generation) {
                    self.session.elapsed_seconds = elapsed;
                    self.callbacks.call_time_updated(elapsed);
                }
            }
            TimerRole::NoAnswer => match self.no_answer.on_tick(tick.generation) {
                NoAnswerStep::Stale => {}
                NoAnswerStep::Tick(actions) => {
                    for action in actions {
                        self.run_tick_action(action).await;
                    }
                }
                NoAnswerStep::Expired(action) => {
                    info!(target: LOG_TARGET, "No answer, ending call");
                    let peer = self.session.peer.clone();
                    self.end_call(true).await;
                    if let (Some(ExpiryAction::NotifyPeerUnavailable), Some(peer)) = (action, peer) {
                        self.callbacks.notice(CallNotice::PeerUnavailable { peer });
                    }
                }
            },
        }
    }

    async fn run_tick_action(&mut self, action: TickAction) {
        match action {
            TickAction::ReannounceRequest => {
                if self.session.is_awaiting_pickup() {
                    let call_kind = self.session.call_kind;
                    self.send(Signal::Request { call_kind }).await;
                }
            }
        }
    }

    fn acquire_local_media(&mut self) {
        if !matches!(self.slot.local, LocalMedia::Idle) {
            return;
        }
        self.slot.local = LocalMedia::Pending;

        let media = self.media.clone();
        let events = self.events.clone();
        let epoch = self.session.epoch;
        let kind = self.session.call_kind;
        tokio::spawn(async move {
            let result = media.acquire_local_stream(kind).await;
            let _ = events.send(CallEvent::LocalMedia { epoch, result });
        });
    }

    async fn on_local_media(
        &mut self,
        epoch: u64,
        result: Result<Arc<dyn MediaStream>, anyhow::Error>,
    ) {
        let current = epoch == self.session.epoch
            && self.session.is_active()
            && matches!(self.slot.local, LocalMedia::Pending);
        if !current {
            if let Ok(stream) = result {
                debug!(target: LOG_TARGET, "Releasing local stream of a finished call");
                stream.stop_all();
            }
            return;
        }

        match result {
            Ok(stream) => {
                for track in stream.tracks_of(TrackKind::Audio) {
                    track.set_enabled(!self.session.audio_muted);
                }
                for track in stream.tracks_of(TrackKind::Video) {
                    track.set_enabled(!self.session.video_muted);
                }
                self.slot.local = LocalMedia::Ready(stream.clone());
                self.callbacks.local_stream_added(stream);
                self.attach_local_tracks().await;
            }
            Err(e) => {
                let err = CallError::Media(e);
                warn!(target: LOG_TARGET, "Continuing without local media: {err}");
                self.slot.local = LocalMedia::Unavailable;
                self.callbacks.notice(CallNotice::LocalMediaUnavailable {
                    reason: err.to_string(),
                });
            }
        }
    }

    async fn create_peer_connection(&mut self) {
        self.next_peer_generation += 1;
        let generation = self.next_peer_generation;
        let epoch = self.session.epoch;
        let events = self.events.clone();
        let sink = PeerEventSink::new(move |event| {
            let _ = events.send(CallEvent::Peer {
                epoch,
                generation,
                event,
            });
        });

        match self
            .media
            .create_peer_connection(&self.config.peer_connection, sink)
            .await
        {
            Ok(connection) => {
                debug!(target: LOG_TARGET, "Peer connection {generation} created");
                self.slot.peer = Some(ActivePeer {
                    generation,
                    connection,
                    tracks_attached: false,
                    remote_description_set: false,
                    pending_candidates: Vec::new(),
                });
                self.acquire_local_media();
                self.attach_local_tracks().await;
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to create peer connection: {}", CallError::Media(e));
            }
        }
    }

    async fn attach_local_tracks(&mut self) {
        let LocalMedia::Ready(stream) = &self.slot.local else {
            return;
        };
        let Some(peer) = self.slot.peer.as_mut() else {
            return;
        };
        if peer.tracks_attached {
            return;
        }
        peer.tracks_attached = true;
        for track in stream.tracks() {
            if let Err(e) = peer.connection.add_track(track, stream.clone()).await {
                warn!(target: LOG_TARGET, "Failed to attach local track: {e}");
            }
        }
    }

    fn generate_local_description(&mut self, kind: SdpKind) {
        let Some(peer) = &self.slot.peer else {
            return;
        };
        let connection = peer.connection.clone();
        let generation = peer.generation;
        let epoch = self.session.epoch;
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = async {
                let description = match kind {
                    SdpKind::Offer => connection.create_offer().await?,
                    _ => connection.create_answer().await?,
                };
                connection.set_local_description(description.clone()).await?;
                Ok::<_, anyhow::Error>(description)
            }
            .await;
            let _ = events.send(CallEvent::LocalDescription {
                epoch,
                generation,
                result,
            });
        });
    }

    async fn on_local_description(
        &mut self,
        epoch: u64,
        generation: u64,
        result: Result<SessionDescription, anyhow::Error>,
    ) {
        if !self.is_current_peer(epoch, generation) {
            return;
        }
        match result {
            Ok(description) if description.kind == SdpKind::Offer => {
                self.session.negotiation = NegotiationState::OfferSent;
                self.send(Signal::Offer { description }).await;
            }
            Ok(description) => {
                self.session.negotiation = NegotiationState::AnswerSent;
                self.send(Signal::Answer { description }).await;
            }
            Err(e) => warn!(target: LOG_TARGET, "Failed to generate local description: {e}"),
        }
    }

    fn is_current_peer(&self, epoch: u64, generation: u64) -> bool {
        epoch == self.session.epoch
            && self
                .slot
                .peer
                .as_ref()
                .is_some_and(|peer| peer.generation == generation)
    }

    async fn on_peer_event(&mut self, epoch: u64, generation: u64, event: PeerEvent) {
        if !self.is_current_peer(epoch, generation) {
            debug!(target: LOG_TARGET, "Dropping {event:?} from a replaced peer connection");
            return;
        }
        match event {
            PeerEvent::IceCandidate(candidate) => {
                self.send(Signal::IceCandidate { candidate }).await;
            }
            PeerEvent::RenegotiationNeeded => match self.session.negotiation {
                NegotiationState::None | NegotiationState::Stable => {
                    self.generate_local_description(SdpKind::Offer);
                }
                state => {
                    debug!(target: LOG_TARGET, "Renegotiation deferred while {state:?}");
                }
            },
            PeerEvent::RemoteStreamAdded(stream) => {
                self.slot.remote = Some(stream.clone());
                self.callbacks.remote_stream_added(stream);
            }
            PeerEvent::RemoteStreamRemoved => {
                self.slot.remote = None;
            }
            PeerEvent::ConnectionStateChanged(state) => self.on_connection_state(state).await,
        }
    }

    async fn on_connection_state(&mut self, state: PeerConnectionState) {
        debug!(target: LOG_TARGET, "Peer connection is {state:?}");
        match state {
            PeerConnectionState::New => {
                self.session.connection = ConnectionState::New;
                self.set_status(CallStatus::Connecting);
                self.no_answer.start(None, Vec::new());
            }
            PeerConnectionState::Connecting => {
                self.session.connection = ConnectionState::Connecting;
            }
            PeerConnectionState::Connected => {
                self.session.connection = ConnectionState::Connected;
                self.session.negotiation = NegotiationState::Stable;
                self.set_status(CallStatus::Connected);
                self.no_answer.stop();
                self.call_timer.start();
            }
            PeerConnectionState::Disconnected
            | PeerConnectionState::Failed
            | PeerConnectionState::Closed => {
                if let Some(peer) = self.slot.peer.take() {
                    peer.connection.close().await;
                }
                self.call_timer.stop();
                self.session.connection = ConnectionState::Reconnecting;
                self.session.negotiation = if self.session.is_callee() {
                    NegotiationState::AwaitingOffer
                } else {
                    NegotiationState::None
                };
                self.set_status(CallStatus::Reconnecting);
                self.no_answer.start(None, Vec::new());

                if self.session.is_caller() {
                    info!(target: LOG_TARGET, "Connection lost, reconnecting");
                    self.create_peer_connection().await;
                } else {
                    info!(target: LOG_TARGET, "Connection lost, waiting for the caller to reconnect");
                }
            }
        }
    }

    fn set_status(&mut self, status: CallStatus) {
        self.session.status = status;
        self.callbacks.call_status_changed(status);
    }

    /// Publishes `signal` to the session peer. Failures are logged; an
    /// unreachable peer surfaces through the no-answer timer instead.
    async fn send(&self, signal: Signal) {
        let Some(peer) = &self.session.peer else {
            return;
        };
        let message = SignalingMessage::outbound(
            &self.identity,
            peer,
            self.session.target_device.clone(),
            signal,
        );
        if let Err(e) = self.publish(&message).await {
            warn!(target: LOG_TARGET, "Failed to send {}: {e}", message.kind());
        }
    }

    async fn publish(&self, message: &SignalingMessage) -> Result<(), CallError> {
        let value = message.to_value()?;
        self.transport
            .publish(&self.config.publish_topic, value, &message.channel_id)
            .await
            .map_err(CallError::Transport)?;
        debug!(target: LOG_TARGET, "Sent {} {}", message.kind(), message.id);
        Ok(())
    }

    /// Cancels every timer role, releases media and resets the session.
    async fn close_session(&mut self) {
        self.no_answer.stop();
        self.ringers.stop_all();
        self.call_timer.reset();

        let slot = std::mem::take(&mut self.slot);
        if let LocalMedia::Ready(stream) = &slot.local {
            stream.stop_all();
        }
        if let Some(remote) = &slot.remote {
            remote.stop_all();
        }
        if let Some(peer) = slot.peer {
            peer.connection.close().await;
        }

        if self.session.is_active() {
            self.ledger.retire_session();
        }
        let epoch = self.session.epoch + 1;
        self.session = Session::idle(epoch);
    }
}
