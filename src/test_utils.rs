use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::calls::{CallCallbacks, CallKind, CallNotice, CallStatus, RingerKind, Ringtone};
use crate::media::{
    IceCandidate, MediaCapability, MediaStream, MediaTrack, PeerConnection, PeerConnectionConfig,
    PeerEvent, PeerEventSink, SessionDescription, TrackKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingEvent {
    Play(RingerKind),
    Silence(RingerKind),
}

#[derive(Default)]
pub struct RecordingRingtone {
    events: Mutex<Vec<RingEvent>>,
}

impl RecordingRingtone {
    pub fn events(&self) -> Vec<RingEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn plays(&self, kind: RingerKind) -> usize {
        self.count(RingEvent::Play(kind))
    }

    pub fn silences(&self, kind: RingerKind) -> usize {
        self.count(RingEvent::Silence(kind))
    }

    fn count(&self, event: RingEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == event)
            .count()
    }
}

impl Ringtone for RecordingRingtone {
    fn play(&self, kind: RingerKind) {
        self.events.lock().unwrap().push(RingEvent::Play(kind));
    }

    fn silence(&self, kind: RingerKind) {
        self.events.lock().unwrap().push(RingEvent::Silence(kind));
    }
}

/// Everything the state machine reported to the UI, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    CallerDetails(String),
    IncomingCall(bool, CallKind),
    CallView(bool, Option<CallKind>),
    RemoteStream(String),
    LocalStream(String),
    CallTime(u64),
    AudioMute(bool),
    VideoMute(bool),
    Status(CallStatus),
    Notice(CallNotice),
}

#[derive(Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn callbacks(self: &Arc<Self>) -> CallCallbacks {
        let ui = self.clone();
        CallCallbacks::builder()
            .on_caller_details_set({
                let ui = ui.clone();
                move |peer| ui.push(UiEvent::CallerDetails(peer.id))
            })
            .on_incoming_call_status_changed({
                let ui = ui.clone();
                move |visible, kind| ui.push(UiEvent::IncomingCall(visible, kind))
            })
            .on_call_view_changed({
                let ui = ui.clone();
                move |visible, kind| ui.push(UiEvent::CallView(visible, kind))
            })
            .on_remote_stream_added({
                let ui = ui.clone();
                move |stream| ui.push(UiEvent::RemoteStream(stream.id()))
            })
            .on_local_stream_added({
                let ui = ui.clone();
                move |stream| ui.push(UiEvent::LocalStream(stream.id()))
            })
            .on_call_time_updated({
                let ui = ui.clone();
                move |seconds| ui.push(UiEvent::CallTime(seconds))
            })
            .on_audio_mute_changed({
                let ui = ui.clone();
                move |muted| ui.push(UiEvent::AudioMute(muted))
            })
            .on_video_mute_changed({
                let ui = ui.clone();
                move |muted| ui.push(UiEvent::VideoMute(muted))
            })
            .on_call_status_changed({
                let ui = ui.clone();
                move |status| ui.push(UiEvent::Status(status))
            })
            .on_notice(move |notice| ui.push(UiEvent::Notice(notice)))
            .build()
            .expect("complete callback set")
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn statuses(&self) -> Vec<CallStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<CallStatus> {
        self.statuses().last().copied()
    }

    /// Non-zero elapsed-time updates, in order.
    pub fn call_times(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::CallTime(seconds) if seconds > 0 => Some(seconds),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<CallNotice> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &UiEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

pub struct FakeTrack {
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub struct FakeStream {
    id: String,
    tracks: Vec<Arc<FakeTrack>>,
}

impl FakeStream {
    pub fn new(id: impl Into<String>, kind: CallKind) -> Self {
        let mut tracks = vec![Arc::new(FakeTrack::new(TrackKind::Audio))];
        if kind.has_video() {
            tracks.push(Arc::new(FakeTrack::new(TrackKind::Video)));
        }
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn fake_tracks(&self) -> &[Arc<FakeTrack>] {
        &self.tracks
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks.iter().all(|track| track.is_stopped())
    }

    pub fn track(&self, kind: TrackKind) -> Option<&Arc<FakeTrack>> {
        self.tracks.iter().find(|track| track.kind == kind)
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .map(|track| track.clone() as Arc<dyn MediaTrack>)
            .collect()
    }
}

/// Calls made on a [`FakePeerConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum PeerOp {
    SetRemote(SessionDescription),
    SetLocal(SessionDescription),
    AddCandidate(IceCandidate),
    AddTrack(TrackKind),
}

pub struct FakePeerConnection {
    id: u64,
    sink: PeerEventSink,
    ops: Mutex<Vec<PeerOp>>,
    closed: AtomicBool,
    renegotiation_requested: AtomicBool,
}

impl FakePeerConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reports an event as the platform peer connection would.
    pub fn emit(&self, event: PeerEvent) {
        self.sink.emit(event);
    }

    pub fn ops(&self) -> Vec<PeerOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                PeerOp::AddCandidate(candidate) => Some(candidate),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: PeerOp) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), anyhow::Error> {
        self.record(PeerOp::SetRemote(description));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, anyhow::Error> {
        Ok(SessionDescription::offer(format!("offer-sdp-{}", self.id)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, anyhow::Error> {
        Ok(SessionDescription::answer(format!("answer-sdp-{}", self.id)))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), anyhow::Error> {
        self.record(PeerOp::SetLocal(description));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), anyhow::Error> {
        self.record(PeerOp::AddCandidate(candidate));
        Ok(())
    }

    async fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        _stream: Arc<dyn MediaStream>,
    ) -> Result<(), anyhow::Error> {
        self.record(PeerOp::AddTrack(track.kind()));
        // Browsers raise a single negotiation-needed event per batch of tracks.
        if !self.renegotiation_requested.swap(true, Ordering::SeqCst) {
            self.sink.emit(PeerEvent::RenegotiationNeeded);
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Media capability handing out fake streams and peer connections.
#[derive(Default)]
pub struct FakeMedia {
    acquire_error: Mutex<Option<String>>,
    acquire_delay: Mutex<Duration>,
    streams: Mutex<Vec<Arc<FakeStream>>>,
    connections: Mutex<Vec<Arc<FakePeerConnection>>>,
    next_id: AtomicU64,
}

impl FakeMedia {
    pub fn fail_acquisition(&self, reason: &str) {
        *self.acquire_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn delay_acquisition(&self, delay: Duration) {
        *self.acquire_delay.lock().unwrap() = delay;
    }

    pub fn streams(&self) -> Vec<Arc<FakeStream>> {
        self.streams.lock().unwrap().clone()
    }

    pub fn connections(&self) -> Vec<Arc<FakePeerConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub fn last_connection(&self) -> Option<Arc<FakePeerConnection>> {
        self.connections.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MediaCapability for FakeMedia {
    async fn acquire_local_stream(
        &self,
        kind: CallKind,
    ) -> Result<Arc<dyn MediaStream>, anyhow::Error> {
        let delay = *self.acquire_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.acquire_error.lock().unwrap().clone() {
            return Err(anyhow::anyhow!(reason));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stream = Arc::new(FakeStream::new(format!("local-{id}"), kind));
        self.streams.lock().unwrap().push(stream.clone());
        Ok(stream)
    }

    async fn create_peer_connection(
        &self,
        _config: &PeerConnectionConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, anyhow::Error> {
        let connection = Arc::new(FakePeerConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            sink: events,
            ops: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            renegotiation_requested: AtomicBool::new(false),
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}
