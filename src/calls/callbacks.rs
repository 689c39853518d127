//! UI callback surface of the call state machine.

use std::fmt;
use std::sync::Arc;

use super::error::CallError;
use super::signaling::PeerProfile;
use super::state::{CallKind, CallStatus};
use crate::media::MediaStream;

/// One-off messages the UI shows as a popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallNotice {
    /// The peer never answered the call request.
    PeerUnavailable { peer: PeerProfile },
    /// The peer declined the call.
    Declined { peer: PeerProfile },
    /// Microphone or camera could not be acquired; the call continues.
    LocalMediaUnavailable { reason: String },
}

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;
type Callback2<A, B> = Arc<dyn Fn(A, B) + Send + Sync>;

/// Complete set of UI callbacks. Built through [`CallCallbacks::builder`],
/// which refuses to produce a set with a missing callback.
#[derive(Clone)]
pub struct CallCallbacks {
    pub(crate) on_caller_details_set: Callback<PeerProfile>,
    pub(crate) on_incoming_call_status_changed: Callback2<bool, CallKind>,
    pub(crate) on_call_view_changed: Callback2<bool, Option<CallKind>>,
    pub(crate) on_remote_stream_added: Callback<Arc<dyn MediaStream>>,
    pub(crate) on_local_stream_added: Callback<Arc<dyn MediaStream>>,
    pub(crate) on_call_time_updated: Callback<u64>,
    pub(crate) on_audio_mute_changed: Callback<bool>,
    pub(crate) on_video_mute_changed: Callback<bool>,
    pub(crate) on_call_status_changed: Callback<CallStatus>,
    pub(crate) on_notice: Callback<CallNotice>,
}

impl fmt::Debug for CallCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCallbacks").finish_non_exhaustive()
    }
}

impl CallCallbacks {
    pub fn builder() -> CallCallbacksBuilder {
        CallCallbacksBuilder::default()
    }

    pub(crate) fn caller_details_set(&self, peer: PeerProfile) {
        (self.on_caller_details_set)(peer);
    }

    pub(crate) fn incoming_call_status_changed(&self, visible: bool, kind: CallKind) {
        (self.on_incoming_call_status_changed)(visible, kind);
    }

    pub(crate) fn call_view_changed(&self, visible: bool, kind: Option<CallKind>) {
        (self.on_call_view_changed)(visible, kind);
    }

    pub(crate) fn remote_stream_added(&self, stream: Arc<dyn MediaStream>) {
        (self.on_remote_stream_added)(stream);
    }

    pub(crate) fn local_stream_added(&self, stream: Arc<dyn MediaStream>) {
        (self.on_local_stream_added)(stream);
    }

    pub(crate) fn call_time_updated(&self, seconds: u64) {
        (self.on_call_time_updated)(seconds);
    }

    pub(crate) fn audio_mute_changed(&self, muted: bool) {
        (self.on_audio_mute_changed)(muted);
    }

    pub(crate) fn video_mute_changed(&self, muted: bool) {
        (self.on_video_mute_changed)(muted);
    }

    pub(crate) fn call_status_changed(&self, status: CallStatus) {
        (self.on_call_status_changed)(status);
    }

    pub(crate) fn notice(&self, notice: CallNotice) {
        (self.on_notice)(notice);
    }
}

#[derive(Default)]
pub struct CallCallbacksBuilder {
    on_caller_details_set: Option<Callback<PeerProfile>>,
    on_incoming_call_status_changed: Option<Callback2<bool, CallKind>>,
    on_call_view_changed: Option<Callback2<bool, Option<CallKind>>>,
    on_remote_stream_added: Option<Callback<Arc<dyn MediaStream>>>,
    on_local_stream_added: Option<Callback<Arc<dyn MediaStream>>>,
    on_call_time_updated: Option<Callback<u64>>,
    on_audio_mute_changed: Option<Callback<bool>>,
    on_video_mute_changed: Option<Callback<bool>>,
    on_call_status_changed: Option<Callback<CallStatus>>,
    on_notice: Option<Callback<CallNotice>>,
}

impl CallCallbacksBuilder {
    pub fn on_caller_details_set(mut self, f: impl Fn(PeerProfile) + Send + Sync + 'static) -> Self {
        self.on_caller_details_set = Some(Arc::new(f));
        self
    }

    /// Visibility of the incoming-call indicator.
    pub fn on_incoming_call_status_changed(
        mut self,
        f: impl Fn(bool, CallKind) + Send + Sync + 'static,
    ) -> Self {
        self.on_incoming_call_status_changed = Some(Arc::new(f));
        self
    }

    /// Visibility of the in-call view; the kind is `None` when hidden.
    pub fn on_call_view_changed(
        mut self,
        f: impl Fn(bool, Option<CallKind>) + Send + Sync + 'static,
    ) -> Self {
        self.on_call_view_changed = Some(Arc::new(f));
        self
    }

    pub fn on_remote_stream_added(
        mut self,
        f: impl Fn(Arc<dyn MediaStream>) + Send + Sync + 'static,
    ) -> Self {
        self.on_remote_stream_added = Some(Arc::new(f));
        self
    }

    pub fn on_local_stream_added(
        mut self,
        f: impl Fn(Arc<dyn MediaStream>) + Send + Sync + 'static,
    ) -> Self {
        self.on_local_stream_added = Some(Arc::new(f));
        self
    }

    pub fn on_call_time_updated(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_call_time_updated = Some(Arc::new(f));
        self
    }

    pub fn on_audio_mute_changed(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_audio_mute_changed = Some(Arc::new(f));
        self
    }

    pub fn on_video_mute_changed(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_video_mute_changed = Some(Arc::new(f));
        self
    }

    pub fn on_call_status_changed(
        mut self,
        f: impl Fn(CallStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_call_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_notice(mut self, f: impl Fn(CallNotice) + Send + Sync + 'static) -> Self {
        self.on_notice = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<CallCallbacks, CallError> {
        Ok(CallCallbacks {
            on_caller_details_set: self
                .on_caller_details_set
                .ok_or(CallError::MissingCallback("on_caller_details_set"))?,
            on_incoming_call_status_changed: self
                .on_incoming_call_status_changed
                .ok_or(CallError::MissingCallback("on_incoming_call_status_changed"))?,
            on_call_view_changed: self
                .on_call_view_changed
                .ok_or(CallError::MissingCallback("on_call_view_changed"))?,
            on_remote_stream_added: self
                .on_remote_stream_added
                .ok_or(CallError::MissingCallback("on_remote_stream_added"))?,
            on_local_stream_added: self
                .on_local_stream_added
                .ok_or(CallError::MissingCallback("on_local_stream_added"))?,
            on_call_time_updated: self
                .on_call_time_updated
                .ok_or(CallError::MissingCallback("on_call_time_updated"))?,
            on_audio_mute_changed: self
                .on_audio_mute_changed
                .ok_or(CallError::MissingCallback("on_audio_mute_changed"))?,
            on_video_mute_changed: self
                .on_video_mute_changed
                .ok_or(CallError::MissingCallback("on_video_mute_changed"))?,
            on_call_status_changed: self
                .on_call_status_changed
                .ok_or(CallError::MissingCallback("on_call_status_changed"))?,
            on_notice: self
                .on_notice
                .ok_or(CallError::MissingCallback("on_notice"))?,
        })
    }
}
