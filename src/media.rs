//! Media capability consumed by the call state machine.
//!
//! Capturing audio/video and negotiating the peer connection are platform
//! services (a browser, an OS media stack, a WebRTC library). The state
//! machine only drives them through the traits in this module, so any
//! implementation that can acquire a stream and run an offer/answer exchange
//! can be plugged in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::calls::CallKind;

/// Kind of a single media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// One audio or video track of a local or remote stream.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Enables or disables the track without releasing the device.
    fn set_enabled(&self, enabled: bool);

    /// Stops the track and releases the underlying device.
    fn stop(&self);
}

/// A bundle of tracks captured locally or received from the peer.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> String;

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    fn tracks_of(&self, kind: TrackKind) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks()
            .into_iter()
            .filter(|track| track.kind() == kind)
            .collect()
    }

    fn stop_all(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }
}

/// Type of a session description in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description exchanged verbatim between the two legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate as produced by the peer connection (RFC 8839 syntax).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn with_sdp_mid(mut self, sdp_mid: impl Into<String>) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self
    }

    pub fn with_sdp_m_line_index(mut self, index: u16) -> Self {
        self.sdp_m_line_index = Some(index);
        self
    }
}

/// STUN/TURN server handed to the peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// Builds the TURN server from `TURN_SERVER_URL`, `TURN_SERVER_USERNAME`
    /// and `TURN_SERVER_PASSWORD`. Returns `None` when no URL is configured.
    pub fn turn_from_env() -> Option<Self> {
        Self::turn_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn turn_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let url = lookup("TURN_SERVER_URL").filter(|url| !url.is_empty())?;
        Some(Self {
            urls: vec![url],
            username: lookup("TURN_SERVER_USERNAME"),
            credential: lookup("TURN_SERVER_PASSWORD"),
        })
    }
}

/// Configuration used for every peer connection of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConnectionConfig {
    pub ice_servers: Vec<IceServer>,
}

/// Connection state reported by the peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Notifications raised by a peer connection.
pub enum PeerEvent {
    /// A local ICE candidate was gathered and should be sent to the peer.
    IceCandidate(IceCandidate),
    /// Tracks changed and a fresh offer must be negotiated.
    RenegotiationNeeded,
    RemoteStreamAdded(Arc<dyn MediaStream>),
    RemoteStreamRemoved,
    ConnectionStateChanged(PeerConnectionState),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IceCandidate(candidate) => f.debug_tuple("IceCandidate").field(candidate).finish(),
            Self::RenegotiationNeeded => f.write_str("RenegotiationNeeded"),
            Self::RemoteStreamAdded(stream) => {
                f.debug_tuple("RemoteStreamAdded").field(&stream.id()).finish()
            }
            Self::RemoteStreamRemoved => f.write_str("RemoteStreamRemoved"),
            Self::ConnectionStateChanged(state) => {
                f.debug_tuple("ConnectionStateChanged").field(state).finish()
            }
        }
    }
}

/// Where a peer connection reports its events.
///
/// Each sink is bound to the call and connection it was created for, so
/// events from a connection that has since been replaced are recognised and
/// dropped by the state machine.
#[derive(Clone)]
pub struct PeerEventSink {
    deliver: Arc<dyn Fn(PeerEvent) + Send + Sync>,
}

impl PeerEventSink {
    pub fn new(deliver: impl Fn(PeerEvent) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn emit(&self, event: PeerEvent) {
        (self.deliver)(event);
    }
}

/// A negotiated (or negotiating) peer-to-peer media connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), anyhow::Error>;

    async fn create_offer(&self) -> Result<SessionDescription, anyhow::Error>;

    async fn create_answer(&self) -> Result<SessionDescription, anyhow::Error>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), anyhow::Error>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), anyhow::Error>;

    async fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        stream: Arc<dyn MediaStream>,
    ) -> Result<(), anyhow::Error>;

    async fn close(&self);
}

/// Entry point of the platform media stack.
#[async_trait]
pub trait MediaCapability: Send + Sync {
    /// Captures the local microphone, plus the camera for video calls.
    async fn acquire_local_stream(
        &self,
        kind: CallKind,
    ) -> Result<Arc<dyn MediaStream>, anyhow::Error>;

    async fn create_peer_connection(
        &self,
        config: &PeerConnectionConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, anyhow::Error>;
}
