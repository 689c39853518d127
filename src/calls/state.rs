//! Call session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CallError;
use super::signaling::PeerProfile;

/// Which side of the call this leg plays. Set once when a session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Role {
    #[default]
    Unassigned,
    Caller,
    Callee,
}

/// Media kind requested for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    #[default]
    Audio,
    Video,
}

impl CallKind {
    pub fn has_video(self) -> bool {
        matches!(self, Self::Video)
    }
}

/// Progress of the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NegotiationState {
    #[default]
    None,
    AwaitingOffer,
    OfferSent,
    AnswerSent,
    Stable,
}

/// Lifecycle of the media connection as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Reconnecting,
    #[default]
    Closed,
}

/// Connection status text shown by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CallStatus {
    #[default]
    Idle,
    ReachingOut,
    Ringing,
    Connecting,
    Connected,
    Reconnecting,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::ReachingOut => "Reaching out",
            Self::Ringing => "Ringing...",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single call session owned by the state machine.
///
/// A default session is Idle: no role, no peer and a closed connection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    /// Generation of this session; async completions tagged with another
    /// epoch are stale.
    pub epoch: u64,
    pub role: Role,
    pub peer: Option<PeerProfile>,
    pub call_kind: CallKind,
    /// Device of the peer this leg talks to, pinned once known.
    pub target_device: Option<String>,
    pub negotiation: NegotiationState,
    pub connection: ConnectionState,
    pub elapsed_seconds: u64,
    /// An incoming `request` has already been taken up by this session.
    pub initiation_seen: bool,
    /// The callee picked up: set on `accept_call` for the callee and on the
    /// inbound `accept` for the caller.
    pub answered: bool,
    pub audio_muted: bool,
    pub video_muted: bool,
    pub status: CallStatus,
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn idle(epoch: u64) -> Self {
        Self {
            epoch,
            ..Default::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.role != Role::Unassigned
    }

    pub fn is_caller(&self) -> bool {
        self.role == Role::Caller
    }

    pub fn is_callee(&self) -> bool {
        self.role == Role::Callee
    }

    /// Caller waiting for the peer to pick up.
    pub fn is_awaiting_pickup(&self) -> bool {
        self.is_caller() && !self.answered
    }

    /// Callee with an incoming call nobody has accepted yet.
    pub fn has_unanswered_incoming(&self) -> bool {
        self.is_callee() && !self.answered
    }

    /// Opens the session for `role`. Fails when a session is already open,
    /// so the role is assigned exactly once per session.
    pub fn begin(
        &mut self,
        role: Role,
        peer: PeerProfile,
        call_kind: CallKind,
        target_device: Option<String>,
    ) -> Result<(), CallError> {
        if self.is_active() {
            return Err(CallError::SessionActive);
        }
        self.role = role;
        self.peer = Some(peer);
        self.call_kind = call_kind;
        self.target_device = target_device;
        self.connection = ConnectionState::New;
        self.negotiation = match role {
            Role::Callee => NegotiationState::AwaitingOffer,
            _ => NegotiationState::None,
        };
        self.initiation_seen = role == Role::Callee;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Whether `sender` is the peer of the open session.
    pub fn is_peer(&self, sender: &PeerProfile) -> bool {
        self.peer.as_ref().is_some_and(|peer| peer.id == sender.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerProfile {
        PeerProfile::new("u-2", "bob", "room-1")
    }

    #[test]
    fn test_begin_assigns_role_once() {
        let mut session = Session::idle(1);
        assert!(!session.is_active());

        session
            .begin(Role::Callee, peer(), CallKind::Video, Some("dev-b".into()))
            .unwrap();
        assert!(session.is_callee());
        assert!(session.initiation_seen);
        assert_eq!(session.negotiation, NegotiationState::AwaitingOffer);
        assert_eq!(session.connection, ConnectionState::New);
        assert!(session.started_at.is_some());

        let err = session
            .begin(Role::Caller, peer(), CallKind::Audio, None)
            .unwrap_err();
        assert!(matches!(err, CallError::SessionActive));
        assert!(session.is_callee());
        assert_eq!(session.call_kind, CallKind::Video);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(CallStatus::Idle.to_string(), "");
        assert_eq!(CallStatus::ReachingOut.to_string(), "Reaching out");
        assert_eq!(CallStatus::Ringing.to_string(), "Ringing...");
        assert_eq!(CallStatus::Connecting.to_string(), "Connecting...");
        assert_eq!(CallStatus::Connected.to_string(), "Connected");
        assert_eq!(CallStatus::Reconnecting.to_string(), "Reconnecting");
    }

    #[test]
    fn test_is_peer_compares_identity() {
        let mut session = Session::idle(0);
        assert!(!session.is_peer(&peer()));
        session
            .begin(Role::Caller, peer(), CallKind::Audio, None)
            .unwrap();
        assert!(session.is_peer(&PeerProfile::new("u-2", "renamed", "room-1")));
        assert!(!session.is_peer(&PeerProfile::new("u-3", "carol", "room-1")));
    }
}
