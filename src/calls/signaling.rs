//! Call signaling message definitions.
//!
//! Signaling travels as JSON objects over the message transport. Every
//! message carries routing metadata (id, sender, devices, channel) next to a
//! `type` tag naming one of eight kinds and an optional `payload`:
//!
//! ```json
//! {
//!   "id": "9b0c…",
//!   "sender": { "id": "u-1", "username": "alice", "channel_id": "room-7" },
//!   "sender_device": "dev-a",
//!   "channel_id": "room-7",
//!   "type": "request",
//!   "payload": { "call_kind": "video" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::state::CallKind;
use crate::media::{IceCandidate, SessionDescription};

/// Public identity of a chat user, as exchanged in signaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Room shared by the two parties; signaling is published on it.
    pub channel_id: String,
}

impl PeerProfile {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            first_name: None,
            last_name: None,
            channel_id: channel_id.into(),
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// The local user and the device this instance runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub profile: PeerProfile,
    pub device_id: String,
}

impl LocalIdentity {
    pub fn new(profile: PeerProfile, device_id: impl Into<String>) -> Self {
        Self {
            profile,
            device_id: device_id.into(),
        }
    }

    /// Identity with a freshly generated device id.
    pub fn with_random_device(profile: PeerProfile) -> Self {
        Self::new(profile, Uuid::new_v4().to_string())
    }
}

/// Kind tag and payload of a signaling message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Signal {
    /// Caller asks the peer to start a call.
    Request { call_kind: CallKind },
    /// Callee reports that it is ringing.
    Ring,
    Accept,
    Decline,
    End,
    Offer { description: SessionDescription },
    Answer { description: SessionDescription },
    IceCandidate { candidate: IceCandidate },
}

impl Signal {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request { .. } => MessageKind::Request,
            Self::Ring => MessageKind::Ring,
            Self::Accept => MessageKind::Accept,
            Self::Decline => MessageKind::Decline,
            Self::End => MessageKind::End,
            Self::Offer { .. } => MessageKind::Offer,
            Self::Answer { .. } => MessageKind::Answer,
            Self::IceCandidate { .. } => MessageKind::IceCandidate,
        }
    }
}

/// The eight recognised signaling kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Ring,
    Accept,
    Decline,
    End,
    Offer,
    Answer,
    IceCandidate,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        Self::Request,
        Self::Ring,
        Self::Accept,
        Self::Decline,
        Self::End,
        Self::Offer,
        Self::Answer,
        Self::IceCandidate,
    ];

    /// Wire name used in the `type` key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Ring => "ring",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::End => "end",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice_candidate",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signaling message as carried by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    /// Unique per logical message; repeated deliveries share it.
    pub id: String,
    pub sender: PeerProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_device: Option<String>,
    /// Device the message is meant for, when the sender has pinned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_device: Option<String>,
    pub channel_id: String,
    #[serde(flatten)]
    pub signal: Signal,
}

impl SignalingMessage {
    /// Builds a message from the local leg to `peer` with a fresh id.
    ///
    /// The sender profile carries the peer's channel id so the receiver can
    /// answer on the same room.
    pub fn outbound(
        identity: &LocalIdentity,
        peer: &PeerProfile,
        target_device: Option<String>,
        signal: Signal,
    ) -> Self {
        let mut sender = identity.profile.clone();
        sender.channel_id = peer.channel_id.clone();
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            sender_device: Some(identity.device_id.clone()),
            target_device,
            channel_id: peer.channel_id.clone(),
            signal,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.signal.kind()
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
