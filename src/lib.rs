// Call signaling and session state machine
pub mod calls;
pub mod config;
pub mod media;
pub mod transport;

#[cfg(test)]
pub mod test_utils;

pub use calls::{
    CallCallbacks, CallController, CallError, CallHandle, CallKind, CallNotice, CallStatus,
    LocalIdentity, PeerProfile, Ringtone, RingerKind, Session, SignalingMessage,
};
pub use config::CallConfig;
pub use media::{MediaCapability, MediaStream, MediaTrack, PeerConnection, PeerEventSink};
pub use transport::{BrokerConfig, MessageTransport, WebSocketBroker};
