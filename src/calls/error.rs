//! Call-related error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("a call session is already active")]
    SessionActive,

    #[error("no active call")]
    NoActiveCall,

    #[error("no unanswered incoming call")]
    NoIncomingCall,

    #[error("local media is not available")]
    LocalMediaUnavailable,

    #[error("missing required callback: {0}")]
    MissingCallback(&'static str),

    #[error("transport error: {0}")]
    Transport(anyhow::Error),

    #[error("media error: {0}")]
    Media(anyhow::Error),

    #[error("malformed signaling message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("call controller is not running")]
    ControllerClosed,
}
