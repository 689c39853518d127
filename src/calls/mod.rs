//! Call signaling and session management for peer-to-peer calls.
//!
//! Both legs of a call run the same code; whether a leg is the caller or the
//! callee follows from the message flow.
//!
//! # Architecture
//!
//! - [`SignalingMessage`]: the eight signaling kinds exchanged over the
//!   message transport
//! - [`Session`]: state of the single active call
//! - `CallSessionMachine`: reacts to signaling, commands, timer ticks and
//!   media events
//! - [`CallController`] & [`CallHandle`]: serialize everything through one
//!   event queue
//! - [`CallCallbacks`]: the UI surface, validated for completeness on build
//!
//! # Call flow
//!
//! ```text
//! caller                      callee
//!   request ───────────────────▶  (incoming ringer)
//!           ◀─────────────────── ring
//!   (outgoing ringer)
//!           ◀─────────────────── accept   (user picked up)
//!   offer  ───────────────────▶
//!           ◀─────────────────── answer
//!   ice_candidate ◀──────────▶ ice_candidate
//!   end    ◀──────────────────▶ end
//! ```

mod call_timer;
mod callbacks;
mod controller;
mod dedup;
mod error;
mod manager;
mod no_answer;
mod ringer;
mod signaling;
mod state;
mod timer;


pub use call_timer::CallTimer;
pub use callbacks::{CallCallbacks, CallCallbacksBuilder, CallNotice};
pub use controller::{CallController, CallHandle};
pub use dedup::DedupLedger;
pub use error::CallError;
pub use no_answer::{ExpiryAction, NoAnswerStep, NoAnswerTimer, TickAction};
pub use ringer::{RingerKind, RingerScheduler, Ringtone};
pub use signaling::{LocalIdentity, MessageKind, PeerProfile, Signal, SignalingMessage};
pub use state::{CallKind, CallStatus, ConnectionState, NegotiationState, Role, Session};
pub use timer::{TickPoster, TimerHandle, TimerRole, TimerTick};
