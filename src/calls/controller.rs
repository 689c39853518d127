//! Single-consumer event loop driving the call state machine.
//!
//! Commands from [`CallHandle`], inbound signaling, timer ticks and media
//! completions all travel through one unbounded queue and are applied one at
//! a time by [`CallController::run`].

use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::callbacks::CallCallbacks;
use super::error::CallError;
use super::manager::CallSessionMachine;
use super::ringer::Ringtone;
use super::signaling::{LocalIdentity, PeerProfile, SignalingMessage};
use super::state::{CallKind, Session};
use super::timer::TimerTick;
use crate::config::CallConfig;
use crate::media::{MediaCapability, MediaStream, PeerEvent, SessionDescription};
use crate::transport::{MessageHandler, MessageTransport};

pub(crate) enum CallEvent {
    StartCall {
        peer: PeerProfile,
        kind: CallKind,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    AcceptCall {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    DeclineCall {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    EndCall {
        self_initiated: bool,
        reply: oneshot::Sender<()>,
    },
    ToggleAudio {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    ToggleVideo {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    Initialize {
        callbacks: CallCallbacks,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Session>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    Inbound {
        message: Box<SignalingMessage>,
        reply: Option<oneshot::Sender<()>>,
    },
    Tick(TimerTick),
    LocalMedia {
        epoch: u64,
        result: Result<Arc<dyn MediaStream>, anyhow::Error>,
    },
    LocalDescription {
        epoch: u64,
        generation: u64,
        result: Result<SessionDescription, anyhow::Error>,
    },
    Peer {
        epoch: u64,
        generation: u64,
        event: PeerEvent,
    },
}

/// Owns the state machine and its event queue until [`CallHandle::shutdown`].
pub struct CallController {
    machine: CallSessionMachine,
    transport: Arc<dyn MessageTransport>,
    topic: String,
    sender: mpsc::UnboundedSender<CallEvent>,
    receiver: mpsc::UnboundedReceiver<CallEvent>,
}

impl CallController {
    pub fn new(
        identity: LocalIdentity,
        config: CallConfig,
        transport: Arc<dyn MessageTransport>,
        media: Arc<dyn MediaCapability>,
        ringtone: Arc<dyn Ringtone>,
        callbacks: CallCallbacks,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let topic = config.subscribe_topic.clone();
        let machine = CallSessionMachine::new(
            identity,
            config,
            transport.clone(),
            media,
            ringtone,
            callbacks,
            sender.clone(),
        );
        Self {
            machine,
            transport,
            topic,
            sender,
            receiver,
        }
    }

    pub fn handle(&self) -> CallHandle {
        CallHandle {
            events: self.sender.clone(),
        }
    }

    /// Runs the controller on the current tokio runtime.
    pub fn spawn(self) -> (CallHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Subscribes to signaling and processes events until shutdown.
    pub async fn run(mut self) {
        let inbound = self.sender.clone();
        let handler: MessageHandler = Arc::new(move |value: Value| {
            match SignalingMessage::from_value(value) {
                Ok(message) => {
                    let _ = inbound.send(CallEvent::Inbound {
                        message: Box::new(message),
                        reply: None,
                    });
                }
                Err(e) => {
                    debug!(target: "Call/Controller", "Ignoring undecodable signaling frame: {e}");
                }
            }
        });
        let subscription = self.transport.subscribe(&self.topic, handler);
        info!(target: "Call/Controller", "Listening for call signaling on '{}'", self.topic);

        while let Some(event) = self.receiver.recv().await {
            let shutdown = matches!(event, CallEvent::Shutdown { .. });
            self.machine.dispatch(event).await;
            if shutdown {
                break;
            }
        }

        self.transport.unsubscribe(&self.topic, &subscription);
        info!(target: "Call/Controller", "Call controller stopped");
    }
}

/// Cloneable front end of a running [`CallController`].
#[derive(Clone)]
pub struct CallHandle {
    events: mpsc::UnboundedSender<CallEvent>,
}

impl CallHandle {
    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> CallEvent,
    ) -> Result<T, CallError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(event(reply))
            .map_err(|_| CallError::ControllerClosed)?;
        response.await.map_err(|_| CallError::ControllerClosed)
    }

    /// Replaces the registered UI callbacks.
    pub async fn initialize(&self, callbacks: CallCallbacks) -> Result<(), CallError> {
        self.request(|reply| CallEvent::Initialize { callbacks, reply })
            .await
    }

    pub async fn start_call(&self, peer: PeerProfile, kind: CallKind) -> Result<(), CallError> {
        self.request(|reply| CallEvent::StartCall { peer, kind, reply })
            .await?
    }

    pub async fn accept_call(&self) -> Result<(), CallError> {
        self.request(|reply| CallEvent::AcceptCall { reply }).await?
    }

    pub async fn decline_call(&self) -> Result<(), CallError> {
        self.request(|reply| CallEvent::DeclineCall { reply }).await?
    }

    pub async fn end_call(&self, self_initiated: bool) -> Result<(), CallError> {
        self.request(|reply| CallEvent::EndCall {
            self_initiated,
            reply,
        })
        .await
    }

    /// Flips the audio mute flag and returns the new value.
    pub async fn toggle_audio(&self) -> Result<bool, CallError> {
        self.request(|reply| CallEvent::ToggleAudio { reply }).await?
    }

    /// Flips the video mute flag and returns the new value.
    pub async fn toggle_video(&self) -> Result<bool, CallError> {
        self.request(|reply| CallEvent::ToggleVideo { reply }).await?
    }

    /// Feeds a signaling message and waits until it has been processed.
    pub async fn handle_signaling_message(&self, message: SignalingMessage) -> Result<(), CallError> {
        self.request(|reply| CallEvent::Inbound {
            message: Box::new(message),
            reply: Some(reply),
        })
        .await
    }

    /// Like [`handle_signaling_message`](Self::handle_signaling_message) for
    /// a raw transport frame.
    pub async fn handle_signaling_value(&self, value: Value) -> Result<(), CallError> {
        let message = SignalingMessage::from_value(value)?;
        self.handle_signaling_message(message).await
    }

    /// Copy of the current session once all earlier events were processed.
    pub async fn snapshot(&self) -> Result<Session, CallError> {
        self.request(|reply| CallEvent::Snapshot { reply }).await
    }

    /// Ends any call without notifying the peer and stops the controller.
    pub async fn shutdown(&self) -> Result<(), CallError> {
        self.request(|reply| CallEvent::Shutdown { reply }).await
    }
}
