//! Host notifications emitted by a [`SegmentationSession`](super::SegmentationSession).

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::ErrorKind;
use crate::types::MaskOutput;

/// Error report handed to [`SessionEvents::on_error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Terminal errors leave the session unusable until a new image is encoded.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Callbacks a host registers to follow session progress.
///
/// Every method has a no-op default. Callbacks run on whichever task
/// completed the work and are never invoked while session state is locked,
/// so they may call back into the session's accessors.
pub trait SessionEvents: Send + Sync {
    fn on_encoder_ready(&self) {}

    fn on_decoder_ready(&self) {}

    /// A decode finished and its mask is now the current one.
    fn on_mask_updated(&self, _mask: &MaskOutput) {}

    fn on_error(&self, _error: &SessionError) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl SessionEvents for NoopEvents {}

/// One callback, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    EncoderReady,
    DecoderReady,
    MaskUpdated(MaskOutput),
    Error(SessionError),
}

/// Forwards every callback into a tokio channel.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl SessionEvents for ChannelEvents {
    fn on_encoder_ready(&self) {
        self.send(SessionEvent::EncoderReady);
    }

    fn on_decoder_ready(&self) {
        self.send(SessionEvent::DecoderReady);
    }

    fn on_mask_updated(&self, mask: &MaskOutput) {
        self.send(SessionEvent::MaskUpdated(mask.clone()));
    }

    fn on_error(&self, error: &SessionError) {
        self.send(SessionEvent::Error(error.clone()));
    }
}
