//! The progress channel: ordered, push-based status delivery for one request.

use counterpoint_common::{ProgressEvent, Stage, StageStatus};
use tokio::sync::mpsc;

/// Publisher side of a request's progress stream.
///
/// Attached mode wraps an unbounded sender (events are delivered in emit
/// order, never reordered or dropped while the receiver lives); detached mode
/// backs the synchronous `submit` path where nobody subscribes. Emits are
/// best-effort once the subscriber is gone — `is_closed()` is the
/// cancellation probe the orchestrator consults before starting a stage.
pub struct ProgressChannel {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressChannel {
    pub fn attached(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Create a connected channel pair.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::attached(tx), rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // Send failure means the subscriber disconnected; the next
            // cancellation check aborts the run.
            let _ = tx.send(event);
        }
    }

    pub fn started(&self, stage: Stage, message: impl Into<String>) {
        self.emit(ProgressEvent::started(stage, message));
    }

    pub fn completed(
        &self,
        stage: Stage,
        message: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) {
        self.emit(ProgressEvent::completed(stage, message, payload));
    }

    pub fn error(&self, stage: Stage, message: impl Into<String>, payload: Option<serde_json::Value>) {
        self.emit(ProgressEvent::error(stage, message, payload));
    }

    /// True when the subscriber is gone. Detached channels never close.
    pub fn is_closed(&self) -> bool {
        match &self.tx {
            Some(tx) => tx.is_closed(),
            None => false,
        }
    }
}
