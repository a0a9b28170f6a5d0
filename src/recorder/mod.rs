pub mod coordinator;
pub mod output;
pub mod state;

use tokio::sync::mpsc;

use crate::capture::PhysicalRect;
pub use coordinator::{
    Collaborators, CoordinatorConfig, CoordinatorHandle, RecordingCoordinator, RecordingStatus,
};
pub use state::{Notification, SessionPhase, SessionState};

/// What the selection UI reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOutcome {
    /// Drag finished. `scale` is the display scale factor of the monitor
    /// the drag ended on, queried at that moment.
    Confirmed { rect: PhysicalRect, scale: f64 },
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct SelectionResult {
    pub generation: u64,
    pub outcome: SelectionOutcome,
}

/// One-shot reply handle given to the selection UI.
///
/// Dropping it without replying counts as a cancel, so a UI that goes away
/// never leaves the recorder stuck in `Selecting`.
#[derive(Debug)]
pub struct SelectionReply {
    generation: u64,
    tx: Option<mpsc::UnboundedSender<SelectionResult>>,
}

impl SelectionReply {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SelectionResult>) -> Self {
        Self {
            generation,
            tx: Some(tx),
        }
    }

    pub fn confirm(mut self, rect: PhysicalRect, scale: f64) {
        self.send(SelectionOutcome::Confirmed { rect, scale });
    }

    pub fn cancel(mut self) {
        self.send(SelectionOutcome::Cancelled);
    }

    fn send(&mut self, outcome: SelectionOutcome) {
        let Some(tx) = self.tx.take() else { return };
        let result = SelectionResult {
            generation: self.generation,
            outcome,
        };
        if tx.send(result).is_err() {
            tracing::debug!(target: "session", "[SELECTION] Coordinator gone, dropping selection reply");
        }
    }
}

impl Drop for SelectionReply {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.send(SelectionOutcome::Cancelled);
        }
    }
}

/// The region selection overlay.
pub trait SelectionUi: Send + Sync {
    /// Shows the overlay. Called on the coordinator's event loop, so it
    /// must return promptly; reply through `reply` whenever the user is done.
    fn begin(&self, reply: SelectionReply);
}

/// Recording indicator and user notifications.
pub trait Feedback: Send + Sync {
    fn state_changed(&self, status: &RecordingStatus);

    fn notify(&self, notification: &Notification);
}
