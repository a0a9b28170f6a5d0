//! RecordingCoordinator - single owner actor for the recording session.
//!
//! The coordinator owns the session state, the capture thread handle and the
//! encode worker, and processes every command and worker event through the
//! pure state machine in [`super::state`].
//!
//! Architecture:
//! - The hotkey bridge and callers send Commands via [`CoordinatorHandle`]
//! - The selection UI replies through a [`SelectionReply`]
//! - The encode worker sends WorkerEvents back via `blocking_send`
//! - The coordinator executes SideEffects and reports through [`Feedback`]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Local;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::output::next_output_path;
use super::state::{transition, Notification, RecordingEvent, SessionPhase, SessionState, SideEffect};
use super::{Feedback, SelectionOutcome, SelectionReply, SelectionResult, SelectionUi};
use crate::capture::region::{to_logical, PhysicalRect};
use crate::capture::{spawn_capture_thread, CaptureHandle, CaptureProvider, Region};
use crate::encoder::{encode, EncodeReport, EncoderBackend, EncoderSettings};
use crate::errors::RecorderError;

/// Commands sent from callers to the coordinator.
#[derive(Debug)]
pub enum Command {
    Toggle {
        response_tx: oneshot::Sender<Result<SessionPhase, RecorderError>>,
    },
    ConfirmRegion {
        rect: PhysicalRect,
        scale: f64,
    },
    CancelSelection,
    Status {
        response_tx: oneshot::Sender<RecordingStatus>,
    },
}

/// Events sent from the encode worker to the coordinator.
#[derive(Debug)]
enum WorkerEvent {
    CaptureStopped { frame_count: usize },
    EncodeFinished { report: EncodeReport },
    EncodeFailed { error: RecorderError },
}

/// Recording status snapshot for the indicator and status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub state: SessionPhase,
    pub elapsed_seconds: f64,
    pub region: Option<Region>,
    pub frame_count: Option<usize>,
    pub last_error: Option<String>,
}

impl RecordingStatus {
    fn unavailable(reason: &str) -> Self {
        Self {
            state: SessionPhase::Idle,
            elapsed_seconds: 0.0,
            region: None,
            frame_count: None,
            last_error: Some(reason.to_string()),
        }
    }
}

/// Per-session settings the coordinator hands to its workers.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub encoder: EncoderSettings,
    pub output_dir: PathBuf,
}

/// Collaborators the coordinator drives.
pub struct Collaborators {
    pub provider: Arc<dyn CaptureProvider>,
    pub backend: Arc<dyn EncoderBackend>,
    pub selection: Arc<dyn SelectionUi>,
    pub feedback: Arc<dyn Feedback>,
}

pub struct RecordingCoordinator {
    state: SessionState,
    config: CoordinatorConfig,
    collaborators: Collaborators,
    capture: Option<CaptureHandle>,
    encode_worker: Option<JoinHandle<()>>,
    selection_generation: u64,
    last_error: Option<String>,
    command_rx: mpsc::Receiver<Command>,
    selection_rx: mpsc::UnboundedReceiver<SelectionResult>,
    selection_tx: mpsc::UnboundedSender<SelectionResult>,
    event_rx: mpsc::Receiver<WorkerEvent>,
    event_tx: mpsc::Sender<WorkerEvent>,
}

impl RecordingCoordinator {
    pub fn new(config: CoordinatorConfig, collaborators: Collaborators) -> (Self, mpsc::Sender<Command>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (selection_tx, selection_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(16);

        let coordinator = Self {
            state: SessionState::Idle,
            config,
            collaborators,
            capture: None,
            encode_worker: None,
            selection_generation: 0,
            last_error: None,
            command_rx,
            selection_rx,
            selection_tx,
            event_rx,
            event_tx,
        };

        (coordinator, command_tx)
    }

    /// Creates a coordinator, spawns its event loop on the current tokio
    /// runtime and returns a handle plus the loop's task.
    pub fn spawn(
        config: CoordinatorConfig,
        collaborators: Collaborators,
    ) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
        let (coordinator, command_tx) = Self::new(config, collaborators);
        let task = tokio::spawn(coordinator.run());
        (CoordinatorHandle::new(command_tx), task)
    }

    /// Main event loop. Runs until every [`CoordinatorHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!(target: "session", "[COORDINATOR] Starting event loop");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        tracing::info!(target: "session", "[COORDINATOR] All handles dropped, shutting down");
                        break;
                    }
                },
                Some(result) = self.selection_rx.recv() => {
                    self.handle_selection(result);
                }
                Some(event) = self.event_rx.recv() => {
                    self.handle_worker_event(event);
                }
            }
        }

        self.shutdown().await;
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Toggle { response_tx } => {
                let result = if matches!(self.state, SessionState::Encoding { .. }) {
                    Err(RecorderError::Busy)
                } else {
                    Ok(())
                };
                self.process(RecordingEvent::ToggleRequested);
                let _ = response_tx.send(result.map(|()| self.state.phase()));
            }
            Command::ConfirmRegion { rect, scale } => {
                let generation = self.selection_generation;
                self.handle_selection(SelectionResult {
                    generation,
                    outcome: SelectionOutcome::Confirmed { rect, scale },
                });
            }
            Command::CancelSelection => {
                let generation = self.selection_generation;
                self.handle_selection(SelectionResult {
                    generation,
                    outcome: SelectionOutcome::Cancelled,
                });
            }
            Command::Status { response_tx } => {
                let _ = response_tx.send(self.build_status(&self.state));
            }
        }
    }

    fn handle_selection(&mut self, result: SelectionResult) {
        if result.generation != self.selection_generation || self.state != SessionState::Selecting {
            tracing::debug!(target: "session", "[COORDINATOR] Ignoring stale selection reply: {:?}", result.outcome);
            return;
        }

        let event = match result.outcome {
            SelectionOutcome::Confirmed { rect, scale } => match to_logical(rect, scale) {
                Ok(region) => {
                    tracing::info!(target: "session", "[COORDINATOR] Region confirmed: {:?} @ {} -> {}", rect, scale, region);
                    RecordingEvent::RegionConfirmed { region }
                }
                Err(error) => {
                    tracing::warn!(target: "session", "[COORDINATOR] Rejected selection {:?} @ {}: {}", rect, scale, error);
                    RecordingEvent::RegionRejected { error }
                }
            },
            SelectionOutcome::Cancelled => {
                tracing::info!(target: "session", "[COORDINATOR] Selection cancelled");
                RecordingEvent::SelectionCancelled
            }
        };

        self.process(event);
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        let recording_event = match event {
            WorkerEvent::CaptureStopped { frame_count } => RecordingEvent::CaptureStopped { frame_count },
            WorkerEvent::EncodeFinished { report } => {
                self.reap_encode_worker();
                RecordingEvent::EncodeFinished { report }
            }
            WorkerEvent::EncodeFailed { error } => {
                self.reap_encode_worker();
                RecordingEvent::EncodeFailed { error }
            }
        };

        self.process(recording_event);
    }

    /// Runs `event` through the state machine. Effects that fail feed a
    /// follow-up event, which is processed after the current effects finish.
    fn process(&mut self, event: RecordingEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let (new_state, effects) = transition(self.state.clone(), event);
            self.state = new_state;

            for effect in effects {
                if let Some(follow_up) = self.execute_effect(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn execute_effect(&mut self, effect: SideEffect) -> Option<RecordingEvent> {
        match effect {
            SideEffect::ShowSelection => {
                self.show_selection();
                None
            }
            SideEffect::StartCapture { region } => self.start_capture(region),
            SideEffect::StopCaptureAndEncode => self.stop_capture_and_encode(),
            SideEffect::EmitStateChange { state } => {
                let status = self.build_status(&state);
                tracing::debug!(target: "session", "[COORDINATOR] Emitting state change: {:?}", status);
                self.collaborators.feedback.state_changed(&status);
                None
            }
            SideEffect::Notify { notification } => {
                self.notify(notification);
                None
            }
        }
    }

    fn show_selection(&mut self) {
        self.selection_generation += 1;
        let reply = SelectionReply::new(self.selection_generation, self.selection_tx.clone());
        tracing::info!(target: "session", "[COORDINATOR] Showing selection UI (#{})", self.selection_generation);
        self.collaborators.selection.begin(reply);
    }

    fn start_capture(&mut self, region: Region) -> Option<RecordingEvent> {
        let provider = Arc::clone(&self.collaborators.provider);
        match spawn_capture_thread(provider, region, self.config.encoder.frame_rate) {
            Ok(handle) => {
                self.capture = Some(handle);
                tracing::info!(target: "session", "[COORDINATOR] Recording started: {}", region);
                None
            }
            Err(e) => {
                tracing::error!(target: "session", "[COORDINATOR] Failed to start capture: {}", e);
                Some(RecordingEvent::CaptureFailed { error: e.into() })
            }
        }
    }

    fn stop_capture_and_encode(&mut self) -> Option<RecordingEvent> {
        let Some(capture) = self.capture.take() else {
            tracing::error!(target: "session", "[COORDINATOR] No capture thread to stop");
            return Some(RecordingEvent::EncodeFailed {
                error: RecorderError::CoordinatorStopped,
            });
        };
        capture.signal_stop();
        let region = capture.region();

        let backend = Arc::clone(&self.collaborators.backend);
        let settings = self.config.encoder.clone();
        let output_dir = self.config.output_dir.clone();
        let event_tx = self.event_tx.clone();

        let spawned = std::thread::Builder::new()
            .name("regionreel-encode".to_string())
            .spawn(move || {
                run_encode_worker(capture, region, output_dir, backend.as_ref(), &settings, &event_tx)
            });

        match spawned {
            Ok(handle) => {
                self.encode_worker = Some(handle);
                None
            }
            Err(e) => {
                tracing::error!(target: "session", "[COORDINATOR] Failed to spawn encode worker: {}", e);
                Some(RecordingEvent::EncodeFailed {
                    error: RecorderError::Storage(format!("Failed to spawn encode worker: {}", e)),
                })
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if notification.is_error() {
            self.last_error = Some(notification.to_string());
        } else if matches!(notification, Notification::Saved { .. }) {
            self.last_error = None;
        }
        tracing::info!(target: "session", "[COORDINATOR] Notify: {}: {}", notification.title(), notification);
        self.collaborators.feedback.notify(&notification);
    }

    /// The worker has reported its last event but may still be unwinding;
    /// join it off the event loop.
    fn reap_encode_worker(&mut self) {
        if let Some(handle) = self.encode_worker.take() {
            tokio::task::spawn_blocking(move || {
                if handle.join().is_err() {
                    tracing::error!(target: "session", "[COORDINATOR] Encode worker panicked");
                }
            });
        }
    }

    fn build_status(&self, state: &SessionState) -> RecordingStatus {
        let frame_count = match state {
            SessionState::Encoding { frame_count, .. } if *frame_count > 0 => Some(*frame_count),
            _ => None,
        };

        RecordingStatus {
            state: state.phase(),
            elapsed_seconds: state.elapsed().map_or(0.0, |d| d.as_secs_f64()),
            region: state.region(),
            frame_count,
            last_error: self.last_error.clone(),
        }
    }

    /// Stops any running capture and waits for the encode so the file is finalised.
    async fn shutdown(&mut self) {
        tracing::info!(target: "session", "[COORDINATOR] Cleaning up resources...");

        if matches!(self.state, SessionState::Recording { .. }) {
            self.process(RecordingEvent::ToggleRequested);
        }

        if let Some(handle) = self.encode_worker.take() {
            tracing::debug!(target: "session", "[COORDINATOR] Waiting for encode worker...");
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => {}
                _ => tracing::error!(target: "session", "[COORDINATOR] Encode worker panicked"),
            }
        }

        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_worker_event(event);
        }

        tracing::info!(target: "session", "[COORDINATOR] Cleanup complete");
    }
}

/// Body of the encode worker thread: join capture, pick an output path,
/// encode, report back.
fn run_encode_worker(
    capture: CaptureHandle,
    region: Region,
    output_dir: PathBuf,
    backend: &dyn EncoderBackend,
    settings: &EncoderSettings,
    event_tx: &mpsc::Sender<WorkerEvent>,
) {
    let send = |event: WorkerEvent| {
        if event_tx.blocking_send(event).is_err() {
            tracing::warn!(target: "session", "[ENCODE WORKER] Coordinator gone, dropping event");
        }
    };

    let (frames, stats) = match capture.join() {
        Ok(result) => result,
        Err(e) => {
            send(WorkerEvent::EncodeFailed { error: e.into() });
            return;
        }
    };
    tracing::info!(target: "session", "[ENCODE WORKER] Capture joined: {} frames ({} failed) in {:.2}s",
        stats.frames_captured, stats.failed_captures, stats.elapsed.as_secs_f64());
    send(WorkerEvent::CaptureStopped {
        frame_count: frames.len(),
    });

    let output_path = match next_output_path(&output_dir, &Local::now()) {
        Ok(path) => path,
        Err(error) => {
            send(WorkerEvent::EncodeFailed { error });
            return;
        }
    };

    match encode(backend, &frames, &region, &output_path, settings) {
        Ok(report) => send(WorkerEvent::EncodeFinished { report }),
        Err(e) => send(WorkerEvent::EncodeFailed { error: e.into() }),
    }
}

/// Handle to send commands to the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub fn new(command_tx: mpsc::Sender<Command>) -> Self {
        Self { command_tx }
    }

    /// Advances the session: start selecting, or stop and encode.
    /// Returns the phase after the toggle, or `Busy` while encoding.
    pub async fn toggle(&self) -> Result<SessionPhase, RecorderError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Toggle { response_tx })
            .await
            .map_err(|_| RecorderError::CoordinatorStopped)?;

        response_rx.await.map_err(|_| RecorderError::CoordinatorStopped)?
    }

    /// Delivers a selection outside the [`SelectionReply`] path.
    pub async fn confirm_region(&self, rect: PhysicalRect, scale: f64) -> Result<(), RecorderError> {
        self.command_tx
            .send(Command::ConfirmRegion { rect, scale })
            .await
            .map_err(|_| RecorderError::CoordinatorStopped)
    }

    pub async fn cancel_selection(&self) -> Result<(), RecorderError> {
        self.command_tx
            .send(Command::CancelSelection)
            .await
            .map_err(|_| RecorderError::CoordinatorStopped)
    }

    pub async fn status(&self) -> RecordingStatus {
        let (response_tx, response_rx) = oneshot::channel();

        if self
            .command_tx
            .send(Command::Status { response_tx })
            .await
            .is_err()
        {
            return RecordingStatus::unavailable("Coordinator not running");
        }

        response_rx
            .await
            .unwrap_or_else(|_| RecordingStatus::unavailable("Coordinator not responding"))
    }

    /// Blocking toggle for non-async callers such as the hotkey thread.
    pub fn blocking_toggle(&self) -> Result<SessionPhase, RecorderError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .blocking_send(Command::Toggle { response_tx })
            .map_err(|_| RecorderError::CoordinatorStopped)?;

        response_rx
            .blocking_recv()
            .map_err(|_| RecorderError::CoordinatorStopped)?
    }
}
