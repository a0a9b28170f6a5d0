//! Pure state machine for the recording session.
//!
//! `(State, Event) -> (NewState, Vec<SideEffect>)`
//!
//! Invalid transitions return the current state with empty effects. The
//! function never performs I/O; the coordinator executes the effects.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::capture::Region;
use crate::encoder::EncodeReport;
use crate::errors::{RecorderError, RegionError};

/// Recording session state.
///
/// Each variant carries only the data relevant to that state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Nothing in progress.
    #[default]
    Idle,

    /// Waiting for the user to drag out a region.
    Selecting,

    /// Capture thread running.
    Recording { started_at: Instant, region: Region },

    /// Capture stopped, encode worker running.
    Encoding {
        started_at: Instant,
        /// Frames handed to the encoder; 0 until the capture thread is joined.
        frame_count: usize,
    },
}

/// Serializable name of a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Selecting,
    Recording,
    Encoding,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Selecting => "selecting",
            SessionPhase::Recording => "recording",
            SessionPhase::Encoding => "encoding",
        };
        f.write_str(name)
    }
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Selecting => SessionPhase::Selecting,
            SessionState::Recording { .. } => SessionPhase::Recording,
            SessionState::Encoding { .. } => SessionPhase::Encoding,
        }
    }

    /// Time spent in the current recording or encoding phase.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            SessionState::Recording { started_at, .. } | SessionState::Encoding { started_at, .. } => {
                Some(started_at.elapsed())
            }
            _ => None,
        }
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            SessionState::Recording { region, .. } => Some(*region),
            _ => None,
        }
    }
}

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    Saved { path: PathBuf, frames: usize },
    EncodeFailed { error: String },
    CaptureFailed { error: String },
    InvalidRegion { error: String },
    Busy,
}

impl Notification {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notification::Saved { .. } | Notification::Busy)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notification::Saved { .. } => "Recording saved",
            Notification::EncodeFailed { .. } => "Encoding failed",
            Notification::CaptureFailed { .. } => "Recording failed",
            Notification::InvalidRegion { .. } => "Invalid selection",
            Notification::Busy => "Still encoding",
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::Saved { path, frames } => {
                write!(f, "Saved {} frames to {}", frames, path.display())
            }
            Notification::EncodeFailed { error }
            | Notification::CaptureFailed { error }
            | Notification::InvalidRegion { error } => f.write_str(error),
            Notification::Busy => f.write_str("Encoding in progress, try again when it finishes"),
        }
    }
}

/// Events that can trigger state transitions.
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// The toggle hotkey was pressed.
    ToggleRequested,

    /// The selection UI delivered a region that mapped cleanly.
    RegionConfirmed { region: Region },

    /// The selection UI delivered a rectangle that maps to nothing usable.
    RegionRejected { error: RegionError },

    /// The user dismissed the selection UI.
    SelectionCancelled,

    /// The capture thread could not be started.
    CaptureFailed { error: RecorderError },

    /// The encode worker joined the capture thread.
    CaptureStopped { frame_count: usize },

    EncodeFinished { report: EncodeReport },

    EncodeFailed { error: RecorderError },
}

/// Side effects triggered by state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Hand a reply handle to the selection UI.
    ShowSelection,

    /// Spawn the capture thread for `region`.
    StartCapture { region: Region },

    /// Signal the capture thread and start the encode worker.
    StopCaptureAndEncode,

    /// Push a status snapshot to the recording indicator.
    EmitStateChange { state: SessionState },

    Notify { notification: Notification },
}

fn emit(state: &SessionState) -> SideEffect {
    SideEffect::EmitStateChange {
        state: state.clone(),
    }
}

/// Pure state transition function.
pub fn transition(state: SessionState, event: RecordingEvent) -> (SessionState, Vec<SideEffect>) {
    match (&state, event) {
        // Idle + Toggle -> Selecting
        (SessionState::Idle, RecordingEvent::ToggleRequested) => {
            let new_state = SessionState::Selecting;
            let effects = vec![SideEffect::ShowSelection, emit(&new_state)];
            (new_state, effects)
        }

        // Selecting + Toggle -> Selecting (selection UI already up)
        (SessionState::Selecting, RecordingEvent::ToggleRequested) => (state, vec![]),

        // Selecting + RegionConfirmed -> Recording
        (SessionState::Selecting, RecordingEvent::RegionConfirmed { region }) => {
            let new_state = SessionState::Recording {
                started_at: Instant::now(),
                region,
            };
            let effects = vec![SideEffect::StartCapture { region }, emit(&new_state)];
            (new_state, effects)
        }

        // Selecting + RegionRejected -> Idle
        (SessionState::Selecting, RecordingEvent::RegionRejected { error }) => {
            let new_state = SessionState::Idle;
            let effects = vec![
                emit(&new_state),
                SideEffect::Notify {
                    notification: Notification::InvalidRegion {
                        error: error.to_string(),
                    },
                },
            ];
            (new_state, effects)
        }

        // Selecting + Cancelled -> Idle
        (SessionState::Selecting, RecordingEvent::SelectionCancelled) => {
            let new_state = SessionState::Idle;
            let effects = vec![emit(&new_state)];
            (new_state, effects)
        }

        // Recording + CaptureFailed -> Idle
        (SessionState::Recording { .. }, RecordingEvent::CaptureFailed { error }) => {
            let new_state = SessionState::Idle;
            let effects = vec![
                emit(&new_state),
                SideEffect::Notify {
                    notification: Notification::CaptureFailed {
                        error: error.to_string(),
                    },
                },
            ];
            (new_state, effects)
        }

        // Recording + Toggle -> Encoding
        (SessionState::Recording { .. }, RecordingEvent::ToggleRequested) => {
            let new_state = SessionState::Encoding {
                started_at: Instant::now(),
                frame_count: 0,
            };
            let effects = vec![SideEffect::StopCaptureAndEncode, emit(&new_state)];
            (new_state, effects)
        }

        // Encoding + Toggle -> Encoding (rejected)
        (SessionState::Encoding { .. }, RecordingEvent::ToggleRequested) => (
            state,
            vec![SideEffect::Notify {
                notification: Notification::Busy,
            }],
        ),

        // Encoding + CaptureStopped -> Encoding (frame count known)
        (SessionState::Encoding { started_at, .. }, RecordingEvent::CaptureStopped { frame_count }) => {
            let new_state = SessionState::Encoding {
                started_at: *started_at,
                frame_count,
            };
            let effects = vec![emit(&new_state)];
            (new_state, effects)
        }

        // Encoding + EncodeFinished -> Idle
        (SessionState::Encoding { .. }, RecordingEvent::EncodeFinished { report }) => {
            let new_state = SessionState::Idle;
            let effects = vec![
                emit(&new_state),
                SideEffect::Notify {
                    notification: Notification::Saved {
                        path: report.output_path,
                        frames: report.frames_submitted,
                    },
                },
            ];
            (new_state, effects)
        }

        // Encoding + EncodeFailed -> Idle
        (SessionState::Encoding { .. }, RecordingEvent::EncodeFailed { error }) => {
            let new_state = SessionState::Idle;
            let effects = vec![
                emit(&new_state),
                SideEffect::Notify {
                    notification: Notification::EncodeFailed {
                        error: error.to_string(),
                    },
                },
            ];
            (new_state, effects)
        }

        // Invalid transition: return current state with no effects
        _ => (state, vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EncodeError;

    fn region() -> Region {
        Region::new(100, 100, 400, 300).unwrap()
    }

    fn recording() -> SessionState {
        SessionState::Recording {
            started_at: Instant::now(),
            region: region(),
        }
    }

    fn encoding() -> SessionState {
        SessionState::Encoding {
            started_at: Instant::now(),
            frame_count: 0,
        }
    }

    fn report() -> EncodeReport {
        EncodeReport {
            output_path: PathBuf::from("/tmp/recording.mp4"),
            width: 300,
            height: 200,
            frames_submitted: 60,
            frames_skipped: 0,
            packets_written: 60,
            packets_dropped: 0,
            last_pts: Some(59),
        }
    }

    #[test]
    fn test_idle_to_selecting() {
        let (new_state, effects) = transition(SessionState::Idle, RecordingEvent::ToggleRequested);

        assert_eq!(new_state, SessionState::Selecting);
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[0], SideEffect::ShowSelection));
        assert!(matches!(effects[1], SideEffect::EmitStateChange { .. }));
    }

    #[test]
    fn test_toggle_while_selecting_is_noop() {
        let (new_state, effects) = transition(SessionState::Selecting, RecordingEvent::ToggleRequested);

        assert_eq!(new_state, SessionState::Selecting);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_selecting_to_recording() {
        let (new_state, effects) = transition(
            SessionState::Selecting,
            RecordingEvent::RegionConfirmed { region: region() },
        );

        assert!(matches!(new_state, SessionState::Recording { region: r, .. } if r == region()));
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], SideEffect::StartCapture { region: region() });
    }

    #[test]
    fn test_cancel_selection_returns_to_idle() {
        let (new_state, effects) = transition(SessionState::Selecting, RecordingEvent::SelectionCancelled);

        assert_eq!(new_state, SessionState::Idle);
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], SideEffect::EmitStateChange { .. }));
    }

    #[test]
    fn test_rejected_region_notifies() {
        let error = RegionError::Empty { width: 0, height: 5 };
        let (new_state, effects) = transition(SessionState::Selecting, RecordingEvent::RegionRejected { error });

        assert_eq!(new_state, SessionState::Idle);
        assert!(effects.iter().any(|e| matches!(
            e,
            SideEffect::Notify {
                notification: Notification::InvalidRegion { .. }
            }
        )));
    }

    #[test]
    fn test_recording_to_encoding() {
        let (new_state, effects) = transition(recording(), RecordingEvent::ToggleRequested);

        assert!(matches!(new_state, SessionState::Encoding { frame_count: 0, .. }));
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[0], SideEffect::StopCaptureAndEncode));
    }

    #[test]
    fn test_toggle_while_encoding_is_rejected() {
        let state = encoding();
        let (new_state, effects) = transition(state.clone(), RecordingEvent::ToggleRequested);

        assert_eq!(new_state, state);
        assert_eq!(
            effects,
            vec![SideEffect::Notify {
                notification: Notification::Busy
            }]
        );
    }

    #[test]
    fn test_capture_stopped_records_frame_count() {
        let (new_state, _) = transition(encoding(), RecordingEvent::CaptureStopped { frame_count: 61 });

        match new_state {
            SessionState::Encoding { frame_count, .. } => assert_eq!(frame_count, 61),
            _ => panic!("Expected Encoding state"),
        }
    }

    #[test]
    fn test_encoding_to_idle_on_finish() {
        let (new_state, effects) = transition(encoding(), RecordingEvent::EncodeFinished { report: report() });

        assert_eq!(new_state, SessionState::Idle);
        assert!(effects.iter().any(|e| matches!(
            e,
            SideEffect::Notify {
                notification: Notification::Saved { frames: 60, .. }
            }
        )));
    }

    #[test]
    fn test_encoding_to_idle_on_failure() {
        let error = RecorderError::Encode(EncodeError::NoFramesCaptured);
        let (new_state, effects) = transition(encoding(), RecordingEvent::EncodeFailed { error });

        assert_eq!(new_state, SessionState::Idle);
        let notification = effects.iter().find_map(|e| match e {
            SideEffect::Notify { notification } => Some(notification.clone()),
            _ => None,
        });
        assert_eq!(
            notification,
            Some(Notification::EncodeFailed {
                error: "No frames captured".to_string()
            })
        );
    }

    #[test]
    fn test_capture_start_failure_returns_to_idle() {
        let error = RecorderError::Capture(crate::errors::CaptureError::WorkerPanicked);
        let (new_state, effects) = transition(recording(), RecordingEvent::CaptureFailed { error });

        assert_eq!(new_state, SessionState::Idle);
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_invalid_transitions_are_noops() {
        let cases = vec![
            (SessionState::Idle, RecordingEvent::SelectionCancelled),
            (SessionState::Idle, RecordingEvent::RegionConfirmed { region: region() }),
            (recording(), RecordingEvent::SelectionCancelled),
            (recording(), RecordingEvent::RegionConfirmed { region: region() }),
            (SessionState::Idle, RecordingEvent::EncodeFinished { report: report() }),
            (SessionState::Selecting, RecordingEvent::CaptureStopped { frame_count: 3 }),
        ];

        for (state, event) in cases {
            let (new_state, effects) = transition(state.clone(), event);
            assert_eq!(new_state, state);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(SessionState::Idle.phase().to_string(), "idle");
        assert_eq!(recording().phase(), SessionPhase::Recording);
        assert!(recording().region().is_some());
        assert!(encoding().elapsed().is_some());
        assert!(SessionState::Selecting.elapsed().is_none());
    }
}
