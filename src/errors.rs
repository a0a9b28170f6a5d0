use thiserror::Error;

/// Errors from mapping a selection onto a capture region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    #[error("Region is empty ({width}x{height})")]
    Empty { width: i64, height: i64 },
    #[error("Region is too large ({width}x{height})")]
    TooLarge { width: i64, height: i64 },
    #[error("Invalid display scale factor: {0}")]
    InvalidScale(f64),
}

/// Errors from building a raw frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Errors from the screen capture side.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// A single capture call failed. The loop logs it and moves on.
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
    #[error("No monitor found at ({x}, {y})")]
    MonitorNotFound { x: i32, y: i32 },
    #[error("Capture thread panicked")]
    WorkerPanicked,
}

/// Errors from the encode/mux pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("No frames captured")]
    NoFramesCaptured,
    #[error("Invalid region size {width}x{height}")]
    InvalidRegion { width: u32, height: u32 },
    #[error("Failed to initialize video encoder: {0}")]
    EncoderInitFailed(String),
    #[error("Failed to convert frame {index}: {reason}")]
    FrameConversionFailed { index: usize, reason: String },
    #[error("Failed to write packet: {0}")]
    PacketWriteFailed(String),
    #[error("Failed to finalize output: {0}")]
    EncoderFinalizeFailed(String),
    #[error("Output file error: {0}")]
    Io(String),
}

impl EncodeError {
    /// Per-frame and per-packet failures are skipped; everything else aborts the encode.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EncodeError::FrameConversionFailed { .. } | EncodeError::PacketWriteFailed(_)
        )
    }
}

/// Top-level error type for recorder operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecorderError {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("Encoding in progress, try again when it finishes")]
    Busy,
    #[error("Recorder is not running")]
    CoordinatorStopped,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Settings error: {0}")]
    Settings(String),
    #[error("Hotkey error: {0}")]
    Hotkey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_frame_errors_are_not_fatal() {
        let conversion = EncodeError::FrameConversionFailed {
            index: 3,
            reason: "short buffer".to_string(),
        };
        assert!(!conversion.is_fatal());
        assert!(!EncodeError::PacketWriteFailed("io".to_string()).is_fatal());
    }

    #[test]
    fn test_init_errors_are_fatal() {
        assert!(EncodeError::NoFramesCaptured.is_fatal());
        assert!(EncodeError::InvalidRegion { width: 0, height: 2 }.is_fatal());
        assert!(EncodeError::EncoderInitFailed("no codec".to_string()).is_fatal());
    }

    #[test]
    fn test_recorder_error_wraps_transparently() {
        let err: RecorderError = EncodeError::NoFramesCaptured.into();
        assert_eq!(err.to_string(), "No frames captured");
    }
}
