//! Fixed-cadence screen capture.
//!
//! One dedicated thread per recording pulls frames from a [`CaptureProvider`]
//! into a [`FrameBuffer`] it owns outright. The only state shared with the
//! coordinator is the [`StopSignal`]; the buffer comes back through the
//! thread's join handle, so joining is the handshake before encoding.

pub mod region;
#[cfg(feature = "desktop")]
pub mod xcap_provider;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::errors::CaptureError;
use crate::frame::{Frame, FrameBuffer};
pub use region::{to_logical, to_physical, PhysicalRect, Region};

/// Source of raw BGRA snapshots of a screen region.
///
/// Implementations must return frames sized to the logical region; the
/// encoder tolerates small deviations but never rescales.
pub trait CaptureProvider: Send + Sync {
    fn capture(&self, region: &Region) -> Result<Frame, CaptureError>;
}

impl<P: CaptureProvider + ?Sized> CaptureProvider for Arc<P> {
    fn capture(&self, region: &Region) -> Result<Frame, CaptureError> {
        (**self).capture(region)
    }
}

/// Cooperative stop flag shared between the coordinator and a capture thread.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters from one capture run.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStats {
    /// Frames appended to the buffer.
    pub frames_captured: usize,
    /// Capture calls that failed and were skipped.
    pub failed_captures: usize,
    pub elapsed: Duration,
}

impl CaptureStats {
    /// Frames per second actually achieved.
    pub fn effective_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.frames_captured as f64 / secs
    }
}

/// Interval between capture starts at `frame_rate` fps.
pub fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_secs(1) / frame_rate.max(1)
}

/// Runs the capture loop on the current thread until `stop` is signalled.
///
/// The first capture happens before the first stop check, so a run always
/// makes at least one attempt. Late iterations are not compensated: the
/// loop simply starts the next capture immediately.
pub fn run_capture_loop<P: CaptureProvider + ?Sized>(
    provider: &P,
    region: Region,
    frame_rate: u32,
    stop: &StopSignal,
) -> (FrameBuffer, CaptureStats) {
    let interval = frame_interval(frame_rate);
    let mut buffer = FrameBuffer::new();
    let mut failed_captures = 0usize;
    let started = Instant::now();

    tracing::info!(target: "capture", "[CAPTURE] Starting capture loop: region={} fps={}", region, frame_rate);

    loop {
        let iteration_start = Instant::now();

        match provider.capture(&region) {
            Ok(frame) => {
                tracing::trace!(target: "capture", "[CAPTURE] Frame {} captured ({}x{})",
                    buffer.len(), frame.width(), frame.height());
                buffer.push(frame);
            }
            Err(e) => {
                failed_captures += 1;
                tracing::warn!(target: "capture", "[CAPTURE] Capture failed, skipping frame: {}", e);
            }
        }

        let spent = iteration_start.elapsed();
        if let Some(remaining) = interval.checked_sub(spent) {
            std::thread::sleep(remaining);
        }

        if stop.is_stopped() {
            break;
        }
    }

    let stats = CaptureStats {
        frames_captured: buffer.len(),
        failed_captures,
        elapsed: started.elapsed(),
    };

    tracing::info!(target: "capture",
        "[CAPTURE] Capture loop finished: frames={} failed={} elapsed={:.2}s effective_fps={:.1} bytes={}",
        stats.frames_captured, stats.failed_captures, stats.elapsed.as_secs_f64(), stats.effective_fps(),
        buffer.total_bytes());

    (buffer, stats)
}

/// A running capture thread.
pub struct CaptureHandle {
    region: Region,
    stop: StopSignal,
    join: JoinHandle<(FrameBuffer, CaptureStats)>,
}

impl CaptureHandle {
    /// The region this thread is recording.
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn signal_stop(&self) {
        tracing::info!(target: "capture", "[CAPTURE] Signaling stop...");
        self.stop.stop();
    }

    /// Waits for the thread and takes back its frames.
    ///
    /// Does not signal stop on its own; call [`signal_stop`](Self::signal_stop) first.
    pub fn join(self) -> Result<(FrameBuffer, CaptureStats), CaptureError> {
        self.join.join().map_err(|_| {
            tracing::error!(target: "capture", "[CAPTURE] Capture thread panicked");
            CaptureError::WorkerPanicked
        })
    }

    /// Signals stop and joins.
    pub fn stop_and_join(self) -> Result<(FrameBuffer, CaptureStats), CaptureError> {
        self.signal_stop();
        self.join()
    }
}

/// Spawns the capture thread for one recording.
pub fn spawn_capture_thread<P>(
    provider: P,
    region: Region,
    frame_rate: u32,
) -> Result<CaptureHandle, CaptureError>
where
    P: CaptureProvider + 'static,
{
    let stop = StopSignal::new();
    let thread_stop = stop.clone();

    let join = std::thread::Builder::new()
        .name("regionreel-capture".to_string())
        .spawn(move || run_capture_loop(&provider, region, frame_rate, &thread_stop))
        .map_err(|e| CaptureError::CaptureFailed(format!("Failed to spawn capture thread: {}", e)))?;

    Ok(CaptureHandle { region, stop, join })
}
