//! Encode/mux stage: buffered BGRA frames in, compressed video file out.
//!
//! The pipeline in [`pipeline`] only talks to the codec and container through
//! the [`VideoCodec`] and [`ContainerMuxer`] traits. The production backend
//! lives in [`ffmpeg`] behind the `ffmpeg` feature.

pub mod convert;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod guard;
pub mod pipeline;
pub mod timebase;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::EncodeError;
use crate::frame::Frame;
pub use convert::fit_bgra;
pub use guard::OutputGuard;
pub use pipeline::encode;
pub use timebase::TimeBase;

pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_BITRATE: u64 = 1_000_000;
pub const DEFAULT_GOP_SIZE: u32 = 10;
pub const DEFAULT_MAX_B_FRAMES: u32 = 1;
pub const DEFAULT_CODEC: &str = "libx264";

/// Encoder tunables that do not depend on the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub frame_rate: u32,
    pub bitrate: u64,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub codec: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            bitrate: DEFAULT_BITRATE,
            gop_size: DEFAULT_GOP_SIZE,
            max_b_frames: DEFAULT_MAX_B_FRAMES,
            codec: DEFAULT_CODEC.to_string(),
        }
    }
}

/// Everything a backend needs to open a codec and container for one encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub time_base: TimeBase,
    pub frame_rate: u32,
    pub bitrate: u64,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub codec: String,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32, settings: &EncoderSettings) -> Self {
        Self {
            width,
            height,
            time_base: TimeBase::from_frame_rate(settings.frame_rate),
            frame_rate: settings.frame_rate,
            bitrate: settings.bitrate,
            gop_size: settings.gop_size,
            max_b_frames: settings.max_b_frames,
            codec: settings.codec.clone(),
        }
    }
}

/// One compressed packet. Timestamps are in whatever time base the producer
/// says: codec time base out of [`VideoCodec`], stream time base into
/// [`ContainerMuxer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub keyframe: bool,
    pub stream_index: usize,
}

impl EncodedPacket {
    /// Rescales every timestamp field between time bases.
    pub fn rescale(&mut self, from: TimeBase, to: TimeBase) {
        self.pts = self.pts.map(|ts| from.rescale_to(ts, to));
        self.dts = self.dts.map(|ts| from.rescale_to(ts, to));
        self.duration = from.rescale_to(self.duration, to);
    }
}

/// Result of asking the codec for output.
#[derive(Debug)]
pub enum Drain {
    Packet(EncodedPacket),
    /// Nothing buffered; feed another frame.
    NeedsInput,
    /// Fully flushed after end of stream.
    EndOfStream,
}

/// An opened video encoder.
///
/// Takes captured BGRA frames; fitting them to the configured size and
/// converting to the codec's pixel format is the codec's job.
pub trait VideoCodec: Send {
    fn time_base(&self) -> TimeBase;

    /// Submits frame `pts` (its index in the recording).
    fn send_frame(&mut self, frame: &Frame, pts: i64) -> Result<(), EncodeError>;

    fn send_eof(&mut self) -> Result<(), EncodeError>;

    fn receive_packet(&mut self) -> Result<Drain, EncodeError>;
}

/// The output stream as registered in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub time_base: TimeBase,
}

/// An opened container file with one video stream.
pub trait ContainerMuxer: Send {
    fn write_header(&mut self) -> Result<(), EncodeError>;

    /// Stream descriptor. Only authoritative after `write_header`.
    fn stream(&self) -> StreamInfo;

    fn write_packet(&mut self, packet: EncodedPacket) -> Result<(), EncodeError>;

    fn write_trailer(&mut self) -> Result<(), EncodeError>;
}

/// Codec and container opened for one encode.
pub struct EncoderContext {
    pub codec: Box<dyn VideoCodec>,
    pub muxer: Box<dyn ContainerMuxer>,
}

/// Factory for per-encode contexts.
pub trait EncoderBackend: Send + Sync {
    /// Opens codec, stream and container writing to `path`.
    /// Every failure maps to [`EncodeError::EncoderInitFailed`].
    fn open(&self, config: &EncoderConfig, path: &Path) -> Result<EncoderContext, EncodeError>;
}

impl<B: EncoderBackend + ?Sized> EncoderBackend for std::sync::Arc<B> {
    fn open(&self, config: &EncoderConfig, path: &Path) -> Result<EncoderContext, EncodeError> {
        (**self).open(config, path)
    }
}

/// Outcome of a successful encode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeReport {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frames_submitted: usize,
    pub frames_skipped: usize,
    pub packets_written: usize,
    pub packets_dropped: usize,
    /// Presentation timestamp of the last written packet, stream time base.
    pub last_pts: Option<i64>,
}
