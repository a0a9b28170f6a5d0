use std::path::Path;

use super::{
    ContainerMuxer, Drain, EncodeReport, EncoderBackend, EncoderConfig, EncoderContext,
    EncoderSettings, OutputGuard, StreamInfo, TimeBase, VideoCodec,
};
use crate::capture::Region;
use crate::errors::EncodeError;
use crate::frame::FrameBuffer;

#[derive(Debug, Default)]
struct Counters {
    frames_submitted: usize,
    frames_skipped: usize,
    packets_written: usize,
    packets_dropped: usize,
    last_pts: Option<i64>,
}

/// Why a drain round stopped.
#[derive(Debug, PartialEq, Eq)]
enum DrainStop {
    NeedsInput,
    EndOfStream,
    WriteFailed,
    ReceiveFailed,
}

fn as_init_error(e: EncodeError) -> EncodeError {
    match e {
        EncodeError::EncoderInitFailed(_) => e,
        other => EncodeError::EncoderInitFailed(other.to_string()),
    }
}

fn as_finalize_error(e: EncodeError) -> EncodeError {
    match e {
        EncodeError::EncoderFinalizeFailed(_) => e,
        other => EncodeError::EncoderFinalizeFailed(other.to_string()),
    }
}

/// Pulls packets out of the codec until it wants input, runs dry, or a
/// packet cannot be received or written. Only fatal errors are returned;
/// per-packet failures end the round and are counted.
fn drain(
    codec: &mut dyn VideoCodec,
    muxer: &mut dyn ContainerMuxer,
    codec_tb: TimeBase,
    stream: StreamInfo,
    counters: &mut Counters,
) -> Result<DrainStop, EncodeError> {
    loop {
        let mut packet = match codec.receive_packet() {
            Ok(Drain::Packet(packet)) => packet,
            Ok(Drain::NeedsInput) => return Ok(DrainStop::NeedsInput),
            Ok(Drain::EndOfStream) => return Ok(DrainStop::EndOfStream),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                counters.packets_dropped += 1;
                tracing::warn!(target: "encoder", "[ENCODER] Failed to receive packet: {}", e);
                return Ok(DrainStop::ReceiveFailed);
            }
        };

        packet.rescale(codec_tb, stream.time_base);
        packet.stream_index = stream.index;
        let pts = packet.pts;

        tracing::trace!(target: "encoder", "[ENCODER] Packet pts={:?} dts={:?} size={} key={}",
            packet.pts, packet.dts, packet.data.len(), packet.keyframe);

        match muxer.write_packet(packet) {
            Ok(()) => {
                counters.packets_written += 1;
                if let Some(pts) = pts {
                    counters.last_pts = Some(counters.last_pts.map_or(pts, |last| last.max(pts)));
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                counters.packets_dropped += 1;
                tracing::warn!(target: "encoder", "[ENCODER] Dropping packet pts={:?}: {}", pts, e);
                return Ok(DrainStop::WriteFailed);
            }
        }
    }
}

/// Encodes a recording into a video file at `output_path`.
///
/// The target resolution is the region size rounded down to even values.
/// Frame `i` gets presentation timestamp `i` in a `1/frame_rate` time base.
/// Frames or packets that fail individually are logged and skipped. Any
/// fatal error (see [`EncodeError::is_fatal`]) aborts the encode, and
/// nothing is left at `output_path` in that case.
pub fn encode<B>(
    backend: &B,
    frames: &FrameBuffer,
    region: &Region,
    output_path: &Path,
    settings: &EncoderSettings,
) -> Result<EncodeReport, EncodeError>
where
    B: EncoderBackend + ?Sized,
{
    if frames.is_empty() {
        tracing::warn!(target: "encoder", "[ENCODER] No frames captured, nothing to encode");
        return Err(EncodeError::NoFramesCaptured);
    }

    let (width, height) = region.even_size();
    if width == 0 || height == 0 {
        tracing::warn!(target: "encoder", "[ENCODER] Region {} too small to encode", region);
        return Err(EncodeError::InvalidRegion { width, height });
    }

    let config = EncoderConfig::new(width, height, settings);
    tracing::info!(target: "encoder",
        "[ENCODER] Encoding {} frames: {}x{} @ {} fps, codec={}, bitrate={}, gop={}, b_frames={}",
        frames.len(), width, height, config.frame_rate, config.codec, config.bitrate,
        config.gop_size, config.max_b_frames);

    let guard = OutputGuard::new(output_path);
    let EncoderContext { mut codec, mut muxer } = backend
        .open(&config, guard.staging_path())
        .map_err(as_init_error)
        .inspect_err(|e| tracing::error!(target: "encoder", "[ENCODER] {}", e))?;

    muxer
        .write_header()
        .map_err(as_init_error)
        .inspect_err(|e| tracing::error!(target: "encoder", "[ENCODER] Failed to write header: {}", e))?;

    // containers may pick their own time base during the header write
    let stream = muxer.stream();
    let codec_tb = codec.time_base();
    tracing::debug!(target: "encoder", "[ENCODER] codec time base {}, stream #{} time base {}",
        codec_tb, stream.index, stream.time_base);
    if !codec_tb.is_valid() || !stream.time_base.is_valid() {
        let e = EncodeError::EncoderInitFailed(format!(
            "Invalid time base: codec {}, stream {}",
            codec_tb, stream.time_base
        ));
        tracing::error!(target: "encoder", "[ENCODER] {}", e);
        return Err(e);
    }

    let mut counters = Counters::default();

    for (index, frame) in frames.iter().enumerate() {
        match codec.send_frame(frame, index as i64) {
            Ok(()) => counters.frames_submitted += 1,
            Err(e) if e.is_fatal() => {
                tracing::error!(target: "encoder", "[ENCODER] Aborting at frame {}: {}", index, e);
                return Err(e);
            }
            Err(e) => {
                counters.frames_skipped += 1;
                tracing::warn!(target: "encoder", "[ENCODER] Skipping frame {}: {}", index, e);
                continue;
            }
        }

        drain(&mut *codec, &mut *muxer, codec_tb, stream, &mut counters)
            .inspect_err(|e| tracing::error!(target: "encoder", "[ENCODER] {}", e))?;
    }

    tracing::debug!(target: "encoder", "[ENCODER] Flushing encoder...");
    match codec.send_eof() {
        Ok(()) => loop {
            match drain(&mut *codec, &mut *muxer, codec_tb, stream, &mut counters) {
                Ok(DrainStop::WriteFailed) => continue,
                Ok(_) => break,
                Err(e) => {
                    tracing::error!(target: "encoder", "[ENCODER] Flush failed: {}", e);
                    return Err(e);
                }
            }
        },
        Err(e) => {
            tracing::warn!(target: "encoder", "[ENCODER] Failed to flush encoder: {}", e);
        }
    }

    muxer
        .write_trailer()
        .map_err(as_finalize_error)
        .inspect_err(|e| tracing::error!(target: "encoder", "[ENCODER] Failed to write trailer: {}", e))?;

    // codec (with its conversion context) before the container
    drop(codec);
    drop(muxer);

    let output_path = guard.commit()?;

    let report = EncodeReport {
        output_path,
        width,
        height,
        frames_submitted: counters.frames_submitted,
        frames_skipped: counters.frames_skipped,
        packets_written: counters.packets_written,
        packets_dropped: counters.packets_dropped,
        last_pts: counters.last_pts,
    };

    tracing::info!(target: "encoder",
        "[ENCODER] Saved {:?}: frames={} skipped={} packets={} dropped={}",
        report.output_path, report.frames_submitted, report.frames_skipped,
        report.packets_written, report.packets_dropped);

    Ok(report)
}
