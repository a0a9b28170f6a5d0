//! Integration tests for the encode pipeline.
//!
//! The codec and container are replaced with in-memory fakes so the tests
//! cover frame submission, timestamp handling, draining and flushing, and
//! staging-file cleanup without linking libav.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use regionreel_lib::capture::Region;
use regionreel_lib::encoder::{
    encode, ContainerMuxer, Drain, EncodedPacket, EncoderBackend, EncoderConfig, EncoderContext,
    EncoderSettings, StreamInfo, TimeBase, VideoCodec,
};
use regionreel_lib::errors::EncodeError;
use regionreel_lib::frame::{Frame, FrameBuffer};

const STREAM_TIME_BASE: TimeBase = TimeBase { num: 1, den: 15360 };

/// What the fake container saw.
#[derive(Debug, Default)]
struct MuxLog {
    opened_size: Option<(u32, u32)>,
    header_written: bool,
    trailer_written: bool,
    packets: Vec<EncodedPacket>,
    frames_sent: usize,
}

#[derive(Debug, Default, Clone)]
struct Faults {
    fail_open: bool,
    fail_trailer: bool,
    /// 1-based write attempt that fails.
    fail_write_attempt: Option<usize>,
    /// 0-based frame index the codec rejects.
    reject_frame: Option<i64>,
    /// 0-based frame index at which the output file goes away.
    lose_output_at: Option<i64>,
}

fn check_frame(faults: &Faults, pts: i64) -> Result<(), EncodeError> {
    if faults.reject_frame == Some(pts) {
        return Err(EncodeError::FrameConversionFailed {
            index: pts as usize,
            reason: "rejected".to_string(),
        });
    }
    if faults.lose_output_at == Some(pts) {
        return Err(EncodeError::Io("output device removed".to_string()));
    }
    Ok(())
}

/// Codec that holds one frame back, like an encoder with lookahead.
struct DelayingCodec {
    time_base: TimeBase,
    pending: VecDeque<i64>,
    held: Option<i64>,
    eof: bool,
    faults: Faults,
    log: Arc<Mutex<MuxLog>>,
}

impl DelayingCodec {
    fn packet(&self, pts: i64) -> EncodedPacket {
        EncodedPacket {
            data: vec![0u8; 16],
            pts: Some(pts),
            dts: Some(pts),
            duration: 1,
            keyframe: pts == 0,
            stream_index: 0,
        }
    }
}

impl VideoCodec for DelayingCodec {
    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn send_frame(&mut self, _frame: &Frame, pts: i64) -> Result<(), EncodeError> {
        check_frame(&self.faults, pts)?;
        self.log.lock().unwrap().frames_sent += 1;
        if let Some(previous) = self.held.replace(pts) {
            self.pending.push_back(previous);
        }
        Ok(())
    }

    fn send_eof(&mut self) -> Result<(), EncodeError> {
        if let Some(held) = self.held.take() {
            self.pending.push_back(held);
        }
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Drain, EncodeError> {
        match self.pending.pop_front() {
            Some(pts) => Ok(Drain::Packet(self.packet(pts))),
            None if self.eof => Ok(Drain::EndOfStream),
            None => Ok(Drain::NeedsInput),
        }
    }
}

/// Codec that emits frames out of presentation order, like an encoder
/// using B-frames: every second frame is held until the one after it has
/// been emitted. Decode timestamps count packets in output order.
struct ReorderingCodec {
    time_base: TimeBase,
    pending: VecDeque<i64>,
    held: Option<i64>,
    next_dts: i64,
    eof: bool,
    faults: Faults,
    log: Arc<Mutex<MuxLog>>,
}

impl VideoCodec for ReorderingCodec {
    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn send_frame(&mut self, _frame: &Frame, pts: i64) -> Result<(), EncodeError> {
        check_frame(&self.faults, pts)?;
        self.log.lock().unwrap().frames_sent += 1;
        if pts == 0 {
            self.pending.push_back(pts);
        } else if let Some(b_frame) = self.held.take() {
            self.pending.push_back(pts);
            self.pending.push_back(b_frame);
        } else {
            self.held = Some(pts);
        }
        Ok(())
    }

    fn send_eof(&mut self) -> Result<(), EncodeError> {
        if let Some(held) = self.held.take() {
            self.pending.push_back(held);
        }
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Drain, EncodeError> {
        match self.pending.pop_front() {
            Some(pts) => {
                let dts = self.next_dts;
                self.next_dts += 1;
                Ok(Drain::Packet(EncodedPacket {
                    data: vec![0u8; 16],
                    pts: Some(pts),
                    dts: Some(dts),
                    duration: 1,
                    keyframe: pts == 0,
                    stream_index: 0,
                }))
            }
            None if self.eof => Ok(Drain::EndOfStream),
            None => Ok(Drain::NeedsInput),
        }
    }
}

struct MemoryMuxer {
    path: PathBuf,
    write_attempts: usize,
    faults: Faults,
    log: Arc<Mutex<MuxLog>>,
}

impl ContainerMuxer for MemoryMuxer {
    fn write_header(&mut self) -> Result<(), EncodeError> {
        std::fs::write(&self.path, b"header").map_err(|e| EncodeError::Io(e.to_string()))?;
        self.log.lock().unwrap().header_written = true;
        Ok(())
    }

    fn stream(&self) -> StreamInfo {
        StreamInfo {
            index: 0,
            time_base: STREAM_TIME_BASE,
        }
    }

    fn write_packet(&mut self, packet: EncodedPacket) -> Result<(), EncodeError> {
        self.write_attempts += 1;
        if self.faults.fail_write_attempt == Some(self.write_attempts) {
            return Err(EncodeError::PacketWriteFailed("disk hiccup".to_string()));
        }
        self.log.lock().unwrap().packets.push(packet);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), EncodeError> {
        if self.faults.fail_trailer {
            return Err(EncodeError::Io("trailer".to_string()));
        }
        self.log.lock().unwrap().trailer_written = true;
        Ok(())
    }
}

#[derive(Default)]
struct FakeBackend {
    faults: Faults,
    reorder: bool,
    log: Arc<Mutex<MuxLog>>,
}

impl FakeBackend {
    fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    fn reordering() -> Self {
        Self {
            reorder: true,
            ..Self::default()
        }
    }
}

impl EncoderBackend for FakeBackend {
    fn open(&self, config: &EncoderConfig, path: &Path) -> Result<EncoderContext, EncodeError> {
        if self.faults.fail_open {
            return Err(EncodeError::Io("no such codec".to_string()));
        }
        self.log.lock().unwrap().opened_size = Some((config.width, config.height));

        let codec: Box<dyn VideoCodec> = if self.reorder {
            Box::new(ReorderingCodec {
                time_base: config.time_base,
                pending: VecDeque::new(),
                held: None,
                next_dts: 0,
                eof: false,
                faults: self.faults.clone(),
                log: self.log.clone(),
            })
        } else {
            Box::new(DelayingCodec {
                time_base: config.time_base,
                pending: VecDeque::new(),
                held: None,
                eof: false,
                faults: self.faults.clone(),
                log: self.log.clone(),
            })
        };

        Ok(EncoderContext {
            codec,
            muxer: Box::new(MemoryMuxer {
                path: path.to_path_buf(),
                write_attempts: 0,
                faults: self.faults.clone(),
                log: self.log.clone(),
            }),
        })
    }
}

/// Helper to build `count` solid frames of the given size.
fn frames(count: usize, width: u32, height: u32) -> FrameBuffer {
    (0..count)
        .map(|i| Frame::solid(width, height, [i as u8, 0x40, 0x80, 0xFF]))
        .collect()
}

fn region(width: i32, height: i32) -> Region {
    Region::new(0, 0, width, height).unwrap()
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files
}

// =============================================================================
// Successful encodes
// =============================================================================

#[test]
fn test_encode_writes_every_frame_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::default();

    let report = encode(&backend, &frames(10, 64, 48), &region(64, 48), &output, &EncoderSettings::default())
        .unwrap();

    assert_eq!(report.output_path, output);
    assert_eq!(report.frames_submitted, 10);
    assert_eq!(report.frames_skipped, 0);
    assert_eq!(report.packets_written, 10);
    assert_eq!(report.packets_dropped, 0);
    assert_eq!(files_in(dir.path()), vec![output]);

    let log = backend.log.lock().unwrap();
    assert!(log.header_written);
    assert!(log.trailer_written);
    assert_eq!(log.frames_sent, 10);
}

#[test]
fn test_encode_rescales_timestamps_to_stream_time_base() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::default();

    let report = encode(&backend, &frames(5, 32, 32), &region(32, 32), &output, &EncoderSettings::default())
        .unwrap();

    // 1/30 -> 1/15360 is 512 ticks per frame
    let log = backend.log.lock().unwrap();
    let pts: Vec<i64> = log.packets.iter().map(|p| p.pts.unwrap()).collect();
    assert_eq!(pts, vec![0, 512, 1024, 1536, 2048]);
    assert!(log.packets.iter().all(|p| p.duration == 512));
    assert!(log.packets[0].keyframe);
    assert_eq!(report.last_pts, Some(2048));
}

#[test]
fn test_encode_timestamps_strictly_increase() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::default();
    let settings = EncoderSettings {
        frame_rate: 24,
        ..EncoderSettings::default()
    };

    encode(&backend, &frames(30, 16, 16), &region(16, 16), &output, &settings).unwrap();

    let log = backend.log.lock().unwrap();
    assert_eq!(log.packets.len(), 30);
    for pair in log.packets.windows(2) {
        assert!(pair[0].pts < pair[1].pts, "pts must increase: {:?}", pair);
        assert!(pair[0].dts < pair[1].dts, "dts must increase: {:?}", pair);
    }
}

#[test]
fn test_encode_flush_emits_held_frame() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("one.mp4");
    let backend = FakeBackend::default();

    // the codec holds the only frame back until end of stream
    let report = encode(&backend, &frames(1, 16, 16), &region(16, 16), &output, &EncoderSettings::default())
        .unwrap();

    assert_eq!(report.packets_written, 1);
    assert_eq!(report.last_pts, Some(0));
}

#[test]
fn test_encode_rounds_odd_region_down_to_even() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("odd.mp4");
    let backend = FakeBackend::default();

    let report = encode(&backend, &frames(3, 641, 481), &region(641, 481), &output, &EncoderSettings::default())
        .unwrap();

    assert_eq!((report.width, report.height), (640, 480));
    assert_eq!(backend.log.lock().unwrap().opened_size, Some((640, 480)));
    assert_eq!(report.frames_skipped, 0);
}

#[test]
fn test_encode_reordered_packets_keep_decode_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bframes.mp4");
    let backend = FakeBackend::reordering();
    let count = 5i64;

    let report = encode(&backend, &frames(count as usize, 32, 32), &region(32, 32), &output, &EncoderSettings::default())
        .unwrap();

    let log = backend.log.lock().unwrap();
    let pts: Vec<i64> = log.packets.iter().map(|p| p.pts.unwrap()).collect();
    let dts: Vec<i64> = log.packets.iter().map(|p| p.dts.unwrap()).collect();

    // 1/30 -> 1/15360 is 512 ticks per frame
    assert_eq!(pts, vec![0, 1024, 512, 2048, 1536]);
    assert_eq!(dts, vec![0, 512, 1024, 1536, 2048]);
    assert!(pts.windows(2).any(|pair| pair[0] > pair[1]), "no reordering happened");

    let mut sorted = pts.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..count).map(|i| i * 512).collect::<Vec<_>>());

    // the last written packet is not the last frame, but the report is
    assert_eq!(*pts.last().unwrap(), (count - 2) * 512);
    assert_eq!(report.last_pts, Some((count - 1) * 512));
    assert_eq!(report.packets_written, count as usize);
}

#[test]
fn test_encode_reordered_held_frame_is_flushed() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bframes.mp4");
    let backend = FakeBackend::reordering();

    // frame 1 is still held as a B-frame when the stream ends
    let report = encode(&backend, &frames(2, 16, 16), &region(16, 16), &output, &EncoderSettings::default())
        .unwrap();

    let log = backend.log.lock().unwrap();
    let pts: Vec<i64> = log.packets.iter().map(|p| p.pts.unwrap()).collect();
    assert_eq!(pts, vec![0, 512]);
    assert_eq!(report.last_pts, Some(512));
    assert!(log.trailer_written);
}

// =============================================================================
// Per-frame and per-packet failures
// =============================================================================

#[test]
fn test_encode_skips_rejected_frame() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::with_faults(Faults {
        reject_frame: Some(2),
        ..Faults::default()
    });

    let report = encode(&backend, &frames(5, 16, 16), &region(16, 16), &output, &EncoderSettings::default())
        .unwrap();

    assert_eq!(report.frames_submitted, 4);
    assert_eq!(report.frames_skipped, 1);
    assert_eq!(report.packets_written, 4);

    let log = backend.log.lock().unwrap();
    let pts: Vec<i64> = log.packets.iter().map(|p| p.pts.unwrap()).collect();
    assert_eq!(pts, vec![0, 512, 1536, 2048]);
}

#[test]
fn test_encode_drops_packet_that_fails_to_write() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::with_faults(Faults {
        fail_write_attempt: Some(2),
        ..Faults::default()
    });

    let report = encode(&backend, &frames(6, 16, 16), &region(16, 16), &output, &EncoderSettings::default())
        .unwrap();

    assert_eq!(report.packets_written, 5);
    assert_eq!(report.packets_dropped, 1);
    assert!(output.exists());
}

#[test]
fn test_encode_write_failure_during_flush_keeps_draining() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    // three frames: two packets during the loop, the third is the flush
    let backend = FakeBackend::with_faults(Faults {
        fail_write_attempt: Some(3),
        ..Faults::default()
    });

    let report = encode(&backend, &frames(3, 16, 16), &region(16, 16), &output, &EncoderSettings::default())
        .unwrap();

    assert_eq!(report.packets_written, 2);
    assert_eq!(report.packets_dropped, 1);
    assert!(backend.log.lock().unwrap().trailer_written);
}

// =============================================================================
// Aborted encodes
// =============================================================================

#[test]
fn test_encode_without_frames_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.mp4");
    let backend = FakeBackend::default();

    let result = encode(&backend, &FrameBuffer::new(), &region(64, 64), &output, &EncoderSettings::default());

    assert_eq!(result, Err(EncodeError::NoFramesCaptured));
    assert!(backend.log.lock().unwrap().opened_size.is_none());
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_encode_one_pixel_region_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("tiny.mp4");
    let backend = FakeBackend::default();

    let result = encode(&backend, &frames(2, 1, 1), &region(1, 1), &output, &EncoderSettings::default());

    assert_eq!(result, Err(EncodeError::InvalidRegion { width: 0, height: 0 }));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_encode_open_failure_maps_to_init_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::with_faults(Faults {
        fail_open: true,
        ..Faults::default()
    });

    let result = encode(&backend, &frames(2, 16, 16), &region(16, 16), &output, &EncoderSettings::default());

    assert!(matches!(result, Err(EncodeError::EncoderInitFailed(_))));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_encode_trailer_failure_removes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::with_faults(Faults {
        fail_trailer: true,
        ..Faults::default()
    });

    let result = encode(&backend, &frames(4, 16, 16), &region(16, 16), &output, &EncoderSettings::default());

    assert!(matches!(result, Err(EncodeError::EncoderFinalizeFailed(_))));
    assert!(!output.exists());
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_encode_fatal_frame_error_aborts_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::with_faults(Faults {
        lose_output_at: Some(2),
        ..Faults::default()
    });

    let result = encode(&backend, &frames(5, 16, 16), &region(16, 16), &output, &EncoderSettings::default());

    assert!(matches!(result, Err(EncodeError::Io(_))));
    let log = backend.log.lock().unwrap();
    assert_eq!(log.frames_sent, 2);
    assert!(!log.trailer_written);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_encode_zero_frame_rate_is_rejected_before_any_frame() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let backend = FakeBackend::default();
    let settings = EncoderSettings {
        frame_rate: 0,
        ..EncoderSettings::default()
    };

    let result = encode(&backend, &frames(3, 16, 16), &region(16, 16), &output, &settings);

    assert!(matches!(result, Err(EncodeError::EncoderInitFailed(_))));
    assert_eq!(backend.log.lock().unwrap().frames_sent, 0);
    assert!(files_in(dir.path()).is_empty());
}
