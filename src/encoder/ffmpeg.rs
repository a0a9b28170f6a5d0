//! libav-backed codec and container via `ffmpeg-next`.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::codec::packet::Flags as PacketFlags;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::{codec, encoder, format, frame, Packet, Rational};

use super::{
    fit_bgra, ContainerMuxer, Drain, EncodedPacket, EncoderBackend, EncoderConfig,
    EncoderContext, StreamInfo, TimeBase, VideoCodec,
};
use crate::errors::EncodeError;
use crate::frame::Frame;

/// Opened libav video encoder.
struct SendEncoder(encoder::video::Encoder);
// SAFETY: the encoder is owned by one encode worker and never shared.
unsafe impl Send for SendEncoder {}

/// Opened libav output context.
struct SendOutput(format::context::Output);
// SAFETY: the output context is owned by one encode worker and never shared.
unsafe impl Send for SendOutput {}

/// BGRA to YUV 4:2:0 conversion context.
struct SendScaler(scaling::Context);
// SAFETY: the scaler is owned by one encode worker and never shared.
unsafe impl Send for SendScaler {}

struct SendPicture(frame::Video);
// SAFETY: the frame is owned by one encode worker and never shared.
unsafe impl Send for SendPicture {}

fn init_error(what: &str, e: ffmpeg::Error) -> EncodeError {
    tracing::error!(target: "encoder", "[FFMPEG] {}: {}", what, e);
    EncodeError::EncoderInitFailed(format!("{}: {}", what, e))
}

fn rational(tb: TimeBase) -> Rational {
    Rational::new(tb.num, tb.den)
}

fn time_base(r: Rational) -> TimeBase {
    TimeBase::new(r.numerator(), r.denominator())
}

/// H.264 in a container guessed from the output extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Result<Self, EncodeError> {
        ffmpeg::init().map_err(|e| init_error("FFmpeg init", e))?;
        Ok(Self)
    }

    fn find_codec(name: &str) -> Result<codec::Codec, EncodeError> {
        if let Some(codec) = encoder::find_by_name(name) {
            return Ok(codec);
        }
        tracing::warn!(target: "encoder", "[FFMPEG] Encoder '{}' not available, falling back to default H.264", name);
        encoder::find(codec::Id::H264)
            .ok_or_else(|| EncodeError::EncoderInitFailed(format!("No encoder for '{}' or H.264", name)))
    }
}

impl EncoderBackend for FfmpegBackend {
    fn open(&self, config: &EncoderConfig, path: &Path) -> Result<EncoderContext, EncodeError> {
        let mut octx = format::output(&path).map_err(|e| init_error("Failed to allocate output context", e))?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let codec = Self::find_codec(&config.codec)?;
        tracing::info!(target: "encoder", "[FFMPEG] Using encoder '{}' for {:?}", codec.name(), path);

        let mut ost = octx
            .add_stream(codec)
            .map_err(|e| init_error("Failed to allocate stream", e))?;
        let stream_index = ost.index();

        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| init_error("Failed to allocate codec context", e))?;

        let codec_tb = config.time_base;
        video.set_width(config.width);
        video.set_height(config.height);
        video.set_format(Pixel::YUV420P);
        video.set_time_base(rational(codec_tb));
        video.set_frame_rate(Some(Rational::new(config.frame_rate as i32, 1)));
        video.set_bit_rate(config.bitrate as usize);
        video.set_gop(config.gop_size);
        video.set_max_b_frames(config.max_b_frames as usize);
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let opened = video
            .open_as(codec)
            .map_err(|e| init_error("Failed to open codec", e))?;
        ost.set_parameters(&opened);
        ost.set_time_base(rational(codec_tb));
        drop(ost);

        let scaler = scaling::Context::get(
            Pixel::BGRA,
            config.width,
            config.height,
            Pixel::YUV420P,
            config.width,
            config.height,
            scaling::Flags::BICUBIC,
        )
        .map_err(|e| init_error("Failed to create conversion context", e))?;

        Ok(EncoderContext {
            codec: Box::new(FfmpegCodec {
                encoder: SendEncoder(opened),
                scaler: SendScaler(scaler),
                bgra: SendPicture(frame::Video::new(Pixel::BGRA, config.width, config.height)),
                yuv: SendPicture(frame::Video::new(Pixel::YUV420P, config.width, config.height)),
                width: config.width,
                height: config.height,
                time_base: codec_tb,
            }),
            muxer: Box::new(FfmpegMuxer {
                octx: SendOutput(octx),
                stream: StreamInfo {
                    index: stream_index,
                    time_base: codec_tb,
                },
            }),
        })
    }
}

// fields drop in order: the codec context goes before the conversion context
struct FfmpegCodec {
    encoder: SendEncoder,
    scaler: SendScaler,
    bgra: SendPicture,
    yuv: SendPicture,
    width: u32,
    height: u32,
    time_base: TimeBase,
}

impl VideoCodec for FfmpegCodec {
    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn send_frame(&mut self, frame: &Frame, pts: i64) -> Result<(), EncodeError> {
        let index = pts as usize;
        let stride = self.bgra.0.stride(0);
        fit_bgra(index, frame, self.bgra.0.data_mut(0), stride, self.width, self.height)?;

        self.scaler
            .0
            .run(&self.bgra.0, &mut self.yuv.0)
            .map_err(|e| EncodeError::FrameConversionFailed {
                index,
                reason: format!("sws_scale: {}", e),
            })?;

        self.yuv.0.set_pts(Some(pts));
        self.encoder
            .0
            .send_frame(&self.yuv.0)
            .map_err(|e| EncodeError::FrameConversionFailed {
                index,
                reason: format!("send_frame: {}", e),
            })
    }

    fn send_eof(&mut self) -> Result<(), EncodeError> {
        self.encoder
            .0
            .send_eof()
            .map_err(|e| EncodeError::EncoderFinalizeFailed(format!("send_eof: {}", e)))
    }

    fn receive_packet(&mut self) -> Result<Drain, EncodeError> {
        let mut packet = Packet::empty();
        match self.encoder.0.receive_packet(&mut packet) {
            Ok(()) => Ok(Drain::Packet(EncodedPacket {
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                pts: packet.pts(),
                dts: packet.dts(),
                duration: packet.duration(),
                keyframe: packet.is_key(),
                stream_index: 0,
            })),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(Drain::NeedsInput),
            Err(ffmpeg::Error::Eof) => Ok(Drain::EndOfStream),
            Err(e) => Err(EncodeError::PacketWriteFailed(format!("receive_packet: {}", e))),
        }
    }
}

struct FfmpegMuxer {
    octx: SendOutput,
    stream: StreamInfo,
}

impl ContainerMuxer for FfmpegMuxer {
    fn write_header(&mut self) -> Result<(), EncodeError> {
        self.octx
            .0
            .write_header()
            .map_err(|e| init_error("Failed to write header", e))?;

        if let Some(stream) = self.octx.0.stream(self.stream.index) {
            self.stream.time_base = time_base(stream.time_base());
        }
        Ok(())
    }

    fn stream(&self) -> StreamInfo {
        self.stream
    }

    fn write_packet(&mut self, packet: EncodedPacket) -> Result<(), EncodeError> {
        let mut out = Packet::copy(&packet.data);
        out.set_pts(packet.pts);
        out.set_dts(packet.dts);
        out.set_duration(packet.duration);
        out.set_stream(packet.stream_index);
        if packet.keyframe {
            out.set_flags(PacketFlags::KEY);
        }
        out.write_interleaved(&mut self.octx.0)
            .map_err(|e| EncodeError::PacketWriteFailed(e.to_string()))
    }

    fn write_trailer(&mut self) -> Result<(), EncodeError> {
        self.octx
            .0
            .write_trailer()
            .map_err(|e| EncodeError::EncoderFinalizeFailed(e.to_string()))
    }
}
