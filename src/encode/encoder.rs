use image::RgbaImage;

use crate::encode::ffmpeg::{FfmpegH264Encoder, is_ffmpeg_on_path};
use crate::encode::mp4::{Mp4Muxer, MuxerConfig};
use crate::encode::png_codec::PngEncoder;
use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};
use crate::foundation::math::mul_div255_u8;
use crate::video::interpolate::FrameConsumer;

/// Default target bitrate in bits per second.
pub const DEFAULT_BITRATE: u32 = 5_000_000;

/// Output codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecProfile {
    /// H.264 Main profile through the system `ffmpeg` (libx264).
    #[default]
    H264Main,
    /// Built-in intra codec: every sample is a PNG image.
    Png,
}

impl CodecProfile {
    /// Sample entry fourcc written into `stsd`.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            CodecProfile::H264Main => *b"avc1",
            CodecProfile::Png => *b"png ",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CodecProfile::H264Main => "h264-main",
            CodecProfile::Png => "png",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub codec: CodecProfile,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// Bits per second; ignored by lossless codecs.
    pub bitrate: u32,
}

impl EncoderConfig {
    pub fn new(codec: CodecProfile, width: u32, height: u32, fps: Fps) -> Self {
        Self {
            codec,
            width,
            height,
            fps,
            bitrate: DEFAULT_BITRATE,
        }
    }

    pub fn validate(&self) -> HyperResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(HyperError::validation("fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(HyperError::validation("encoder width/height must be non-zero"));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(HyperError::validation(format!(
                "encoder size {}x{} exceeds the container limit",
                self.width, self.height
            )));
        }
        if self.codec == CodecProfile::H264Main {
            if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
                return Err(HyperError::validation(
                    "h264 width/height must be even (required for yuv420p)",
                ));
            }
            if self.bitrate == 0 {
                return Err(HyperError::validation("h264 bitrate must be non-zero"));
            }
        }
        Ok(())
    }
}

/// One encoded sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub timestamp_us: u64,
    pub duration_us: u64,
    pub is_key: bool,
}

/// Side data attached to a chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Codec-specific decoder configuration record (`avcC` payload for H.264).
    pub decoder_config: Option<Vec<u8>>,
}

/// Receiver for encoder output.
pub trait ChunkSink {
    fn push_chunk(&mut self, chunk: EncodedChunk, meta: Option<ChunkMetadata>) -> HyperResult<()>;
}

impl ChunkSink for Vec<EncodedChunk> {
    fn push_chunk(&mut self, chunk: EncodedChunk, _meta: Option<ChunkMetadata>) -> HyperResult<()> {
        self.push(chunk);
        Ok(())
    }
}

/// Streaming encoder contract.
///
/// Frames arrive opaque, in presentation order. Chunks may be emitted during `encode` or held
/// until `flush`.
pub trait VideoEncoder {
    fn encode(
        &mut self,
        frame: &RgbaImage,
        timestamp_us: u64,
        sink: &mut dyn ChunkSink,
    ) -> HyperResult<()>;

    /// Emit everything still buffered. Called once after the last frame.
    fn flush(&mut self, sink: &mut dyn ChunkSink) -> HyperResult<()>;
}

/// `true` when `codec` can be used on this host.
pub fn is_available(codec: CodecProfile) -> bool {
    match codec {
        CodecProfile::H264Main => is_ffmpeg_on_path(),
        CodecProfile::Png => true,
    }
}

/// Create an encoder for `cfg`.
pub fn open_encoder(cfg: &EncoderConfig) -> HyperResult<Box<dyn VideoEncoder>> {
    cfg.validate()?;
    match cfg.codec {
        CodecProfile::H264Main => Ok(Box::new(FfmpegH264Encoder::spawn(cfg)?)),
        CodecProfile::Png => Ok(Box::new(PngEncoder::new(cfg))),
    }
}

/// Encoder plus muxer fed frame by frame; produces MP4 bytes on [`finish`](Self::finish).
pub struct EncodeSession {
    cfg: EncoderConfig,
    encoder: Box<dyn VideoEncoder>,
    muxer: Mp4Muxer,
    scratch: RgbaImage,
    next_index: u64,
}

impl std::fmt::Debug for EncodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeSession")
            .field("cfg", &self.cfg)
            .field("frames", &self.next_index)
            .finish()
    }
}

impl EncodeSession {
    pub fn new(cfg: EncoderConfig) -> HyperResult<Self> {
        let encoder = open_encoder(&cfg)?;
        let muxer = Mp4Muxer::new(MuxerConfig {
            codec: cfg.codec,
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
        });
        Ok(Self {
            cfg,
            encoder,
            muxer,
            scratch: RgbaImage::new(cfg.width, cfg.height),
            next_index: 0,
        })
    }

    pub fn frames_pushed(&self) -> u64 {
        self.next_index
    }

    /// Flush the encoder and assemble the container.
    pub fn finish(mut self) -> HyperResult<Vec<u8>> {
        self.encoder.flush(&mut self.muxer)?;
        tracing::debug!(
            codec = self.cfg.codec.label(),
            frames = self.next_index,
            chunks = self.muxer.chunk_count(),
            "encoder flushed"
        );
        self.muxer.finish()
    }
}

impl FrameConsumer for EncodeSession {
    fn push_frame(&mut self, frame: &RgbaImage) -> HyperResult<()> {
        if frame.dimensions() != (self.cfg.width, self.cfg.height) {
            return Err(HyperError::validation(format!(
                "frame size mismatch: got {:?}, expected {}x{}",
                frame.dimensions(),
                self.cfg.width,
                self.cfg.height
            )));
        }
        flatten_over_black(&mut self.scratch, frame);
        let ts = self.cfg.fps.frame_timestamp_us(self.next_index);
        self.encoder.encode(&self.scratch, ts, &mut self.muxer)?;
        self.next_index += 1;
        Ok(())
    }
}

/// Encode a whole frame list: frame `i` is stamped `i / fps`.
pub fn encode_frames(frames: &[RgbaImage], cfg: EncoderConfig) -> HyperResult<Vec<u8>> {
    let mut session = EncodeSession::new(cfg)?;
    for frame in frames {
        session.push_frame(frame)?;
    }
    session.finish()
}

/// Composite straight-alpha `src` over opaque black into `dst`.
fn flatten_over_black(dst: &mut RgbaImage, src: &RgbaImage) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        d[0] = mul_div255_u8(u16::from(s[0]), a);
        d[1] = mul_div255_u8(u16::from(s[1]), a);
        d[2] = mul_div255_u8(u16::from(s[2]), a);
        d[3] = 255;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
