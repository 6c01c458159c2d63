//! hyperres is a tile-based procedural raster synthesis engine.
//!
//! A still job resamples a source image into a square output tier tile by tile, decorates each
//! tile with a procedural pass, and encodes the result as PNG. A video job samples keyframes from a
//! [`VideoSource`], synthesizes each one, cross-dissolves between them at the target frame rate,
//! and packages the frames into a minimal MP4.
//!
//! Entry point: [`Engine`]. Surfaces come from a bounded [`SurfacePool`]; concurrency is bounded
//! by the [`JobScheduler`] budget.
#![forbid(unsafe_code)]

mod config;
mod effects;
mod encode;
mod engine;
mod foundation;
mod render;
mod schedule;
mod video;

pub use image::RgbaImage;

pub use crate::config::{EncodeOpts, EngineOpts, VideoOpts};
pub use crate::encode::encoder::{
    ChunkMetadata, ChunkSink, CodecProfile, DEFAULT_BITRATE, EncodeSession, EncodedChunk,
    EncoderConfig, VideoEncoder, encode_frames, is_available, open_encoder,
};
pub use crate::encode::ffmpeg::is_ffmpeg_on_path;
pub use crate::encode::mp4::{Mp4Muxer, MuxerConfig};
pub use crate::engine::{CapabilityReport, Engine, ImageRequest, VideoRequest};
pub use crate::foundation::core::{Fps, PixelRect, Resolution, SafeZone};
pub use crate::foundation::error::{HyperError, HyperResult};
pub use crate::render::surface_pool::{
    AcquirePolicy, Surface, SurfaceLease, SurfacePool, SurfacePoolOpts, SurfacePoolStats,
};
pub use crate::render::synth::{SynthOpts, decode_raster, encode_png, synthesize};
pub use crate::render::tile::{Algorithm, DEFAULT_TILE_SIZE, TileGrid, render_tile};
pub use crate::schedule::job::{
    CancelToken, JobCtx, JobId, JobKind, JobRegistry, JobStatus, ProcessingJob, ProgressFn,
};
pub use crate::schedule::scheduler::{CapabilityOverrides, JobScheduler, SystemCapabilities};
pub use crate::video::interpolate::{
    FrameConsumer, FrameSequence, dimming_factor, interpolate, interpolate_into,
    interpolated_frame_count, output_frame_count,
};
pub use crate::video::keyframes::{
    DEFAULT_KEYFRAME_INTERVAL, Keyframe, KeyframeOpts, NOMINAL_FPS, extract_keyframes,
    keyframe_indices,
};
pub use crate::video::source::{FfmpegVideoSource, MemoryVideoSource, VideoInfo, VideoSource};
