use image::RgbaImage;

use crate::encode::encoder::{ChunkSink, EncodedChunk, EncoderConfig, VideoEncoder};
use crate::foundation::core::Fps;
use crate::foundation::error::HyperResult;
use crate::render::synth::encode_png;

/// Intra-only encoder: each frame becomes one PNG sample, every sample a sync sample.
#[derive(Debug)]
pub struct PngEncoder {
    fps: Fps,
    frames: u64,
}

impl PngEncoder {
    pub fn new(cfg: &EncoderConfig) -> Self {
        Self {
            fps: cfg.fps,
            frames: 0,
        }
    }
}

impl VideoEncoder for PngEncoder {
    fn encode(
        &mut self,
        frame: &RgbaImage,
        timestamp_us: u64,
        sink: &mut dyn ChunkSink,
    ) -> HyperResult<()> {
        let next_us = self.fps.frame_timestamp_us(self.frames + 1);
        let duration_us = next_us.saturating_sub(self.fps.frame_timestamp_us(self.frames));
        self.frames += 1;
        sink.push_chunk(
            EncodedChunk {
                data: encode_png(frame)?,
                timestamp_us,
                duration_us,
                is_key: true,
            },
            None,
        )
    }

    fn flush(&mut self, _sink: &mut dyn ChunkSink) -> HyperResult<()> {
        Ok(())
    }
}
