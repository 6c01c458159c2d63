use image::RgbaImage;

use crate::effects::blend::{draw_image_over, scale_rgb};
use crate::effects::sample::{MEAN_SAMPLE_GRID, mean_rgb, mean_rgb_sampled};
use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};
use crate::render::surface_pool::{AcquirePolicy, SurfacePool};
use crate::schedule::job::JobCtx;
use crate::video::keyframes::Keyframe;

/// Receives output frames in temporal order.
pub trait FrameConsumer {
    fn push_frame(&mut self, frame: &RgbaImage) -> HyperResult<()>;
}

/// Ordered in-memory frame list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSequence {
    frames: Vec<RgbaImage>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<RgbaImage> {
        self.frames
    }
}

impl FrameConsumer for FrameSequence {
    fn push_frame(&mut self, frame: &RgbaImage) -> HyperResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// `floor((t1 - t0) × fps)`; `n - 1` in-between frames are emitted for a pair.
pub fn interpolated_frame_count(t0: f64, t1: f64, fps: Fps) -> u64 {
    let dt = t1 - t0;
    if !dt.is_finite() || dt <= 0.0 {
        return 0;
    }
    fps.secs_to_frames_floor(dt)
}

/// Brightness correction for an in-between frame, in `[0.9, 1.0]`.
///
/// Only the red channel drives the heuristic.
pub fn dimming_factor(mean: [f64; 3], ideal: [f64; 3]) -> f32 {
    let err = ((mean[0] - ideal[0]).abs() / 255.0).clamp(0.0, 1.0);
    (0.9 + 0.1 * (1.0 - err)) as f32
}

/// Frames [`interpolate_into`] will emit for `keyframes` at `fps`.
pub fn output_frame_count(keyframes: &[Keyframe], fps: Fps) -> u64 {
    if keyframes.is_empty() {
        return 0;
    }
    let between: u64 = keyframes
        .windows(2)
        .map(|w| {
            interpolated_frame_count(w[0].timestamp_secs, w[1].timestamp_secs, fps).saturating_sub(1)
        })
        .sum();
    keyframes.len() as u64 + between
}

/// Cross-dissolve `keyframes` into `sink` at `fps`.
///
/// For each adjacent pair the start keyframe is emitted, followed by `n - 1` blended frames
/// (start at `1 - p`, then end at `p`, over a cleared pooled surface) scaled by
/// [`dimming_factor`]. The last keyframe closes the sequence. Returns the number of frames pushed.
#[tracing::instrument(level = "debug", skip_all, fields(keyframes = keyframes.len(), fps = fps.as_f64()))]
pub fn interpolate_into(
    keyframes: &[Keyframe],
    fps: Fps,
    pool: &SurfacePool,
    policy: AcquirePolicy,
    sink: &mut dyn FrameConsumer,
    ctx: &JobCtx<'_>,
) -> HyperResult<u64> {
    if keyframes.len() < 2 {
        return Err(HyperError::precondition(format!(
            "interpolation needs at least 2 keyframes, got {}",
            keyframes.len()
        )));
    }
    let dims = keyframes[0].raster.dimensions();
    if let Some(k) = keyframes.iter().find(|k| k.raster.dimensions() != dims) {
        return Err(HyperError::validation(format!(
            "keyframe at {:.3}s is {:?}, expected {dims:?}",
            k.timestamp_secs,
            k.raster.dimensions()
        )));
    }

    let total = output_frame_count(keyframes, fps).max(1);
    let mut emitted = 0u64;
    let mut emit = |frame: &RgbaImage, sink: &mut dyn FrameConsumer| -> HyperResult<()> {
        ctx.check()?;
        sink.push_frame(frame)?;
        emitted += 1;
        ctx.report(emitted as f64 / total as f64);
        Ok(())
    };

    for pair in keyframes.windows(2) {
        let (start, end) = (&pair[0], &pair[1]);
        emit(&start.raster, &mut *sink)?;

        let n = interpolated_frame_count(start.timestamp_secs, end.timestamp_secs, fps);
        if n < 2 {
            continue;
        }
        let start_mean = mean_rgb_sampled(&start.raster, MEAN_SAMPLE_GRID);
        let end_mean = mean_rgb_sampled(&end.raster, MEAN_SAMPLE_GRID);

        let mut lease = pool.acquire_with_retry(policy)?;
        for j in 1..n {
            let p = j as f64 / n as f64;
            let surface = lease.prepare(dims.0, dims.1);
            draw_image_over(surface, &start.raster, (1.0 - p) as f32)?;
            draw_image_over(surface, &end.raster, p as f32)?;

            let mean = mean_rgb(surface);
            let ideal = [0, 1, 2].map(|c| start_mean[c] + (end_mean[c] - start_mean[c]) * p);
            scale_rgb(surface, dimming_factor(mean, ideal));
            emit(surface, &mut *sink)?;
        }
    }

    if let Some(last) = keyframes.last() {
        emit(&last.raster, &mut *sink)?;
    }
    Ok(emitted)
}

/// Collecting form of [`interpolate_into`].
pub fn interpolate(
    keyframes: &[Keyframe],
    fps: Fps,
    pool: &SurfacePool,
    policy: AcquirePolicy,
    ctx: &JobCtx<'_>,
) -> HyperResult<FrameSequence> {
    let mut seq = FrameSequence::new();
    interpolate_into(keyframes, fps, pool, policy, &mut seq, ctx)?;
    Ok(seq)
}

#[cfg(test)]
#[path = "../../tests/unit/video/interpolate.rs"]
mod tests;
