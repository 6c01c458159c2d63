use image::RgbaImage;

use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};
use crate::render::surface_pool::{AcquirePolicy, SurfacePool};
use crate::render::synth::{SynthOpts, synthesize};
use crate::render::tile::Algorithm;
use crate::schedule::job::JobCtx;
use crate::video::source::VideoSource;

/// Sampling rate used to index source frames, independent of the source's native rate.
pub const NOMINAL_FPS: u32 = 30;
/// Default stride between sampled frames.
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 10;

/// One sampled and upscaled source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    /// Index of the sampled frame at the nominal rate.
    pub frame_index: u64,
    pub timestamp_secs: f64,
    pub raster: RgbaImage,
}

/// Sampling parameters for [`extract_keyframes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyframeOpts {
    pub nominal_fps: u32,
    pub interval: u32,
}

impl Default for KeyframeOpts {
    fn default() -> Self {
        Self {
            nominal_fps: NOMINAL_FPS,
            interval: DEFAULT_KEYFRAME_INTERVAL,
        }
    }
}

impl KeyframeOpts {
    pub fn validate(&self) -> HyperResult<()> {
        if self.nominal_fps == 0 {
            return Err(HyperError::validation("video 'nominal_fps' must be >= 1"));
        }
        if self.interval == 0 {
            return Err(HyperError::validation(
                "video 'keyframe_interval' must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Nominal frame indices sampled from a `duration_secs` long source: `0, K, 2K, ...` below
/// `floor(duration × fps)`.
pub fn keyframe_indices(duration_secs: f64, opts: &KeyframeOpts) -> HyperResult<Vec<u64>> {
    opts.validate()?;
    let fps = Fps::integer(opts.nominal_fps)?;
    let duration = if duration_secs.is_finite() {
        duration_secs.max(0.0)
    } else {
        0.0
    };
    let total = fps.secs_to_frames_floor(duration);
    Ok((0..total).step_by(opts.interval as usize).collect())
}

/// Sample `source` and synthesize one raster per sampled frame.
///
/// Fails with a precondition error when fewer than two frames would be sampled. Progress is the
/// fraction of nominal frames passed, reported after each keyframe.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(level = "debug", skip_all, fields(resolution = resolution, algorithm = algorithm.label()))]
pub fn extract_keyframes(
    source: &mut dyn VideoSource,
    pool: &SurfacePool,
    policy: AcquirePolicy,
    synth: &SynthOpts,
    opts: &KeyframeOpts,
    resolution: u32,
    algorithm: Algorithm,
    ctx: &JobCtx<'_>,
) -> HyperResult<Vec<Keyframe>> {
    let duration = source.info().duration_secs;
    let indices = keyframe_indices(duration, opts)?;
    if indices.len() < 2 {
        return Err(HyperError::precondition(format!(
            "video too short for interpolation: {} keyframe(s) from {duration:.3}s, need at least 2",
            indices.len()
        )));
    }

    let fps = Fps::integer(opts.nominal_fps)?;
    let total = fps.secs_to_frames_floor(duration);
    let tile_ctx = ctx.silent();
    let mut out = Vec::with_capacity(indices.len());
    for &i in &indices {
        ctx.check()?;
        let t = fps.frames_to_secs(i);
        let frame = source.frame_at(t)?;
        let raster = synthesize(
            pool,
            policy,
            synth,
            resolution,
            algorithm,
            Some(&frame),
            &tile_ctx,
        )?;
        out.push(Keyframe {
            frame_index: i,
            timestamp_secs: t,
            raster,
        });
        ctx.report(i as f64 / total as f64);
    }
    tracing::debug!(keyframes = out.len(), "keyframes extracted");
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/video/keyframes.rs"]
mod tests;
