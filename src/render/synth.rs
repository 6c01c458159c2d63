use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, RgbaImage};

use crate::effects::blend::{BlendMode, draw_image_over, fill_all};
use crate::effects::post::apply_final_passes;
use crate::effects::sample::resize_nearest;
use crate::foundation::core::Rgb8;
use crate::foundation::error::{HyperError, HyperResult};
use crate::render::surface_pool::{AcquirePolicy, SurfacePool};
use crate::render::tile::{Algorithm, DEFAULT_TILE_SIZE, TileGrid, render_tile};
use crate::schedule::job::JobCtx;

const BACKGROUND: Rgb8 = [0x05, 0x05, 0x10];
const MASK_ALPHA: f32 = 0.5;

/// Tunables for [`synthesize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthOpts {
    pub tile_size: u32,
    /// Latent seed edge is `max(resolution / latent_divisor, 1)`.
    pub latent_divisor: u32,
    pub seed: u64,
    /// Optional sleep between tiles, in milliseconds.
    pub tile_pause_ms: u64,
}

impl Default for SynthOpts {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            latent_divisor: 32,
            seed: 0,
            tile_pause_ms: 0,
        }
    }
}

impl SynthOpts {
    pub fn validate(&self) -> HyperResult<()> {
        if self.tile_size == 0 {
            return Err(HyperError::validation("synth 'tile_size' must be >= 1"));
        }
        if self.latent_divisor == 0 {
            return Err(HyperError::validation("synth 'latent_divisor' must be >= 1"));
        }
        Ok(())
    }
}

/// Synthesize one `resolution × resolution` raster.
///
/// Pipeline:
/// 1. lease a pooled surface and fill it with the dark background
/// 2. draw the source through a coarse latent seed (nearest down, nearest up)
/// 3. darken with a half-opaque black mask
/// 4. render the tile grid row-major, honouring cancellation between tiles
/// 5. scanlines, vignette, overlay glow
///
/// Tile progress is reported through `ctx` as the fraction of tiles done. The surface goes back to
/// the pool on every exit path.
#[tracing::instrument(
    level = "debug",
    skip(pool, policy, opts, source, ctx),
    fields(algorithm = algorithm.label(), has_source = source.is_some())
)]
pub fn synthesize(
    pool: &SurfacePool,
    policy: AcquirePolicy,
    opts: &SynthOpts,
    resolution: u32,
    algorithm: Algorithm,
    source: Option<&RgbaImage>,
    ctx: &JobCtx<'_>,
) -> HyperResult<RgbaImage> {
    opts.validate()?;
    let grid = TileGrid::new(resolution, opts.tile_size)?;
    let mut lease = pool.acquire_with_retry(policy)?;
    let img = lease.prepare(resolution, resolution);

    fill_all(img, BACKGROUND, 1.0, BlendMode::Normal);

    if let Some(src) = source.filter(|s| s.width() > 0 && s.height() > 0) {
        let latent = (resolution / opts.latent_divisor).max(1);
        let seed = resize_nearest(src, latent, latent);
        let upsampled = resize_nearest(&seed, resolution, resolution);
        draw_image_over(img, &upsampled, 1.0)?;
    }

    fill_all(img, [0, 0, 0], MASK_ALPHA, BlendMode::Normal);

    let total = grid.len();
    let pause = Duration::from_millis(opts.tile_pause_ms);
    for (i, tile) in grid.tiles().enumerate() {
        ctx.check()?;
        render_tile(img, tile, algorithm, resolution, source, opts.seed)?;
        ctx.report((i + 1) as f64 / total as f64);
        if pause.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(pause);
        }
    }
    tracing::trace!(tiles = total, "tile sweep done");

    apply_final_passes(img)?;
    Ok(img.clone())
}

/// Encode a raster as PNG.
pub fn encode_png(img: &RgbaImage) -> HyperResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| HyperError::external(format!("png encode failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Decode any supported still format into straight-alpha RGBA8.
pub fn decode_raster(bytes: &[u8]) -> HyperResult<RgbaImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| HyperError::validation(format!("source image decode failed: {e}")))?;
    Ok(img.to_rgba8())
}

#[cfg(test)]
#[path = "../../tests/unit/render/synth.rs"]
mod tests;
