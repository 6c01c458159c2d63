use image::RgbaImage;
use kurbo::Circle;

use crate::effects::blend::{BlendMode, composite_px};
use crate::effects::sample::resample_crop;
use crate::foundation::core::{CubicBez, PixelRect, Point, Rect, Rgb8};
use crate::foundation::error::{HyperError, HyperResult};
use crate::foundation::math::{Fnv1a64, Rng64};
use crate::render::raster::RegionCanvas;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Procedural decoration pass applied on top of each resampled tile.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Scattered translucent dots ("Atomic Super-Resolution").
    #[default]
    Particle,
    /// Translucent cubic strokes across the tile ("Quantum Frequency").
    Wave,
    /// Translucent rectangles inside the tile ("Wavelet Decomposition").
    Block,
    /// One translucent triangle outline ("Fractal Upsampling").
    Polygon,
}

impl Algorithm {
    /// Variant chosen for ids that match none of the known keywords.
    pub const FALLBACK: Algorithm = Algorithm::Polygon;

    /// Resolve a free-form algorithm id.
    ///
    /// Matching is a case-insensitive substring test, checked in the order `ATOMIC`, `QUANTUM`,
    /// `WAVELET`. A missing or empty id selects [`Algorithm::default`]; any other id, including
    /// whitespace, selects [`Algorithm::FALLBACK`].
    pub fn resolve(id: Option<&str>) -> Self {
        let Some(id) = id.filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let key = id.to_ascii_uppercase();
        if key.contains("ATOMIC") {
            Algorithm::Particle
        } else if key.contains("QUANTUM") {
            Algorithm::Wave
        } else if key.contains("WAVELET") {
            Algorithm::Block
        } else {
            Self::FALLBACK
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Algorithm::Particle => "Atomic Super-Resolution",
            Algorithm::Wave => "Quantum Frequency",
            Algorithm::Block => "Wavelet Decomposition",
            Algorithm::Polygon => "Fractal Upsampling",
        }
    }

    fn decorate(self, p: &mut RegionCanvas, tile: PixelRect, resolution: u32, rng: &mut Rng64) {
        let x = f64::from(tile.x);
        let y = f64::from(tile.y);
        let size = f64::from(tile.width);
        match self {
            Algorithm::Particle => {
                const DOTS: usize = 20;
                const WHITE: Rgb8 = [0xff, 0xff, 0xff];
                const AMBER: Rgb8 = [0xff, 0x99, 0x00];
                let max_radius = if resolution > 2048 { 1.0 } else { 2.0 };
                for _ in 0..DOTS {
                    let color = if rng.next_bool() { WHITE } else { AMBER };
                    let alpha = (rng.next_f64() * 0.2) as f32;
                    let cx = x + rng.next_f64() * size;
                    let cy = y + rng.next_f64() * size;
                    let r = rng.next_f64() * max_radius;
                    p.fill_circle(Circle::new((cx, cy), r), color, alpha);
                }
            }
            Algorithm::Wave => {
                const CYAN: Rgb8 = [0x00, 0xff, 0xff];
                for _ in 0..3 {
                    let y0 = y + rng.next_f64() * size;
                    let y3 = y + rng.next_f64() * size;
                    let curve = CubicBez::new(
                        (x, y0),
                        (x + size / 2.0, y),
                        (x + size / 2.0, y + size),
                        (x + size, y3),
                    );
                    p.stroke_cubic(curve, 1.0, CYAN, 0.15);
                }
            }
            Algorithm::Block => {
                const MAGENTA: Rgb8 = [0xff, 0x00, 0xff];
                for _ in 0..8 {
                    let w = rng.next_f64() * size;
                    let h = rng.next_f64() * size;
                    let bx = x + rng.next_f64() * (size - w);
                    let by = y + rng.next_f64() * (size - h);
                    p.fill_rect(Rect::new(bx, by, bx + w, by + h), MAGENTA, 0.08);
                }
            }
            Algorithm::Polygon => {
                const GREEN: Rgb8 = [0x00, 0xff, 0x88];
                let cx = x + size / 2.0;
                let cy = y + size / 2.0;
                let d = size / 3.0;
                let tri = [
                    Point::new(cx, cy - d),
                    Point::new(cx + d, cy + d),
                    Point::new(cx - d, cy + d),
                ];
                p.stroke_polygon(&tri, 1.0, GREEN, 0.2);
            }
        }
    }
}

/// Row-major grid of square tiles covering a `resolution × resolution` raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    resolution: u32,
    tile_size: u32,
}

impl TileGrid {
    pub fn new(resolution: u32, tile_size: u32) -> HyperResult<Self> {
        if resolution == 0 {
            return Err(HyperError::validation("resolution must be non-zero"));
        }
        if tile_size == 0 {
            return Err(HyperError::validation("tile_size must be non-zero"));
        }
        Ok(Self {
            resolution,
            tile_size,
        })
    }

    /// Tiles per axis (`ceil(resolution / tile_size)`).
    pub fn tiles_per_axis(&self) -> u32 {
        self.resolution.div_ceil(self.tile_size)
    }

    pub fn len(&self) -> usize {
        let n = self.tiles_per_axis() as usize;
        n * n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nominal (unclipped) tiles in row-major order.
    ///
    /// The last row and column may extend past the raster; [`render_tile`] clips them.
    pub fn tiles(&self) -> impl Iterator<Item = PixelRect> + '_ {
        let n = self.tiles_per_axis();
        let t = self.tile_size;
        (0..n).flat_map(move |ty| (0..n).map(move |tx| PixelRect::new(tx * t, ty * t, t, t)))
    }

    /// Tiles clipped to the raster bounds.
    pub fn clipped_tiles(&self) -> impl Iterator<Item = PixelRect> + '_ {
        let bounds = PixelRect::new(0, 0, self.resolution, self.resolution);
        self.tiles().map(move |t| t.intersect(bounds))
    }
}

/// Per-tile rng seed derived from the engine seed, the output size and the tile origin.
pub fn tile_seed(seed: u64, resolution: u32, tile: PixelRect) -> u64 {
    let mut h = Fnv1a64::new_default();
    h.write_u64(seed);
    h.write_u32(resolution);
    h.write_u32(tile.x);
    h.write_u32(tile.y);
    h.finish()
}

/// Synthesize one tile of the output raster in place.
///
/// `tile` is the nominal square; drawing is clipped to its intersection with the raster. The
/// proportional source crop is resampled into the visible part. The visible part is then drawn
/// through a `vello_cpu` canvas: the decoration pass is screen-blended over it and a
/// near-invisible border is stroked on the tile edge.
pub fn render_tile(
    target: &mut RgbaImage,
    tile: PixelRect,
    algorithm: Algorithm,
    resolution: u32,
    source: Option<&RgbaImage>,
    seed: u64,
) -> HyperResult<()> {
    let bounds = PixelRect::new(0, 0, target.width(), target.height());
    let clip = tile.intersect(bounds);
    if clip.is_empty() {
        return Ok(());
    }

    if let Some(src) = source.filter(|s| s.width() > 0 && s.height() > 0) {
        let rx = f64::from(src.width()) / f64::from(resolution);
        let ry = f64::from(src.height()) / f64::from(resolution);
        let crop = Rect::new(
            f64::from(clip.x) * rx,
            f64::from(clip.y) * ry,
            f64::from(clip.right()) * rx,
            f64::from(clip.bottom()) * ry,
        );
        let patch = resample_crop(src, crop, clip.width, clip.height)?;
        for (px, py, s) in patch.enumerate_pixels() {
            let d = target.get_pixel_mut(clip.x + px, clip.y + py);
            composite_px(
                &mut d.0,
                [s[0], s[1], s[2]],
                f32::from(s[3]) / 255.0,
                BlendMode::Normal,
            );
        }
    }

    let mut canvas = RegionCanvas::new(clip)?;
    canvas.draw_backdrop(target)?;

    let mut rng = Rng64::new(tile_seed(seed, resolution, tile));
    canvas.set_blend(BlendMode::Screen);
    algorithm.decorate(&mut canvas, tile, resolution, &mut rng);

    canvas.set_blend(BlendMode::Normal);
    canvas.stroke_rect(tile.to_rect(), 1.0, [0xff, 0xff, 0xff], 0.02);
    canvas.write_into(target)
}

#[cfg(test)]
#[path = "../../tests/unit/render/tile.rs"]
mod tests;
