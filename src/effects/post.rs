use image::RgbaImage;
use rayon::prelude::*;

use crate::effects::blend::{BlendMode, fill_all, fill_row};
use crate::foundation::core::{PixelRect, Point, Rgb8};
use crate::foundation::error::HyperResult;
use crate::render::raster::RegionCanvas;

const BLACK: Rgb8 = [0, 0, 0];
const SCANLINE_EVERY: u32 = 4;
const SCANLINE_ALPHA: f32 = 0.1;
const VIGNETTE_MAX_ALPHA: f32 = 0.4;
const GLOW_TINT: Rgb8 = [0, 255, 255];
const GLOW_ALPHA: f32 = 0.05;
const VIGNETTE_BAND_ROWS: u32 = 64;

/// Scanlines, vignette, then the overlay glow, in that order.
pub fn apply_final_passes(img: &mut RgbaImage) -> HyperResult<()> {
    scanlines(img, SCANLINE_EVERY, SCANLINE_ALPHA);
    let res = f64::from(img.width().max(img.height()));
    vignette(img, res / 4.0, res, VIGNETTE_MAX_ALPHA)?;
    fill_all(img, GLOW_TINT, GLOW_ALPHA, BlendMode::Overlay);
    Ok(())
}

/// Darken every `every`-th row, starting at row 0.
pub fn scanlines(img: &mut RgbaImage, every: u32, alpha: f32) {
    let every = every.max(1);
    let mut y = 0;
    while y < img.height() {
        fill_row(img, y, BLACK, alpha, BlendMode::Normal);
        y += every;
    }
}

/// Radial darkening: transparent inside `inner`, ramping linearly to `max_alpha` at `outer`.
///
/// The gradient is rasterized by `vello_cpu` in horizontal bands, one canvas per band.
pub fn vignette(img: &mut RgbaImage, inner: f64, outer: f64, max_alpha: f32) -> HyperResult<()> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || outer <= 0.0 {
        return Ok(());
    }
    let center = Point::new(f64::from(w) / 2.0, f64::from(h) / 2.0);
    let inner_stop = (inner / outer).clamp(0.0, 1.0) as f32;
    let stops = [(inner_stop, BLACK, 0.0), (1.0, BLACK, max_alpha)];
    let band_len = w as usize * 4 * VIGNETTE_BAND_ROWS as usize;

    img.par_chunks_mut(band_len)
        .enumerate()
        .try_for_each(|(i, band)| -> HyperResult<()> {
            let y0 = i as u32 * VIGNETTE_BAND_ROWS;
            let rows = (band.len() / (w as usize * 4)) as u32;
            let mut canvas = RegionCanvas::new(PixelRect::new(0, y0, w, rows))?;
            canvas.fill_radial(center, outer, stops);
            canvas.composite_into_rows(band, BlendMode::Normal)
        })
}

#[cfg(test)]
#[path = "../../tests/unit/effects/post.rs"]
mod tests;
