use image::RgbaImage;
use rayon::prelude::*;

use crate::foundation::core::Rgb8;
use crate::foundation::error::{HyperError, HyperResult};
use crate::foundation::math::unit_to_u8;

/// Separable blend modes used by the synthesis passes.
///
/// Compositing follows the W3C "Compositing and Blending" source-over model on straight-alpha
/// RGBA8 pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Plain source-over.
    #[default]
    Normal,
    /// `cb + cs - cb·cs`; never darkens the backdrop.
    Screen,
    /// Multiply or screen depending on the backdrop.
    Overlay,
}

impl BlendMode {
    pub fn mix(self, cb: f32, cs: f32) -> f32 {
        match self {
            BlendMode::Normal => cs,
            BlendMode::Screen => cb + cs - cb * cs,
            BlendMode::Overlay => {
                if cb <= 0.5 {
                    2.0 * cb * cs
                } else {
                    1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
                }
            }
        }
    }
}

/// Composite one straight-alpha source colour onto a straight-alpha RGBA8 pixel.
pub fn composite_px(dst: &mut [u8], src: Rgb8, alpha: f32, mode: BlendMode) {
    let a_s = alpha.clamp(0.0, 1.0);
    if a_s <= 0.0 {
        return;
    }
    let a_b = f32::from(dst[3]) / 255.0;
    let a_o = a_s + a_b * (1.0 - a_s);
    if a_o <= 0.0 {
        return;
    }

    for i in 0..3 {
        let cs = f32::from(src[i]) / 255.0;
        let cb = f32::from(dst[i]) / 255.0;
        let mixed = (1.0 - a_b) * cs + a_b * mode.mix(cb, cs);
        let co = (a_s * mixed + a_b * (1.0 - a_s) * cb) / a_o;
        dst[i] = unit_to_u8(co);
    }
    dst[3] = unit_to_u8(a_o);
}

/// Fill the whole raster with `color` at `alpha`.
pub fn fill_all(img: &mut RgbaImage, color: Rgb8, alpha: f32, mode: BlendMode) {
    if alpha <= 0.0 {
        return;
    }
    let stride = img.width() as usize * 4;
    if stride == 0 {
        return;
    }
    img.par_chunks_exact_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            composite_px(px, color, alpha, mode);
        }
    });
}

/// Fill one full-width row.
pub fn fill_row(img: &mut RgbaImage, y: u32, color: Rgb8, alpha: f32, mode: BlendMode) {
    if y >= img.height() {
        return;
    }
    let stride = img.width() as usize * 4;
    let start = y as usize * stride;
    let buf: &mut [u8] = img;
    for px in buf[start..start + stride].chunks_exact_mut(4) {
        composite_px(px, color, alpha, mode);
    }
}

/// Draw `src` onto `dst` with source-over at a global `opacity`.
///
/// Both rasters must share dimensions.
pub fn draw_image_over(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32) -> HyperResult<()> {
    if dst.dimensions() != src.dimensions() {
        return Err(HyperError::validation(format!(
            "draw_image_over expects equal dimensions: dst {:?}, src {:?}",
            dst.dimensions(),
            src.dimensions()
        )));
    }
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return Ok(());
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let alpha = opacity * f32::from(s[3]) / 255.0;
        composite_px(d, [s[0], s[1], s[2]], alpha, BlendMode::Normal);
    }
    Ok(())
}

/// Multiply every colour channel by `factor`, leaving alpha untouched.
pub fn scale_rgb(img: &mut RgbaImage, factor: f32) {
    let factor = factor.clamp(0.0, 1.0);
    for px in img.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = unit_to_u8(f32::from(*c) / 255.0 * factor);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blend.rs"]
mod tests;
