use fast_image_resize as fir;
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::foundation::core::Rect;
use crate::foundation::error::{HyperError, HyperResult};

/// Grid edge used when estimating a keyframe's mean colour.
pub const MEAN_SAMPLE_GRID: u32 = 32;

/// Nearest-neighbour resize (no smoothing).
pub fn resize_nearest(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(src, width.max(1), height.max(1), FilterType::Nearest)
}

/// Resample the `crop` region of `src` (source pixel coordinates, fractional allowed) into a
/// `width × height` raster with a Catmull-Rom filter.
///
/// The crop keeps its fractional edges, so crops that share an edge produce rasters that join
/// without a seam. It is clamped to the source bounds and never narrower than `MIN_CROP_EXTENT`.
pub fn resample_crop(
    src: &RgbaImage,
    crop: Rect,
    width: u32,
    height: u32,
) -> HyperResult<RgbaImage> {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 {
        return Err(HyperError::validation("resample source must be non-empty"));
    }
    let (left, crop_w) = clamp_span(crop.x0, crop.x1, f64::from(sw));
    let (top, crop_h) = clamp_span(crop.y0, crop.y1, f64::from(sh));
    let (width, height) = (width.max(1), height.max(1));

    let src_view = fir::images::ImageRef::new(sw, sh, src.as_raw(), fir::PixelType::U8x4)
        .map_err(|e| HyperError::Other(anyhow::anyhow!("resample source view: {e}")))?;
    let mut dst = fir::images::Image::new(width, height, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom))
        .crop(left, top, crop_w, crop_h);
    fir::Resizer::new()
        .resize(&src_view, &mut dst, Some(&options))
        .map_err(|e| HyperError::Other(anyhow::anyhow!("crop resample failed: {e}")))?;

    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| HyperError::Other(anyhow::anyhow!("resampled buffer has the wrong size")))
}

const MIN_CROP_EXTENT: f64 = 1e-3;

fn clamp_span(lo: f64, hi: f64, extent: f64) -> (f64, f64) {
    let lo = lo.clamp(0.0, extent - MIN_CROP_EXTENT);
    let hi = hi.clamp(lo + MIN_CROP_EXTENT, extent);
    (lo, hi - lo)
}

/// Mean straight RGB over every pixel (alpha ignored, as a canvas readback would).
pub fn mean_rgb(img: &RgbaImage) -> [f64; 3] {
    let mut sum = [0u64; 3];
    for px in img.pixels() {
        sum[0] += u64::from(px[0]);
        sum[1] += u64::from(px[1]);
        sum[2] += u64::from(px[2]);
    }
    let n = (u64::from(img.width()) * u64::from(img.height())).max(1) as f64;
    [sum[0] as f64 / n, sum[1] as f64 / n, sum[2] as f64 / n]
}

/// Mean RGB estimated on a `grid × grid` downsample.
pub fn mean_rgb_sampled(img: &RgbaImage, grid: u32) -> [f64; 3] {
    let small = imageops::resize(img, grid.max(1), grid.max(1), FilterType::Triangle);
    mean_rgb(&small)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/sample.rs"]
mod tests;
