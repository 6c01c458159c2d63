use std::sync::Arc;

use image::RgbaImage;
use kurbo::{Circle, Shape as _};

use crate::effects::blend::{BlendMode, composite_px};
use crate::foundation::core::{CubicBez, PixelRect, Point, Rect, Rgb8};
use crate::foundation::error::{HyperError, HyperResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8};

const PATH_TOLERANCE: f64 = 0.1;

/// `vello_cpu` canvas covering one region of a straight-alpha target raster.
///
/// The canvas is exactly the region, so nothing drawn through it lands outside. Shape coordinates
/// are global raster coordinates.
pub(crate) struct RegionCanvas {
    ctx: vello_cpu::RenderContext,
    region: PixelRect,
    blend: BlendMode,
}

impl RegionCanvas {
    pub(crate) fn new(region: PixelRect) -> HyperResult<Self> {
        let (w, h) = region_dims(region)?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.reset();
        let mut canvas = Self {
            ctx,
            region,
            blend: BlendMode::Normal,
        };
        canvas.set_blend(BlendMode::Normal);
        canvas.use_global_coords();
        Ok(canvas)
    }

    pub(crate) fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.ctx.set_blend_mode(cpu_blend(mode));
    }

    fn use_global_coords(&mut self) {
        self.ctx.set_transform(vello_cpu::kurbo::Affine::translate((
            -f64::from(self.region.x),
            -f64::from(self.region.y),
        )));
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    /// Fill the whole canvas with `paint` given in canvas-local coordinates.
    fn fill_local(&mut self, paint: impl FnOnce(&mut vello_cpu::RenderContext)) {
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        paint(&mut self.ctx);
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.region.width),
            f64::from(self.region.height),
        ));
        self.use_global_coords();
    }

    /// Paint the current pixels of `target` under the region as the canvas backdrop.
    pub(crate) fn draw_backdrop(&mut self, target: &RgbaImage) -> HyperResult<()> {
        let r = self.region;
        let mut bytes = Vec::with_capacity(r.width as usize * r.height as usize * 4);
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                bytes.extend_from_slice(&premul_rgba8(target.get_pixel(x, y).0));
            }
        }
        let image = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap_from_premul(
                &bytes, r.width, r.height,
            )?)),
            sampler: vello_cpu::peniko::ImageSampler {
                quality: vello_cpu::peniko::ImageQuality::Low,
                ..Default::default()
            },
        };

        let blend = self.blend;
        self.set_blend(BlendMode::Normal);
        self.fill_local(|ctx| ctx.set_paint(image));
        self.set_blend(blend);
        Ok(())
    }

    /// Fill the whole canvas with a radial ramp centred on `center` (global coordinates).
    ///
    /// `stops` are `(offset, colour, alpha)` with offsets as fractions of `radius`; the ramp pads
    /// with the end stops on both sides.
    pub(crate) fn fill_radial(&mut self, center: Point, radius: f64, stops: [(f32, Rgb8, f32); 2]) {
        let local = vello_cpu::kurbo::Point::new(
            center.x - f64::from(self.region.x),
            center.y - f64::from(self.region.y),
        );
        let gradient = vello_cpu::peniko::Gradient::new_radial(local, radius as f32).with_stops(
            stops.map(|(offset, color, alpha)| (offset, solid(color, alpha))),
        );
        self.fill_local(|ctx| ctx.set_paint(gradient));
    }

    pub(crate) fn fill_circle(&mut self, circle: Circle, color: Rgb8, alpha: f32) {
        if circle.radius <= 0.0 {
            return;
        }
        let mut p = vello_cpu::kurbo::BezPath::new();
        for el in circle.path_elements(PATH_TOLERANCE) {
            p.push(el);
        }
        self.ctx.set_paint(solid(color, alpha));
        self.ctx.fill_path(&p);
    }

    pub(crate) fn fill_rect(&mut self, rect: Rect, color: Rgb8, alpha: f32) {
        self.ctx.set_paint(solid(color, alpha));
        self.ctx.fill_rect(&cpu_rect(rect));
    }

    pub(crate) fn stroke_cubic(&mut self, curve: CubicBez, width: f64, color: Rgb8, alpha: f32) {
        let mut p = vello_cpu::kurbo::BezPath::new();
        p.move_to(cpu_point(curve.p0));
        p.curve_to(cpu_point(curve.p1), cpu_point(curve.p2), cpu_point(curve.p3));
        self.stroke(&p, width, color, alpha);
    }

    /// Stroke the closed polygon through `points`.
    pub(crate) fn stroke_polygon(&mut self, points: &[Point], width: f64, color: Rgb8, alpha: f32) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let mut p = vello_cpu::kurbo::BezPath::new();
        p.move_to(cpu_point(*first));
        for pt in rest {
            p.line_to(cpu_point(*pt));
        }
        p.close_path();
        self.stroke(&p, width, color, alpha);
    }

    pub(crate) fn stroke_rect(&mut self, rect: Rect, width: f64, color: Rgb8, alpha: f32) {
        self.ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
        self.ctx.set_paint(solid(color, alpha));
        self.ctx.stroke_rect(&cpu_rect(rect));
    }

    fn stroke(&mut self, path: &vello_cpu::kurbo::BezPath, width: f64, color: Rgb8, alpha: f32) {
        self.ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
        self.ctx.set_paint(solid(color, alpha));
        self.ctx.stroke_path(path);
    }

    fn rasterize(&mut self) -> HyperResult<vello_cpu::Pixmap> {
        let (w, h) = region_dims(self.region)?;
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        Ok(pixmap)
    }

    /// Replace the region of `target` with the canvas content.
    ///
    /// Pair with [`RegionCanvas::draw_backdrop`] so the canvas already holds the old pixels.
    pub(crate) fn write_into(mut self, target: &mut RgbaImage) -> HyperResult<()> {
        let pixmap = self.rasterize()?;
        let r = self.region;
        for (i, px) in pixmap.data_as_u8_slice().chunks_exact(4).enumerate() {
            let (x, y) = (i as u32 % r.width, i as u32 / r.width);
            target.get_pixel_mut(r.x + x, r.y + y).0 =
                unpremul_rgba8([px[0], px[1], px[2], px[3]]);
        }
        Ok(())
    }

    /// Composite the canvas content with `mode` over `rows`, the region's own pixels packed
    /// row-major (straight-alpha RGBA8).
    pub(crate) fn composite_into_rows(
        mut self,
        rows: &mut [u8],
        mode: BlendMode,
    ) -> HyperResult<()> {
        let r = self.region;
        if rows.len() != r.width as usize * r.height as usize * 4 {
            return Err(HyperError::validation("row buffer does not match canvas region"));
        }
        let pixmap = self.rasterize()?;
        for (dst, px) in rows
            .chunks_exact_mut(4)
            .zip(pixmap.data_as_u8_slice().chunks_exact(4))
        {
            if px[3] == 0 {
                continue;
            }
            let [cr, cg, cb, a] = unpremul_rgba8([px[0], px[1], px[2], px[3]]);
            composite_px(dst, [cr, cg, cb], f32::from(a) / 255.0, mode);
        }
        Ok(())
    }
}

fn solid(color: Rgb8, alpha: f32) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(color[0], color[1], color[2], unit_to_u8(alpha))
}

fn cpu_point(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn cpu_rect(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn cpu_blend(mode: BlendMode) -> vello_cpu::peniko::BlendMode {
    use vello_cpu::peniko::{Compose, Mix};

    let mix = match mode {
        BlendMode::Normal => Mix::Normal,
        BlendMode::Screen => Mix::Screen,
        BlendMode::Overlay => Mix::Overlay,
    };
    vello_cpu::peniko::BlendMode::new(mix, Compose::SrcOver)
}

fn region_dims(region: PixelRect) -> HyperResult<(u16, u16)> {
    if region.is_empty() {
        return Err(HyperError::validation("canvas region must be non-empty"));
    }
    let w: u16 = region
        .width
        .try_into()
        .map_err(|_| HyperError::validation("canvas width exceeds u16"))?;
    let h: u16 = region
        .height
        .try_into()
        .map_err(|_| HyperError::validation("canvas height exceeds u16"))?;
    Ok((w, h))
}

fn pixmap_from_premul(bytes: &[u8], width: u32, height: u32) -> HyperResult<vello_cpu::Pixmap> {
    let (w, h) = region_dims(PixelRect::new(0, 0, width, height))?;
    if bytes.len() != width as usize * height as usize * 4 {
        return Err(HyperError::validation("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| {
            vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]])
        })
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

fn premul_rgba8(rgba: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = rgba;
    let a16 = u16::from(a);
    [
        mul_div255_u8(u16::from(r), a16),
        mul_div255_u8(u16::from(g), a16),
        mul_div255_u8(u16::from(b), a16),
        a,
    ]
}

fn unpremul_rgba8(rgba: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = rgba;
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let a16 = u16::from(a);
    let un = |c: u8| ((u16::from(c.min(a)) * 255 + a16 / 2) / a16) as u8;
    [un(r), un(g), un(b), a]
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
