use crate::foundation::error::{HyperError, HyperResult};

pub use kurbo::{CubicBez, Point, Rect};

/// Straight (non-premultiplied) RGB triple.
pub type Rgb8 = [u8; 3];

/// Output edge length tiers accepted by the engine.
///
/// Every tier is a square raster; the numeric value is the edge length in pixels.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum Resolution {
    /// 256 × 256.
    R256,
    /// 512 × 512.
    R512,
    /// 1024 × 1024.
    R1024,
    /// 2048 × 2048.
    R2048,
    /// 4096 × 4096.
    R4096,
    /// 8192 × 8192.
    R8192,
    /// 16384 × 16384.
    R16384,
}

impl Resolution {
    /// All tiers in ascending order.
    pub const ALL: [Resolution; 7] = [
        Resolution::R256,
        Resolution::R512,
        Resolution::R1024,
        Resolution::R2048,
        Resolution::R4096,
        Resolution::R8192,
        Resolution::R16384,
    ];

    /// Edge length in pixels.
    pub fn px(self) -> u32 {
        match self {
            Resolution::R256 => 256,
            Resolution::R512 => 512,
            Resolution::R1024 => 1024,
            Resolution::R2048 => 2048,
            Resolution::R4096 => 4096,
            Resolution::R8192 => 8192,
            Resolution::R16384 => 16384,
        }
    }

    /// Map an edge length back to its tier.
    pub fn from_px(px: u32) -> HyperResult<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.px() == px)
            .ok_or_else(|| {
                HyperError::validation(format!(
                    "unsupported resolution {px}; expected one of 256, 512, 1024, 2048, 4096, 8192, 16384"
                ))
            })
    }

    /// Advisory host requirements for this tier.
    pub fn safe_zone(self) -> SafeZone {
        const HIGH: &str = "high resolution may exhaust host memory";
        const EXTREME: &str = "extremely high resolution, host may run out of memory";
        let (min_memory_mb, max_concurrent, warning) = match self {
            Resolution::R256 => (512, 8, None),
            Resolution::R512 => (1024, 6, None),
            Resolution::R1024 => (2048, 4, None),
            Resolution::R2048 => (4096, 2, None),
            Resolution::R4096 => (8192, 1, Some(HIGH)),
            Resolution::R8192 => (16384, 1, Some(EXTREME)),
            Resolution::R16384 => (32768, 1, Some(EXTREME)),
        };
        SafeZone {
            resolution: self,
            min_memory_mb,
            max_concurrent,
            warning,
        }
    }
}

impl TryFrom<u32> for Resolution {
    type Error = HyperError;

    fn try_from(px: u32) -> HyperResult<Self> {
        Self::from_px(px)
    }
}

impl From<Resolution> for u32 {
    fn from(r: Resolution) -> u32 {
        r.px()
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}px", self.px())
    }
}

/// Per-tier guidance row. Advisory only; nothing enforces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SafeZone {
    /// Tier this row describes.
    pub resolution: Resolution,
    /// Minimum recommended host memory in MiB.
    pub min_memory_mb: u32,
    /// Maximum recommended concurrently running jobs at this tier.
    pub max_concurrent: usize,
    /// Optional crash-risk note.
    pub warning: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> HyperResult<Self> {
        if den == 0 {
            return Err(HyperError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(HyperError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn integer(num: u32) -> HyperResult<Self> {
        Self::new(num, 1)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// `floor(secs * fps)`, tolerant of the representation error in `i / fps` timestamps.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64() + 1e-9).floor().max(0.0) as u64
    }

    /// Presentation time of frame `index` in microseconds.
    pub fn frame_timestamp_us(self, index: u64) -> u64 {
        let num = u128::from(self.num);
        let den = u128::from(self.den);
        (u128::from(index) * den * 1_000_000 / num) as u64
    }
}

/// Integer pixel rectangle (`x`, `y` inclusive; `width`, `height` extents).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn intersect(self, other: PixelRect) -> PixelRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return PixelRect::new(x0, y0, 0, 0);
        }
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.right()),
            f64::from(self.bottom()),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
