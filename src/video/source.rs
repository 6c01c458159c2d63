use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};

/// Intrinsic properties of a video source.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    /// Native frame rate when known. Sampling ignores it and uses the extractor's nominal rate.
    pub fps: Option<Fps>,
}

/// Seekable video input.
///
/// `frame_at` returns once the frame at `t` is fully decoded, so no extra settling is needed
/// between a seek and a capture.
pub trait VideoSource {
    fn info(&self) -> &VideoInfo;

    /// Decode the frame presented at `t` seconds as straight-alpha RGBA8.
    fn frame_at(&mut self, t: f64) -> HyperResult<RgbaImage>;

    /// Short human-readable label for job records.
    fn label(&self) -> String {
        "video".to_owned()
    }
}

/// Video held as decoded frames at a fixed rate.
#[derive(Clone, Debug)]
pub struct MemoryVideoSource {
    info: VideoInfo,
    fps: Fps,
    frames: Vec<RgbaImage>,
}

impl MemoryVideoSource {
    pub fn new(frames: Vec<RgbaImage>, fps: Fps) -> HyperResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| HyperError::validation("memory video needs at least one frame"))?;
        let (width, height) = first.dimensions();
        if width == 0 || height == 0 {
            return Err(HyperError::validation("memory video frames must be non-empty"));
        }
        if let Some(bad) = frames.iter().position(|f| f.dimensions() != (width, height)) {
            return Err(HyperError::validation(format!(
                "memory video frame {bad} is {:?}, expected {:?}",
                frames[bad].dimensions(),
                (width, height)
            )));
        }
        let info = VideoInfo {
            width,
            height,
            duration_secs: fps.frames_to_secs(frames.len() as u64),
            fps: Some(fps),
        };
        Ok(Self { info, fps, frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for MemoryVideoSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_at(&mut self, t: f64) -> HyperResult<RgbaImage> {
        if !t.is_finite() || t < 0.0 {
            return Err(HyperError::validation(format!("invalid seek time {t}")));
        }
        let idx = (self.fps.secs_to_frames_floor(t) as usize).min(self.frames.len() - 1);
        Ok(self.frames[idx].clone())
    }

    fn label(&self) -> String {
        format!("memory:{}x{}", self.info.width, self.info.height)
    }
}

/// File-backed source decoded through the system `ffprobe`/`ffmpeg` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegVideoSource {
    path: PathBuf,
    info: VideoInfo,
}

impl FfmpegVideoSource {
    /// Probe `path` and open it for seeking.
    pub fn open(path: impl AsRef<Path>) -> HyperResult<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe_video(&path)?;
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            duration_secs = info.duration_secs,
            "probed video source"
        );
        Ok(Self { path, info })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSource for FfmpegVideoSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_at(&mut self, t: f64) -> HyperResult<RgbaImage> {
        decode_frame(&self.path, &self.info, t)
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(feature = "media-ffmpeg")]
fn probe_video(path: &Path) -> HyperResult<VideoInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| HyperError::capability(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(HyperError::external(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| HyperError::external(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| HyperError::validation("no video stream found"))?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(HyperError::external("ffprobe reported no video dimensions"));
    };
    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_ff_ratio)
        .and_then(|(n, d)| Fps::new(n, d).ok());
    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        duration_secs,
        fps,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
fn probe_video(_path: &Path) -> HyperResult<VideoInfo> {
    Err(HyperError::capability(
        "file video sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn decode_frame(path: &Path, info: &VideoInfo, t: f64) -> HyperResult<RgbaImage> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{t:.9}")])
        .arg("-i")
        .arg(path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| HyperError::capability(format!("failed to run ffmpeg for video decode: {e}")))?;
    if !out.status.success() {
        return Err(HyperError::external(format!(
            "ffmpeg video decode failed for '{}' at {t:.3}s: {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected = info.width as usize * info.height as usize * 4;
    if expected == 0 || out.stdout.len() < expected {
        return Err(HyperError::external(format!(
            "decoded frame has {} bytes, expected {expected}",
            out.stdout.len()
        )));
    }
    let mut raw = out.stdout;
    raw.truncate(expected);
    RgbaImage::from_raw(info.width, info.height, raw)
        .ok_or_else(|| HyperError::external("decoded frame buffer size mismatch"))
}

#[cfg(not(feature = "media-ffmpeg"))]
fn decode_frame(_path: &Path, _info: &VideoInfo, _t: f64) -> HyperResult<RgbaImage> {
    Err(HyperError::capability(
        "file video sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('/')?;
    let a = a.parse::<u32>().ok()?;
    let b = b.parse::<u32>().ok()?;
    if a == 0 || b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/video/source.rs"]
mod tests;
