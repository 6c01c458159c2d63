use std::io::{Read, Write as _};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbaImage;

use crate::encode::annexb::{access_units, build_avcc};
use crate::encode::encoder::{ChunkMetadata, ChunkSink, EncodedChunk, EncoderConfig, VideoEncoder};
use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};

type Drain = JoinHandle<std::io::Result<Vec<u8>>>;

/// H.264 Main profile encoder backed by a system `ffmpeg` process.
///
/// Raw RGBA frames stream into stdin; the Annex B elementary stream is collected from stdout and
/// split into samples on flush. The child process is killed if the encoder is dropped unflushed.
pub struct FfmpegH264Encoder {
    fps: Fps,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<Drain>,
    stderr_drain: Option<Drain>,
    frames_in: u64,
}

impl FfmpegH264Encoder {
    pub fn spawn(cfg: &EncoderConfig) -> HyperResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(HyperError::capability(
                "ffmpeg is required for h264 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-profile:v",
            "main",
            "-pix_fmt",
            "yuv420p",
            // No B-frames: decode order equals presentation order.
            "-bf",
            "0",
            "-b:v",
            &cfg.bitrate.to_string(),
            "-x264-params",
            "aud=1",
            "-f",
            "h264",
            "pipe:1",
        ]);

        let mut child = cmd.spawn().map_err(|e| {
            HyperError::capability(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HyperError::external("failed to open ffmpeg stdin (unexpected)"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HyperError::external("failed to open ffmpeg stdout (unexpected)"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HyperError::external("failed to open ffmpeg stderr (unexpected)"))?;

        tracing::debug!(
            width = cfg.width,
            height = cfg.height,
            bitrate = cfg.bitrate,
            "spawned ffmpeg h264 encoder"
        );
        Ok(Self {
            fps: cfg.fps,
            child: Some(child),
            stdin: Some(stdin),
            stdout_drain: Some(drain(stdout)),
            stderr_drain: Some(drain(stderr)),
            frames_in: 0,
        })
    }

    fn collect(&mut self) -> HyperResult<Vec<u8>> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| HyperError::precondition("ffmpeg encoder already flushed"))?;
        let status = child.wait().map_err(|e| {
            HyperError::external(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stdout = join_drain(self.stdout_drain.take(), "stdout")?;
        let stderr = join_drain(self.stderr_drain.take(), "stderr")?;

        if !status.success() {
            return Err(HyperError::external(format!(
                "ffmpeg exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(stdout)
    }
}

impl VideoEncoder for FfmpegH264Encoder {
    fn encode(
        &mut self,
        frame: &RgbaImage,
        _timestamp_us: u64,
        _sink: &mut dyn ChunkSink,
    ) -> HyperResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(HyperError::precondition("ffmpeg encoder is already flushed"));
        };
        stdin.write_all(frame.as_raw()).map_err(|e| {
            HyperError::external(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_in += 1;
        Ok(())
    }

    fn flush(&mut self, sink: &mut dyn ChunkSink) -> HyperResult<()> {
        let stream = self.collect()?;
        let units = access_units(&stream);
        if units.len() as u64 != self.frames_in {
            tracing::warn!(
                frames = self.frames_in,
                access_units = units.len(),
                "ffmpeg output sample count differs from input frame count"
            );
        }

        let mut sps = Vec::new();
        let mut pps = Vec::new();
        for au in &units {
            if sps.is_empty() {
                sps.clone_from(&au.sps);
            }
            if pps.is_empty() {
                pps.clone_from(&au.pps);
            }
        }
        let mut meta = Some(ChunkMetadata {
            decoder_config: Some(build_avcc(&sps, &pps)?),
        });

        for (i, au) in units.into_iter().enumerate() {
            let i = i as u64;
            let ts = self.fps.frame_timestamp_us(i);
            let duration_us = self.fps.frame_timestamp_us(i + 1).saturating_sub(ts);
            sink.push_chunk(
                EncodedChunk {
                    data: au.sample,
                    timestamp_us: ts,
                    duration_us,
                    is_key: au.is_key,
                },
                meta.take(),
            )?;
        }
        Ok(())
    }
}

impl Drop for FfmpegH264Encoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Drain {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(handle: Option<Drain>, what: &str) -> HyperResult<Vec<u8>> {
    match handle {
        Some(h) => h
            .join()
            .map_err(|_| HyperError::external(format!("ffmpeg {what} drain thread panicked")))?
            .map_err(|e| HyperError::external(format!("ffmpeg {what} read failed: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
