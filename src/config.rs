use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::encode::encoder::{CodecProfile, DEFAULT_BITRATE};
use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};
use crate::render::surface_pool::{AcquirePolicy, SurfacePoolOpts};
use crate::render::synth::SynthOpts;
use crate::schedule::scheduler::CapabilityOverrides;
use crate::video::keyframes::{DEFAULT_KEYFRAME_INTERVAL, KeyframeOpts, NOMINAL_FPS};

/// Video pipeline settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoOpts {
    /// Rate used to index source frames when sampling keyframes.
    pub nominal_fps: u32,
    pub keyframe_interval: u32,
    /// Output frame rate of the interpolated sequence.
    pub target_fps: u32,
}

impl Default for VideoOpts {
    fn default() -> Self {
        Self {
            nominal_fps: NOMINAL_FPS,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            target_fps: 30,
        }
    }
}

impl VideoOpts {
    pub fn keyframe_opts(&self) -> KeyframeOpts {
        KeyframeOpts {
            nominal_fps: self.nominal_fps,
            interval: self.keyframe_interval,
        }
    }

    pub fn target_fps(&self) -> HyperResult<Fps> {
        Fps::integer(self.target_fps)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeOpts {
    pub codec: CodecProfile,
    /// Bits per second.
    pub bitrate: u32,
}

impl Default for EncodeOpts {
    fn default() -> Self {
        Self {
            codec: CodecProfile::default(),
            bitrate: DEFAULT_BITRATE,
        }
    }
}

/// Engine configuration. Every section is optional in JSON and falls back to its defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOpts {
    pub pool: SurfacePoolOpts,
    pub acquire: AcquirePolicy,
    pub synth: SynthOpts,
    pub video: VideoOpts,
    pub encode: EncodeOpts,
    /// Replace probed host values.
    pub capabilities: CapabilityOverrides,
}

impl EngineOpts {
    pub fn from_reader<R: std::io::Read>(r: R) -> HyperResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| HyperError::validation(format!("parse engine config JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> HyperResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            HyperError::validation(format!("open engine config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> HyperResult<()> {
        if self.pool.capacity == 0 {
            return Err(HyperError::validation("pool 'capacity' must be >= 1"));
        }
        self.synth.validate()?;
        self.video.keyframe_opts().validate()?;
        if self.video.target_fps == 0 {
            return Err(HyperError::validation("video 'target_fps' must be >= 1"));
        }
        if self.encode.bitrate == 0 {
            return Err(HyperError::validation("encode 'bitrate' must be >= 1"));
        }
        if self.capabilities.cores == Some(0) {
            return Err(HyperError::validation("capabilities 'cores' must be >= 1"));
        }
        if let Some(m) = self.capabilities.memory_gb
            && !(m.is_finite() && m > 0.0)
        {
            return Err(HyperError::validation(
                "capabilities 'memory_gb' must be a positive number",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
