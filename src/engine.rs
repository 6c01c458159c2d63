use image::RgbaImage;

use crate::config::EngineOpts;
use crate::encode::encoder::{CodecProfile, EncodeSession, EncoderConfig, is_available};
use crate::foundation::core::{Resolution, SafeZone};
use crate::foundation::error::HyperResult;
use crate::render::surface_pool::{SurfacePool, SurfacePoolStats};
use crate::render::synth::{encode_png, synthesize};
use crate::render::tile::Algorithm;
use crate::schedule::job::{CancelToken, JobCtx, JobId, JobKind, JobRegistry, ProgressFn};
use crate::schedule::scheduler::{JobScheduler, SystemCapabilities};
use crate::video::interpolate::interpolate_into;
use crate::video::keyframes::extract_keyframes;
use crate::video::source::VideoSource;

/// A still-image job.
#[derive(Clone, Debug)]
pub struct ImageRequest {
    /// Source raster; `None` synthesizes from the background and decoration alone.
    pub source: Option<RgbaImage>,
    /// Label stored in the job record.
    pub label: String,
    pub resolution: Resolution,
    pub algorithm: Algorithm,
}

impl ImageRequest {
    pub fn new(source: Option<RgbaImage>, resolution: Resolution) -> Self {
        Self {
            source,
            label: "image".to_owned(),
            resolution,
            algorithm: Algorithm::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Select the decoration pass from a free-form id (see [`Algorithm::resolve`]).
    pub fn with_algorithm_id(mut self, id: Option<&str>) -> Self {
        self.algorithm = Algorithm::resolve(id);
        self
    }
}

/// A video job. The source is passed separately because it is consumed mutably.
#[derive(Clone, Copy, Debug)]
pub struct VideoRequest {
    pub resolution: Resolution,
    pub algorithm: Algorithm,
    /// Overrides the configured keyframe stride.
    pub keyframe_interval: Option<u32>,
}

impl VideoRequest {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            algorithm: Algorithm::default(),
            keyframe_interval: None,
        }
    }

    pub fn with_algorithm_id(mut self, id: Option<&str>) -> Self {
        self.algorithm = Algorithm::resolve(id);
        self
    }
}

/// Host and codec report.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CapabilityReport {
    pub capabilities: SystemCapabilities,
    pub max_concurrent_jobs: usize,
    pub h264_main: bool,
    pub png: bool,
    pub safe_zones: Vec<SafeZone>,
}

/// Job-level entry point owning the surface pool, scheduler and job registry.
#[derive(Debug)]
pub struct Engine {
    opts: EngineOpts,
    pool: SurfacePool,
    scheduler: JobScheduler,
    jobs: JobRegistry,
}

impl Engine {
    /// Validate `opts`, probe the host and apply any configured capability overrides.
    pub fn new(opts: EngineOpts) -> HyperResult<Self> {
        opts.validate()?;
        let caps = SystemCapabilities::detect().with_overrides(opts.capabilities);
        Self::with_capabilities(opts, caps)
    }

    pub fn with_capabilities(opts: EngineOpts, caps: SystemCapabilities) -> HyperResult<Self> {
        opts.validate()?;
        let pool = SurfacePool::new(opts.pool)?;
        let scheduler = JobScheduler::new(caps)?;
        tracing::info!(
            pool_capacity = opts.pool.capacity,
            max_concurrent_jobs = scheduler.max_concurrent_jobs(),
            codec = opts.encode.codec.label(),
            "engine ready"
        );
        Ok(Self {
            opts,
            pool,
            scheduler,
            jobs: JobRegistry::new(),
        })
    }

    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn pool_stats(&self) -> SurfacePoolStats {
        self.pool.stats()
    }

    pub fn capability_report(&self) -> CapabilityReport {
        CapabilityReport {
            capabilities: self.scheduler.capabilities(),
            max_concurrent_jobs: self.scheduler.max_concurrent_jobs(),
            h264_main: is_available(CodecProfile::H264Main),
            png: is_available(CodecProfile::Png),
            safe_zones: self.scheduler.safe_zones(),
        }
    }

    /// Synthesize one still and return it PNG-encoded.
    #[tracing::instrument(skip_all, fields(resolution = req.resolution.px(), algorithm = req.algorithm.label()))]
    pub fn process_image(
        &self,
        req: &ImageRequest,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancelToken,
    ) -> HyperResult<Vec<u8>> {
        let id = self.jobs.create(
            JobKind::Image,
            req.label.clone(),
            req.resolution.px(),
            req.algorithm,
        );
        self.run_job(id, req.resolution, progress, cancel, |ctx| {
            let raster = synthesize(
                &self.pool,
                self.opts.acquire,
                &self.opts.synth,
                req.resolution.px(),
                req.algorithm,
                req.source.as_ref(),
                ctx,
            )?;
            encode_png(&raster)
        })
    }

    /// Upscale keyframes of `source`, interpolate them and encode an MP4.
    ///
    /// Returns `Ok(None)` without starting a job when the configured codec is unavailable.
    /// Extraction reports progress over 0–50 and interpolation/encoding over 50–95; 100 is reported
    /// only once the container has been written.
    #[tracing::instrument(skip_all, fields(resolution = req.resolution.px(), algorithm = req.algorithm.label()))]
    pub fn process_video(
        &self,
        source: &mut dyn VideoSource,
        req: &VideoRequest,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancelToken,
    ) -> HyperResult<Option<Vec<u8>>> {
        let codec = self.opts.encode.codec;
        if !is_available(codec) {
            tracing::warn!(codec = codec.label(), "video codec unavailable; skipping job");
            return Ok(None);
        }

        let mut keyframe_opts = self.opts.video.keyframe_opts();
        if let Some(k) = req.keyframe_interval {
            keyframe_opts.interval = k;
        }
        let fps = self.opts.video.target_fps()?;
        let res = req.resolution.px();

        let id = self
            .jobs
            .create(JobKind::Video, source.label(), res, req.algorithm);
        self.run_job(id, req.resolution, progress, cancel, |ctx| {
            let keyframes = extract_keyframes(
                source,
                &self.pool,
                self.opts.acquire,
                &self.opts.synth,
                &keyframe_opts,
                res,
                req.algorithm,
                &ctx.window(0, 50),
            )?;

            let mut session = EncodeSession::new(EncoderConfig {
                codec,
                width: res,
                height: res,
                fps,
                bitrate: self.opts.encode.bitrate,
            })?;
            let frames = interpolate_into(
                &keyframes,
                fps,
                &self.pool,
                self.opts.acquire,
                &mut session,
                &ctx.window(50, 95),
            )?;
            drop(keyframes);
            let bytes = session.finish()?;
            tracing::info!(frames, bytes = bytes.len(), "video encoded");
            Ok(bytes)
        })
        .map(Some)
    }

    /// Run still jobs on the scheduler's worker pool; results keep request order.
    ///
    /// Concurrency is bounded by the budget of the largest requested resolution.
    pub fn process_images(
        &self,
        reqs: Vec<ImageRequest>,
        cancel: &CancelToken,
    ) -> Vec<HyperResult<Vec<u8>>> {
        let Some(largest) = reqs.iter().map(|r| r.resolution).max() else {
            return Vec::new();
        };
        let jobs: Vec<_> = reqs
            .into_iter()
            .map(|req| move || self.process_image(&req, None, cancel))
            .collect();
        self.scheduler.run_batch(largest, jobs)
    }

    fn run_job<T>(
        &self,
        id: JobId,
        resolution: Resolution,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancelToken,
        body: impl FnOnce(&JobCtx<'_>) -> HyperResult<T>,
    ) -> HyperResult<T> {
        let budget = self.scheduler.budget_for(resolution);
        tracing::debug!(job = %id, budget, "job started");
        self.jobs.start(id);

        let forward = |pct: u8| {
            if let Some(v) = self.jobs.advance(id, pct)
                && let Some(cb) = progress
            {
                cb(v);
            }
        };
        let ctx = JobCtx::new(cancel.clone()).with_progress(&forward);

        match body(&ctx) {
            Ok(out) => {
                ctx.report(1.0);
                self.jobs.complete(id);
                tracing::debug!(job = %id, "job complete");
                Ok(out)
            }
            Err(e) => {
                tracing::warn!(job = %id, error = %e, "job failed");
                self.jobs.fail(id, e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/engine.rs"]
mod tests;
