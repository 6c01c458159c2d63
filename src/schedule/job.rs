use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{HyperError, HyperResult};
use crate::render::tile::Algorithm;

/// Identifier handed out by a [`JobRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

/// Snapshot of one job's record.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProcessingJob {
    pub id: JobId,
    pub kind: JobKind,
    pub source: String,
    pub resolution: u32,
    pub algorithm: Algorithm,
    pub status: JobStatus,
    /// Percentage in `0..=100`; never decreases.
    pub progress: u8,
    pub error: Option<String>,
}

/// Thread-safe table of job records.
#[derive(Debug, Default)]
pub struct JobRegistry {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, ProcessingJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, ProcessingJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a queued job.
    pub fn create(
        &self,
        kind: JobKind,
        source: impl Into<String>,
        resolution: u32,
        algorithm: Algorithm,
    ) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let job = ProcessingJob {
            id,
            kind,
            source: source.into(),
            resolution,
            algorithm,
            status: JobStatus::Queued,
            progress: 0,
            error: None,
        };
        self.lock().insert(id, job);
        id
    }

    pub fn get(&self, id: JobId) -> Option<ProcessingJob> {
        self.lock().get(&id).cloned()
    }

    /// All records ordered by id.
    pub fn list(&self) -> Vec<ProcessingJob> {
        let mut out: Vec<_> = self.lock().values().cloned().collect();
        out.sort_by_key(|j| j.id);
        out
    }

    pub fn start(&self, id: JobId) {
        if let Some(job) = self.lock().get_mut(&id)
            && job.status == JobStatus::Queued
        {
            job.status = JobStatus::Processing;
        }
    }

    /// Raise the job's progress to `pct` (clamped to 100).
    ///
    /// Returns the stored value when it moved, `None` when `pct` would not raise it.
    pub fn advance(&self, id: JobId, pct: u8) -> Option<u8> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(&id)?;
        let pct = pct.min(100);
        if job.status.is_terminal() || pct <= job.progress {
            return None;
        }
        job.progress = pct;
        Some(pct)
    }

    pub fn complete(&self, id: JobId) {
        if let Some(job) = self.lock().get_mut(&id) {
            job.status = JobStatus::Complete;
            job.progress = 100;
        }
    }

    pub fn fail(&self, id: JobId, message: impl Into<String>) {
        if let Some(job) = self.lock().get_mut(&id) {
            job.status = JobStatus::Error;
            job.error = Some(message.into());
        }
    }
}

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(HyperError::Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> HyperResult<()> {
        if self.is_cancelled() {
            Err(HyperError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress callback receiving an overall percentage.
pub type ProgressFn<'a> = dyn Fn(u8) + Send + Sync + 'a;

/// Per-job context threaded through every stage: cancellation plus progress reporting.
///
/// A stage reports its own completion as a fraction in `[0, 1]`; the context maps it into the
/// percentage window it was given with [`JobCtx::window`].
#[derive(Clone)]
pub struct JobCtx<'a> {
    cancel: CancelToken,
    progress: Option<&'a ProgressFn<'a>>,
    lo: f64,
    hi: f64,
}

impl std::fmt::Debug for JobCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCtx")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("window", &(self.lo, self.hi))
            .finish()
    }
}

impl Default for JobCtx<'_> {
    fn default() -> Self {
        Self::new(CancelToken::new())
    }
}

impl<'a> JobCtx<'a> {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            progress: None,
            lo: 0.0,
            hi: 100.0,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn check(&self) -> HyperResult<()> {
        self.cancel.check()
    }

    /// Child context whose `0..=1` maps onto `lo..=hi` percent of this context's window.
    pub fn window(&self, lo: u8, hi: u8) -> JobCtx<'a> {
        let span = self.hi - self.lo;
        let lo = f64::from(lo.min(100));
        let hi = f64::from(hi.min(100)).max(lo);
        JobCtx {
            cancel: self.cancel.clone(),
            progress: self.progress,
            lo: self.lo + span * lo / 100.0,
            hi: self.lo + span * hi / 100.0,
        }
    }

    /// Same cancellation, no progress reports.
    pub fn silent(&self) -> JobCtx<'a> {
        JobCtx {
            cancel: self.cancel.clone(),
            progress: None,
            lo: self.lo,
            hi: self.hi,
        }
    }

    /// Report completion of this context's stage as a fraction in `[0, 1]`.
    pub fn report(&self, fraction: f64) {
        if let Some(cb) = self.progress {
            cb(self.percent(fraction));
        }
    }

    fn percent(&self, fraction: f64) -> u8 {
        let f = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (self.lo + (self.hi - self.lo) * f).round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/job.rs"]
mod tests;
